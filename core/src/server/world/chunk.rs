//! Chunk coordinates and the tracking of which observers watch which ship chunks.

use crate::common::math::Point3;
use serde::{Deserialize, Serialize};

/// The number of blocks along each horizontal axis of a chunk.
pub const DIAMETER: i32 = 16;

mod task;
pub use task::*;

mod info;
pub use info::*;

mod tracker;
pub use tracker::*;

/// A column of blocks in the horizontal chunk grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
	pub x: i32,
	pub z: i32,
}

impl std::fmt::Display for ChunkPos {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "<{}, {}>", self.x, self.z)
	}
}

impl ChunkPos {
	pub fn new(x: i32, z: i32) -> Self {
		Self { x, z }
	}

	/// The chunk containing the block; arithmetic shift is floor division for negatives too.
	pub fn from_block(block_x: i32, block_z: i32) -> Self {
		Self::new(block_x >> 4, block_z >> 4)
	}

	/// The center of the chunk's column at height `y`, in the same space as its blocks.
	pub fn center(&self, y: f64) -> Point3<f64> {
		Point3::new(
			(self.x * DIAMETER) as f64 + (DIAMETER as f64 / 2.0),
			y,
			(self.z * DIAMETER) as f64 + (DIAMETER as f64 / 2.0),
		)
	}
}
