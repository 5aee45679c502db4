//! Voxel shape deltas which the physics engine applies to ship and terrain colliders.

use super::{chunk::ChunkPos, ship::ShipId};
use crate::common::math::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Blocks along each axis of a voxel chunk.
pub const CHUNK_SIZE: usize = 16;
const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;

/// The collision shape of a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoxelState {
	Air,
	Solid,
	Water,
	Lava,
}

impl Default for VoxelState {
	fn default() -> Self {
		Self::Air
	}
}

/// A 16x16x16 cube of blocks, addressed by block position shifted right by 4 on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VoxelChunkPos {
	pub x: i32,
	pub y: i32,
	pub z: i32,
}

impl VoxelChunkPos {
	pub fn new(x: i32, y: i32, z: i32) -> Self {
		Self { x, y, z }
	}

	/// The voxel chunk containing the block, and the block's offset within it.
	pub fn from_block(block: &Point3<i32>) -> (Self, [u8; 3]) {
		let pos = Self::new(block.x >> 4, block.y >> 4, block.z >> 4);
		let local = [
			(block.x & 15) as u8,
			(block.y & 15) as u8,
			(block.z & 15) as u8,
		];
		(pos, local)
	}
}

/// New voxel contents for one voxel chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum VoxelUpdate {
	/// The chunk has no collidable voxels.
	Empty(VoxelChunkPos),
	/// Only the listed voxels changed.
	Sparse {
		pos: VoxelChunkPos,
		voxels: BTreeMap<[u8; 3], VoxelState>,
	},
	/// Every voxel in the chunk, x varying fastest then z then y.
	Dense {
		pos: VoxelChunkPos,
		voxels: Vec<VoxelState>,
	},
	/// The host unloaded the chunk; its voxels are dropped from the body.
	Delete(VoxelChunkPos),
}

impl VoxelUpdate {
	pub fn sparse(pos: VoxelChunkPos) -> Self {
		Self::Sparse {
			pos,
			voxels: BTreeMap::new(),
		}
	}

	pub fn dense(pos: VoxelChunkPos) -> Self {
		Self::Dense {
			pos,
			voxels: vec![VoxelState::Air; CHUNK_VOLUME],
		}
	}

	pub fn pos(&self) -> VoxelChunkPos {
		match self {
			Self::Empty(pos) => *pos,
			Self::Sparse { pos, .. } => *pos,
			Self::Dense { pos, .. } => *pos,
			Self::Delete(pos) => *pos,
		}
	}

	/// The horizontal chunk this voxel chunk is part of.
	pub fn column(&self) -> ChunkPos {
		let pos = self.pos();
		ChunkPos::new(pos.x, pos.z)
	}

	/// Block positions of every non-air voxel of a dense update.
	pub fn occupied_blocks(&self) -> Vec<Point3<i32>> {
		let (pos, voxels) = match self {
			Self::Dense { pos, voxels } => (pos, voxels),
			_ => return Vec::new(),
		};
		let size = CHUNK_SIZE as i32;
		let origin = Point3::new(pos.x * size, pos.y * size, pos.z * size);
		voxels
			.iter()
			.enumerate()
			.filter(|(_, state)| **state != VoxelState::Air)
			.map(|(index, _)| {
				let index = index as i32;
				origin + Vector3::new(index % size, index / (size * size), (index / size) % size)
			})
			.collect()
	}

	fn dense_index(local: [u8; 3]) -> usize {
		let [x, y, z] = local.map(|v| v as usize);
		x + z * CHUNK_SIZE + y * CHUNK_SIZE * CHUNK_SIZE
	}

	/// Writes one voxel. An empty or deleted chunk becomes a sparse update holding only that voxel.
	pub fn set(&mut self, local: [u8; 3], state: VoxelState) {
		match self {
			Self::Empty(pos) | Self::Delete(pos) => {
				let mut voxels = BTreeMap::new();
				voxels.insert(local, state);
				*self = Self::Sparse { pos: *pos, voxels };
			}
			Self::Sparse { voxels, .. } => {
				voxels.insert(local, state);
			}
			Self::Dense { voxels, .. } => {
				voxels[Self::dense_index(local)] = state;
			}
		}
	}

	pub fn get(&self, local: [u8; 3]) -> Option<VoxelState> {
		match self {
			Self::Empty(_) | Self::Delete(_) => None,
			Self::Sparse { voxels, .. } => voxels.get(&local).cloned(),
			Self::Dense { voxels, .. } => voxels.get(Self::dense_index(local)).cloned(),
		}
	}
}

/// Voxel updates accumulated for each body during a tick.
#[derive(Debug, Default)]
pub struct VoxelDeltas(HashMap<ShipId, BTreeMap<VoxelChunkPos, VoxelUpdate>>);

impl VoxelDeltas {
	/// Records a single block change for `body`.
	pub fn set_voxel(&mut self, body: ShipId, block: &Point3<i32>, state: VoxelState) {
		let (pos, local) = VoxelChunkPos::from_block(block);
		self.0
			.entry(body)
			.or_default()
			.entry(pos)
			.or_insert_with(|| VoxelUpdate::sparse(pos))
			.set(local, state);
	}

	/// Replaces whatever was recorded for the update's chunk.
	pub fn insert_chunk(&mut self, body: ShipId, update: VoxelUpdate) {
		self.0.entry(body).or_default().insert(update.pos(), update);
	}

	pub fn remove_body(&mut self, body: ShipId) -> bool {
		self.0.remove(&body).is_some()
	}

	pub fn get(&self, body: ShipId) -> Option<&BTreeMap<VoxelChunkPos, VoxelUpdate>> {
		self.0.get(&body)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Empties the accumulator, returning each body's updates ordered by chunk position.
	pub fn take(&mut self) -> HashMap<ShipId, Vec<VoxelUpdate>> {
		std::mem::take(&mut self.0)
			.into_iter()
			.map(|(body, updates)| (body, updates.into_values().collect()))
			.collect()
	}
}
