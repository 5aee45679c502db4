//! Partitioning of the shipyard into per-ship claims.

use super::{chunk::ChunkPos, ShipId};
use serde::{Deserialize, Serialize};

static LOG: &'static str = "shipyard";

/// A square region of `diameter x diameter` chunks owned by at most one ship.
/// Claims are addressed by their index in the claim grid, where index `i` covers
/// chunks `i * diameter ..= i * diameter + diameter - 1` on that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
	x_index: i32,
	z_index: i32,
	diameter: i32,
}

impl std::fmt::Display for Claim {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"Claim([{}, {}] chunks <{}, {}> -> <{}, {}>)",
			self.x_index,
			self.z_index,
			self.x_start(),
			self.z_start(),
			self.x_end(),
			self.z_end()
		)
	}
}

impl Claim {
	pub fn new(x_index: i32, z_index: i32, diameter: i32) -> Self {
		Self {
			x_index,
			z_index,
			diameter,
		}
	}

	/// The claim-grid index of a chunk coordinate on one axis.
	pub fn index_of(chunk: i32, diameter: i32) -> i32 {
		chunk.div_euclid(diameter)
	}

	/// The claim whose region contains the chunk.
	pub fn containing(chunk: ChunkPos, diameter: i32) -> Self {
		Self::new(
			Self::index_of(chunk.x, diameter),
			Self::index_of(chunk.z, diameter),
			diameter,
		)
	}

	pub fn x_index(&self) -> i32 {
		self.x_index
	}

	pub fn z_index(&self) -> i32 {
		self.z_index
	}

	pub fn diameter(&self) -> i32 {
		self.diameter
	}

	pub fn x_start(&self) -> i32 {
		self.x_index * self.diameter
	}

	pub fn x_end(&self) -> i32 {
		self.x_start() + self.diameter - 1
	}

	pub fn z_start(&self) -> i32 {
		self.z_index * self.diameter
	}

	pub fn z_end(&self) -> i32 {
		self.z_start() + self.diameter - 1
	}

	pub fn contains(&self, chunk: ChunkPos) -> bool {
		(self.x_start()..=self.x_end()).contains(&chunk.x)
			&& (self.z_start()..=self.z_end()).contains(&chunk.z)
	}

	pub fn center_chunk(&self) -> ChunkPos {
		ChunkPos::new(
			self.x_start() + self.diameter / 2,
			self.z_start() + self.diameter / 2,
		)
	}

	pub fn overlaps(&self, other: &Self) -> bool {
		self.x_start() <= other.x_end()
			&& other.x_start() <= self.x_end()
			&& self.z_start() <= other.z_end()
			&& other.z_start() <= self.z_end()
	}
}

/// Inclusive range of valid claim-grid indices on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipyardBounds {
	pub x_index_start: i32,
	pub x_index_end: i32,
	pub z_index_start: i32,
	pub z_index_end: i32,
}

impl Default for ShipyardBounds {
	fn default() -> Self {
		Self {
			x_index_start: -7000,
			x_index_end: 7000,
			z_index_start: 3000,
			z_index_end: 7000,
		}
	}
}

impl ShipyardBounds {
	pub fn contains_index(&self, x_index: i32, z_index: i32) -> bool {
		(self.x_index_start..=self.x_index_end).contains(&x_index)
			&& (self.z_index_start..=self.z_index_end).contains(&z_index)
	}

	fn width(&self) -> u64 {
		(self.x_index_end as i64 - self.x_index_start as i64 + 1).max(0) as u64
	}

	fn depth(&self) -> u64 {
		(self.z_index_end as i64 - self.z_index_start as i64 + 1).max(0) as u64
	}

	pub fn capacity(&self) -> u64 {
		self.width() * self.depth()
	}
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
	#[error("all {0} claims in the shipyard have been allocated")]
	ShipyardExhausted(u64),
	#[error("claim diameter must be positive, found {0}")]
	InvalidDiameter(i32),
}

/// Hands out unique ship ids and never-reused claims.
///
/// Owned by the simulation thread; it is deliberately not `Sync`-shared.
#[derive(Debug)]
pub struct ClaimAllocator {
	bounds: ShipyardBounds,
	diameter: i32,
	next_claim: u64,
	next_ship_id: ShipId,
}

impl ClaimAllocator {
	pub fn new(bounds: ShipyardBounds, diameter: i32) -> Result<Self, Error> {
		if diameter <= 0 {
			return Err(Error::InvalidDiameter(diameter));
		}
		Ok(Self {
			bounds,
			diameter,
			next_claim: 0,
			next_ship_id: 0,
		})
	}

	pub fn bounds(&self) -> &ShipyardBounds {
		&self.bounds
	}

	pub fn diameter(&self) -> i32 {
		self.diameter
	}

	/// Claims are issued row by row, x varying fastest.
	pub fn allocate_claim(&mut self) -> Result<Claim, Error> {
		let capacity = self.bounds.capacity();
		if self.next_claim >= capacity {
			return Err(Error::ShipyardExhausted(capacity));
		}
		let width = self.bounds.width();
		let x_index = self.bounds.x_index_start + (self.next_claim % width) as i32;
		let z_index = self.bounds.z_index_start + (self.next_claim / width) as i32;
		self.next_claim += 1;
		let claim = Claim::new(x_index, z_index, self.diameter);
		log::debug!(target: LOG, "Allocated {}", claim);
		Ok(claim)
	}

	pub fn allocate_ship_id(&mut self) -> ShipId {
		let id = self.next_ship_id;
		self.next_ship_id += 1;
		id
	}

	pub fn is_in_shipyard(&self, chunk_x: i32, chunk_z: i32) -> bool {
		self.bounds.contains_index(
			Claim::index_of(chunk_x, self.diameter),
			Claim::index_of(chunk_z, self.diameter),
		)
	}
}
