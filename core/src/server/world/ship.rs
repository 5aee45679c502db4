use super::{chunk::ChunkPos, claim::Claim};
use crate::common::math::{Aabb, Point3, PoseVel, ShipTransform, Vector3};
use enumset::{EnumSet, EnumSetType};
use std::collections::BTreeSet;

mod attachment;
pub use attachment::*;

mod name;
pub use name::*;

pub type ShipId = u64;
pub type DimensionId = String;

/// Ships below this mass are considered to have no blocks left and are deleted.
pub const MIN_MASS: f64 = 1e-8;

/// Runtime properties a ship may have, queried by flag instead of by type.
#[derive(Debug, EnumSetType, Hash)]
pub enum Capability {
	/// The ship has been handed to the physics engine.
	Loaded,
	/// The physics engine must not move the ship.
	Static,
}

pub type Capabilities = EnumSet<Capability>;

/// A movable structure built from blocks stored in its own [`Claim`] of the shipyard.
pub struct Ship {
	id: ShipId,
	name: String,
	claim: Claim,
	dimension: DimensionId,
	transform: ShipTransform,
	prev_transform: ShipTransform,
	linear_velocity: Vector3<f64>,
	angular_velocity: Vector3<f64>,
	mass: f64,
	/// Chunks in the claim which contain at least one block.
	active_chunks: BTreeSet<ChunkPos>,
	/// Chunks in the claim the host currently has loaded.
	loaded_chunks: BTreeSet<ChunkPos>,
	/// Bounds of every block ever placed, in shipyard space.
	ship_aabb: Option<Aabb>,
	world_aabb: Aabb,
	capabilities: Capabilities,
	attachments: Attachments,
}

impl std::fmt::Debug for Ship {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"Ship({} \"{}\" in {} @ {})",
			self.id, self.name, self.dimension, self.claim
		)
	}
}

impl Ship {
	/// Creates a ship whose claim's center chunk is already active.
	pub fn new(
		id: ShipId,
		name: String,
		claim: Claim,
		dimension: DimensionId,
		transform: ShipTransform,
	) -> Self {
		let mut ship = Self {
			id,
			name,
			claim,
			dimension,
			transform,
			prev_transform: transform,
			linear_velocity: Vector3::zeros(),
			angular_velocity: Vector3::zeros(),
			mass: 0.0,
			active_chunks: BTreeSet::from([claim.center_chunk()]),
			loaded_chunks: BTreeSet::new(),
			ship_aabb: None,
			world_aabb: Aabb::from_point(transform.position_in_world),
			capabilities: Capabilities::empty(),
			attachments: Attachments::default(),
		};
		ship.update_world_aabb();
		ship
	}

	pub fn id(&self) -> ShipId {
		self.id
	}

	pub fn name(&self) -> &String {
		&self.name
	}

	pub fn claim(&self) -> &Claim {
		&self.claim
	}

	pub fn dimension(&self) -> &DimensionId {
		&self.dimension
	}

	/// Moves the ship to another dimension; the claim is kept.
	pub fn set_dimension(&mut self, dimension: DimensionId) {
		self.dimension = dimension;
	}

	pub fn transform(&self) -> &ShipTransform {
		&self.transform
	}

	pub fn prev_transform(&self) -> &ShipTransform {
		&self.prev_transform
	}

	pub fn set_transform(&mut self, transform: ShipTransform) {
		self.transform = transform;
		self.update_world_aabb();
	}

	pub fn linear_velocity(&self) -> &Vector3<f64> {
		&self.linear_velocity
	}

	pub fn angular_velocity(&self) -> &Vector3<f64> {
		&self.angular_velocity
	}

	pub fn mass(&self) -> f64 {
		self.mass
	}

	pub fn set_mass(&mut self, mass: f64) {
		self.mass = mass;
	}

	pub fn active_chunks(&self) -> &BTreeSet<ChunkPos> {
		&self.active_chunks
	}

	pub fn loaded_chunks(&self) -> &BTreeSet<ChunkPos> {
		&self.loaded_chunks
	}

	/// True once the host has loaded every chunk holding the ship's blocks.
	pub fn are_voxels_loaded(&self) -> bool {
		self.active_chunks.is_subset(&self.loaded_chunks)
	}

	pub fn world_aabb(&self) -> &Aabb {
		&self.world_aabb
	}

	pub fn ship_aabb(&self) -> Option<&Aabb> {
		self.ship_aabb.as_ref()
	}

	pub fn has(&self, capability: Capability) -> bool {
		self.capabilities.contains(capability)
	}

	pub fn capabilities(&self) -> Capabilities {
		self.capabilities
	}

	pub fn insert_capability(&mut self, capability: Capability) -> bool {
		self.capabilities.insert(capability)
	}

	pub fn attachments(&self) -> &Attachments {
		&self.attachments
	}

	pub fn attachments_mut(&mut self) -> &mut Attachments {
		&mut self.attachments
	}

	/// Snapshot the current transform so the next physics update can be interpolated from it.
	pub fn store_prev_transform(&mut self) {
		self.prev_transform = self.transform;
	}

	pub fn apply_pose(&mut self, pose: &PoseVel) {
		self.transform.position_in_world = pose.position;
		self.transform.rotation = pose.rotation;
		self.linear_velocity = pose.linear_velocity;
		self.angular_velocity = pose.angular_velocity;
		self.update_world_aabb();
	}

	pub fn pose(&self) -> PoseVel {
		PoseVel {
			position: self.transform.position_in_world,
			rotation: self.transform.rotation,
			linear_velocity: self.linear_velocity,
			angular_velocity: self.angular_velocity,
		}
	}

	/// Records a block change inside the ship's claim. Blocks only change in loaded chunks.
	pub fn on_block_changed(&mut self, block: Point3<i32>, old_mass: f64, new_mass: f64) {
		self.mass += new_mass - old_mass;
		let chunk = ChunkPos::from_block(block.x, block.z);
		self.loaded_chunks.insert(chunk);
		if new_mass > 0.0 {
			self.active_chunks.insert(chunk);
			let min = block.cast::<f64>();
			self.include(Aabb::new(min, min + Vector3::new(1.0, 1.0, 1.0)));
			self.update_world_aabb();
		}
	}

	/// Records that the host loaded one of the ship's chunks.
	/// Chunks with occupied blocks become active and grow the ship's bounds.
	pub fn on_load_chunk(&mut self, chunk: ChunkPos, occupied: &[Point3<i32>]) {
		self.loaded_chunks.insert(chunk);
		let bounds = Aabb::enclosing(occupied.iter().flat_map(|block| {
			let min = block.cast::<f64>();
			[min, min + Vector3::new(1.0, 1.0, 1.0)]
		}));
		if let Some(bounds) = bounds {
			self.active_chunks.insert(chunk);
			self.include(bounds);
			self.update_world_aabb();
		}
	}

	/// Records that the host unloaded one of the ship's chunks. The chunk stays active.
	pub fn on_unload_chunk(&mut self, chunk: ChunkPos) -> bool {
		self.loaded_chunks.remove(&chunk)
	}

	fn include(&mut self, bounds: Aabb) {
		self.ship_aabb = Some(match self.ship_aabb {
			Some(aabb) => aabb.union(&bounds),
			None => bounds,
		});
	}

	/// The world-space center of one of the ship's chunks, at the height of the ship's center.
	pub fn chunk_center_in_world(&self, chunk: &ChunkPos) -> Point3<f64> {
		let center = chunk.center(self.transform.position_in_ship.y);
		self.transform.ship_to_world(&center)
	}

	fn update_world_aabb(&mut self) {
		let transform = self.transform;
		self.world_aabb = match &self.ship_aabb {
			Some(aabb) => aabb.map(|point| transform.ship_to_world(point)),
			None => Aabb::from_point(transform.position_in_world),
		};
	}
}
