use crate::{
	common::math::{Aabb, PoseVel, Vector3},
	server::world::{voxel::VoxelUpdate, DimensionId, ShipId},
};
use std::collections::{BTreeMap, HashMap};

/// A body the physics engine should start simulating.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBody {
	pub id: ShipId,
	pub dimension: DimensionId,
	pub pose: PoseVel,
	pub scaling: f64,
	pub mass: f64,
	pub is_static: bool,
	/// Shipyard-space bounds of the body's voxels. None for terrain, which is unbounded.
	pub voxel_region: Option<Aabb>,
	/// False while chunks holding the body's blocks are unloaded; the body is held in place.
	pub voxels_loaded: bool,
}

/// Properties of a simulated body which the game may change every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedBody {
	pub id: ShipId,
	pub mass: f64,
	pub is_static: bool,
	pub voxels_loaded: bool,
	pub linear_velocity: Vector3<f64>,
	pub angular_velocity: Vector3<f64>,
}

/// Everything the game changed in a tick, sent from the simulation thread to the physics thread.
#[derive(Debug, Clone, Default)]
pub struct GameFrame {
	pub tick: u64,
	pub new_bodies: Vec<NewBody>,
	pub updated_bodies: Vec<UpdatedBody>,
	pub deleted_bodies: Vec<ShipId>,
	pub voxel_updates: HashMap<ShipId, Vec<VoxelUpdate>>,
}

/// The result of one physics step, sent from the physics thread to the game and network stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicsFrame {
	/// Counts physics steps, independently of game ticks.
	pub tick: u64,
	pub poses: BTreeMap<ShipId, PoseVel>,
}
