use crate::{
	common::math::{PoseVel, UnitQuaternion, Vector3},
	pipeline::{GameFrame, PhysicsFrame},
	server::world::{
		voxel::{VoxelChunkPos, VoxelUpdate},
		ShipId,
	},
};
use std::collections::{BTreeMap, BTreeSet};

static LOG: &'static str = "physics";

/// The rigid-body simulation run on the physics thread.
pub trait PhysicsEngine: Send {
	/// Applies the changes of one game tick. Frames are pushed in the order the game produced them.
	fn push_game_frame(&mut self, frame: &GameFrame);

	/// Advances the simulation by `time_step` seconds; when `running` is false nothing moves,
	/// but the current poses are still reported.
	fn tick(&mut self, gravity: &Vector3<f64>, time_step: f64, running: bool) -> PhysicsFrame;

	/// Releases everything the engine holds. Called once, when the physics thread exits.
	fn delete_resources(&mut self);
}

struct Body {
	pose: PoseVel,
	mass: f64,
	is_static: bool,
	voxels_loaded: bool,
	voxel_chunks: BTreeSet<VoxelChunkPos>,
}

/// Integrates each body's velocity under gravity, without collisions.
#[derive(Default)]
pub struct SimplePhysics {
	bodies: BTreeMap<ShipId, Body>,
	tick: u64,
}

impl SimplePhysics {
	pub fn body_count(&self) -> usize {
		self.bodies.len()
	}

	/// Voxel chunks the body currently has shapes for.
	pub fn voxel_chunks(&self, id: ShipId) -> Option<&BTreeSet<VoxelChunkPos>> {
		self.bodies.get(&id).map(|body| &body.voxel_chunks)
	}
}

impl PhysicsEngine for SimplePhysics {
	#[profiling::function]
	fn push_game_frame(&mut self, frame: &GameFrame) {
		for new_body in frame.new_bodies.iter() {
			self.bodies.insert(
				new_body.id,
				Body {
					pose: new_body.pose,
					mass: new_body.mass,
					is_static: new_body.is_static,
					voxels_loaded: new_body.voxels_loaded,
					voxel_chunks: BTreeSet::new(),
				},
			);
		}
		for update in frame.updated_bodies.iter() {
			if let Some(body) = self.bodies.get_mut(&update.id) {
				body.mass = update.mass;
				body.is_static = update.is_static;
				body.voxels_loaded = update.voxels_loaded;
			}
		}
		for (id, updates) in frame.voxel_updates.iter() {
			let body = match self.bodies.get_mut(id) {
				Some(body) => body,
				None => {
					log::debug!(target: LOG, "Dropping voxel updates for unknown body {}", id);
					continue;
				}
			};
			for update in updates.iter() {
				match update {
					VoxelUpdate::Delete(pos) => {
						body.voxel_chunks.remove(pos);
					}
					_ => {
						body.voxel_chunks.insert(update.pos());
					}
				}
			}
		}
		for id in frame.deleted_bodies.iter() {
			self.bodies.remove(id);
		}
	}

	#[profiling::function]
	fn tick(&mut self, gravity: &Vector3<f64>, time_step: f64, running: bool) -> PhysicsFrame {
		self.tick += 1;
		if running {
			for body in self.bodies.values_mut() {
				if body.is_static || !body.voxels_loaded || body.mass <= 0.0 {
					continue;
				}
				let pose = &mut body.pose;
				pose.linear_velocity += gravity * time_step;
				if pose.linear_velocity.magnitude_squared() > 0.0 {
					pose.position += pose.linear_velocity * time_step;
				}
				if pose.angular_velocity.magnitude_squared() > 0.0 {
					let spin = UnitQuaternion::from_scaled_axis(pose.angular_velocity * time_step);
					pose.rotation = spin * pose.rotation;
				}
			}
		}
		PhysicsFrame {
			tick: self.tick,
			poses: self
				.bodies
				.iter()
				.map(|(id, body)| (*id, body.pose))
				.collect(),
		}
	}

	fn delete_resources(&mut self) {
		log::debug!(target: LOG, "Releasing {} physics bodies", self.bodies.len());
		self.bodies.clear();
	}
}
