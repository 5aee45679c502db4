use super::{FrameReceiver, GameFrame, NewBody, PhysicsFrame, UpdatedBody};
use crate::{
	common::math::{PoseVel, ShipTransform},
	server::world::{chunk::Observer, Capability, ShipId, ShipWorld, TickChanges},
};
use std::sync::Arc;

static LOG: &'static str = "game-stage";

/// The simulation thread's half of the pipeline: feeds physics results into the world
/// and turns each tick's world changes into a frame for the physics thread.
pub struct GameStage {
	physics_frames: FrameReceiver<Arc<PhysicsFrame>>,
}

impl GameStage {
	pub fn new(physics_frames: FrameReceiver<Arc<PhysicsFrame>>) -> Self {
		Self { physics_frames }
	}

	pub fn pre_tick(&mut self, world: &mut ShipWorld, observers: Vec<Observer>) -> anyhow::Result<()> {
		world.pre_tick(observers)
	}

	/// Applies every queued physics frame and ends the world's tick.
	/// Returns the frame to send to physics along with the world's changes.
	#[profiling::function]
	pub fn post_tick(&mut self, world: &mut ShipWorld) -> anyhow::Result<(GameFrame, TickChanges)> {
		for ship in world.ships_mut().iter_mut() {
			ship.store_prev_transform();
		}
		for frame in self.physics_frames.drain().into_iter() {
			profiling::scope!("apply-physics-frame");
			for (id, pose) in frame.poses.iter() {
				self.apply_pose(world, *id, pose);
			}
		}

		let changes = world.post_tick()?;
		let frame = Self::create_game_frame(world, &changes);
		Ok((frame, changes))
	}

	fn apply_pose(&self, world: &mut ShipWorld, id: ShipId, pose: &PoseVel) {
		let is_ground = world.is_ground_body(id);
		match world.ships_mut().by_id_mut(id) {
			Some(ship) => ship.apply_pose(pose),
			None if is_ground => {}
			None => {
				log::warn!(target: LOG, "Physics reported a pose for unknown ship {}", id);
			}
		}
	}

	fn create_game_frame(world: &ShipWorld, changes: &TickChanges) -> GameFrame {
		let mut frame = GameFrame {
			tick: changes.tick,
			..Default::default()
		};

		for (dimension, id) in changes.new_ground_bodies.iter() {
			frame.new_bodies.push(NewBody {
				id: *id,
				dimension: dimension.clone(),
				pose: PoseVel::default(),
				scaling: 1.0,
				mass: 0.0,
				is_static: true,
				voxel_region: None,
				voxels_loaded: false,
			});
		}

		for id in changes.new_ships.iter() {
			let ship = match world.ships().by_id(*id) {
				Some(ship) => ship,
				None => continue,
			};
			let transform: &ShipTransform = ship.transform();
			frame.new_bodies.push(NewBody {
				id: *id,
				dimension: ship.dimension().clone(),
				pose: ship.pose(),
				scaling: transform.scaling,
				mass: ship.mass(),
				is_static: ship.has(Capability::Static),
				voxel_region: ship.ship_aabb().cloned(),
				voxels_loaded: ship.are_voxels_loaded(),
			});
		}

		for id in changes.updated_ships.iter() {
			if let Some(ship) = world.ships().by_id(*id) {
				frame.updated_bodies.push(UpdatedBody {
					id: *id,
					mass: ship.mass(),
					is_static: ship.has(Capability::Static),
					voxels_loaded: ship.are_voxels_loaded(),
					linear_velocity: *ship.linear_velocity(),
					angular_velocity: *ship.angular_velocity(),
				});
			}
		}

		frame.deleted_bodies = changes
			.deleted_ships
			.iter()
			.chain(changes.deleted_ground_bodies.iter())
			.cloned()
			.collect();
		frame.voxel_updates = changes.voxel_updates.clone();
		frame
	}
}
