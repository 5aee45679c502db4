use super::{FrameReceiver, FrameSender, GameFrame, PhysicsFrame, TickSync};
use crate::common::{math::Vector3, physics::PhysicsEngine};
use std::{
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::Duration,
};

static LOG: &'static str = "physics-stage";

/// The physics thread's half of the pipeline.
///
/// Owned by the physics driver's step closure; it feeds game frames into the engine
/// and publishes each resulting physics frame to the game and network stages.
pub struct PhysicsStage {
	engine: Box<dyn PhysicsEngine>,
	game_frames: FrameReceiver<Arc<GameFrame>>,
	to_game: FrameSender<Arc<PhysicsFrame>>,
	to_network: FrameSender<Arc<PhysicsFrame>>,
	running: Arc<AtomicBool>,
	gravity: Vector3<f64>,
	sync: Option<Arc<TickSync>>,
}

impl PhysicsStage {
	pub fn new(
		engine: Box<dyn PhysicsEngine>,
		game_frames: FrameReceiver<Arc<GameFrame>>,
		to_game: FrameSender<Arc<PhysicsFrame>>,
		to_network: FrameSender<Arc<PhysicsFrame>>,
		running: Arc<AtomicBool>,
		gravity: Vector3<f64>,
		sync: Option<Arc<TickSync>>,
	) -> Self {
		Self {
			engine,
			game_frames,
			to_game,
			to_network,
			running,
			gravity,
			sync,
		}
	}

	/// Runs a single physics step of `time_step`.
	#[profiling::function]
	pub fn step(&mut self, time_step: Duration) -> anyhow::Result<()> {
		if let Some(sync) = &self.sync {
			if !sync.wait_for_game()? {
				return Ok(());
			}
		}

		for frame in self.game_frames.drain().into_iter() {
			self.engine.push_game_frame(&frame);
		}

		let running = self.running.load(Ordering::Relaxed);
		let frame = Arc::new(
			self.engine
				.tick(&self.gravity, time_step.as_secs_f64(), running),
		);
		if !self.to_game.send(frame.clone()) {
			log::trace!(target: LOG, "Game stage is gone, dropped physics frame {}", frame.tick);
		}
		let tick = frame.tick;
		if !self.to_network.send(frame) {
			log::trace!(target: LOG, "Network stage is gone, dropped physics frame {}", tick);
		}

		if let Some(sync) = &self.sync {
			sync.finish_physics_tick()?;
		}
		Ok(())
	}
}

impl Drop for PhysicsStage {
	fn drop(&mut self) {
		self.engine.delete_resources();
	}
}

#[cfg(test)]
mod physics_stage {
	use super::*;
	use crate::{common::physics::SimplePhysics, pipeline::frame_queue};

	fn queue<T>() -> (FrameSender<T>, FrameReceiver<T>) {
		frame_queue("test", 8, 1, Duration::from_millis(1))
	}

	#[test]
	fn steps_continue_without_network_stage() {
		let (_to_physics, game_frames) = queue();
		let (to_game, from_physics) = queue();
		let (to_network, network_frames) = queue();
		drop(network_frames);
		let mut stage = PhysicsStage::new(
			Box::new(SimplePhysics::default()),
			game_frames,
			to_game,
			to_network,
			Arc::new(AtomicBool::new(true)),
			Vector3::zeros(),
			None,
		);
		stage.step(Duration::from_millis(16)).unwrap();
		stage.step(Duration::from_millis(16)).unwrap();
		let ticks = from_physics
			.drain()
			.iter()
			.map(|frame| frame.tick)
			.collect::<Vec<_>>();
		assert_eq!(ticks, vec![1, 2]);
	}
}
