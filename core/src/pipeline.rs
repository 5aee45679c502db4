//! The per-tick hand-off between the simulation thread and the physics thread.
//!
//! The game stage runs on the caller's (simulation) thread, the physics stage runs on a
//! [`PhysicsDriver`] thread, and the network stage runs on the simulation thread after the game.
//! Frames cross between them through bounded queues; optionally a [`TickSync`] locks the two
//! threads to a fixed number of physics steps per game tick.

mod frame;
pub use frame::*;

mod game;
pub use game::*;

mod network;
pub use network::*;

mod physics;
pub use physics::*;

mod queue;
pub use queue::*;

mod sync;
pub use sync::*;

use crate::{
	common::{
		physics::{DriverSettings, PhysicsDriver, PhysicsEngine},
		stage::StageEnforcer,
		utility::KillFlag,
	},
	server::world::{chunk::Observer, ShipWorld, TickChanges},
	settings::Settings,
};
use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};

static LOG: &'static str = "pipeline";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
	PreTickGame,
	PostTickGame,
}

pub struct Pipeline {
	enforcer: StageEnforcer<PipelineStage>,
	game: GameStage,
	network: NetworkStage,
	to_physics: FrameSender<Arc<GameFrame>>,
	driver: PhysicsDriver,
	running: Arc<AtomicBool>,
	sync: Option<Arc<TickSync>>,
	/// Set once the pipeline is shutting down, so producers stop waiting on full queues.
	stopping: KillFlag,
}

impl Pipeline {
	/// Builds the stages and starts the physics thread.
	pub fn new(
		settings: &Settings,
		engine: Box<dyn PhysicsEngine>,
		network: Box<dyn NetworkSink>,
	) -> anyhow::Result<Self> {
		let stopping = KillFlag::default();
		let (to_physics, game_frames) = Self::queue(settings, "game-to-physics");
		let (physics_to_game, from_physics_for_game) = Self::queue(settings, "physics-to-game");
		let (physics_to_network, from_physics_for_network) =
			Self::queue(settings, "physics-to-network");

		let sync = match settings.synchronize_physics() {
			true => Some(Arc::new(TickSync::new(
				settings.physics_ticks_per_game_tick(),
			))),
			false => None,
		};
		let running = Arc::new(AtomicBool::new(true));

		let mut physics = PhysicsStage::new(
			engine,
			game_frames,
			physics_to_game.with_kill_flag(stopping.clone()),
			physics_to_network.with_kill_flag(stopping.clone()),
			running.clone(),
			settings.gravity(),
			sync.clone(),
		);
		let driver = PhysicsDriver::spawn(
			DriverSettings {
				target_rate: settings.physics_target_rate(),
				max_lost_time: settings.max_lost_time(),
				tick_window: settings.tick_window(),
			},
			move |time_step| physics.step(time_step),
		)?;

		log::info!(
			target: LOG,
			"Started pipeline at {} physics ticks/s ({})",
			settings.physics_target_rate(),
			match &sync {
				Some(sync) => format!("synchronized, {} per game tick", sync.ticks_per_game_tick()),
				None => "unsynchronized".to_owned(),
			}
		);

		Ok(Self {
			enforcer: StageEnforcer::builder(PipelineStage::PreTickGame)
				.ignore_repeat_failures()
				.require_stages_and_order([PipelineStage::PreTickGame, PipelineStage::PostTickGame])
				.build(),
			game: GameStage::new(from_physics_for_game),
			network: NetworkStage::new(from_physics_for_network, network),
			to_physics: to_physics.with_kill_flag(stopping.clone()),
			driver,
			running,
			sync,
			stopping,
		})
	}

	fn queue<T>(settings: &Settings, name: &'static str) -> (FrameSender<T>, FrameReceiver<T>) {
		frame_queue(
			name,
			settings.frame_queue_capacity(),
			settings.frame_queue_warn_margin(),
			settings.frame_queue_throttle(),
		)
	}

	/// Starts a game tick. In synchronized mode this blocks until physics has caught up.
	#[profiling::function]
	pub fn pre_tick_game(&mut self, world: &mut ShipWorld, observers: Vec<Observer>) -> anyhow::Result<()> {
		self.enforcer.stage(PipelineStage::PreTickGame)?;
		if let Some(sync) = &self.sync {
			sync.wait_for_physics()?;
		}
		self.game.pre_tick(world, observers)
	}

	/// Ends a game tick: applies physics results, hands the tick's changes to physics,
	/// and sends observers their updates.
	#[profiling::function]
	pub fn post_tick_game(&mut self, world: &mut ShipWorld) -> anyhow::Result<TickChanges> {
		self.enforcer.stage(PipelineStage::PostTickGame)?;
		let (frame, changes) = self.game.post_tick(world)?;
		if !self.to_physics.send(Arc::new(frame)) {
			log::warn!(target: LOG, "Physics thread is gone, dropped game frame {}", changes.tick);
		}
		self.network.post_tick(&changes.tracking);
		if let Some(sync) = &self.sync {
			sync.finish_game_tick()?;
		}
		Ok(changes)
	}

	/// Runs `task` on the physics thread before its next step.
	pub fn submit_cross_thread_task<F>(&self, task: F) -> bool
	where
		F: FnOnce() + Send + 'static,
	{
		self.driver.submit(task)
	}

	pub fn set_target_rate(&self, rate: u32) {
		self.driver.set_target_rate(rate);
	}

	/// Pauses or resumes integration; physics frames keep flowing while paused.
	pub fn set_physics_running(&self, running: bool) {
		self.running.store(running, Ordering::Relaxed);
	}

	pub fn is_physics_running(&self) -> bool {
		self.running.load(Ordering::Relaxed)
	}

	/// Physics steps per second measured over the configured tick window.
	pub fn physics_rate(&self) -> f64 {
		self.driver.measured_rate()
	}

	pub fn is_synchronized(&self) -> bool {
		self.sync.is_some()
	}

	/// Stops the physics thread and discards any frames in flight.
	pub fn shutdown(&mut self) {
		if self.stopping.is_set() {
			return;
		}
		log::info!(target: LOG, "Shutting down pipeline");
		self.stopping.set();
		if let Some(sync) = &self.sync {
			sync.shutdown();
		}
		if !self.driver.stop() {
			log::error!(target: LOG, "Physics thread panicked");
		}
	}
}

impl Drop for Pipeline {
	fn drop(&mut self) {
		self.shutdown();
	}
}

#[cfg(test)]
mod pipeline {
	use super::*;
	use crate::{
		common::{
			event::NoopSink,
			math::{Point3, Vector3},
			physics::SimplePhysics,
		},
		server::world::{voxel::VoxelState, BlockChange, ShipId, ShipyardBounds},
	};
	use std::{
		sync::{atomic::AtomicU64, mpsc},
		time::{Duration, Instant},
	};

	fn settings() -> Settings {
		Settings::default()
			.with_shipyard(ShipyardBounds {
				x_index_start: -10,
				x_index_end: 10,
				z_index_start: -10,
				z_index_end: 10,
			})
			.with_physics_target_rate(200)
	}

	fn tick(pipeline: &mut Pipeline, world: &mut ShipWorld, during: impl FnOnce(&mut ShipWorld)) -> TickChanges {
		pipeline.pre_tick_game(world, vec![]).unwrap();
		let proposal = world.chunk_watch_tasks().clone();
		world
			.set_executed(&proposal.watch_tasks, &proposal.unwatch_tasks)
			.unwrap();
		during(world);
		pipeline.post_tick_game(world).unwrap()
	}

	fn spawn_ship(pipeline: &mut Pipeline, world: &mut ShipWorld) -> ShipId {
		let ship = world
			.create_ship_at_block(Point3::new(0, 64, 0), "overworld".to_owned(), 1.0)
			.unwrap();
		let block = world.center_block_of(ship).unwrap();
		let changes = tick(pipeline, world, |world| {
			world.add_dimension("overworld".to_owned()).unwrap();
			world
				.on_set_block(BlockChange {
					position: block,
					dimension: "overworld".to_owned(),
					old_state: VoxelState::Air,
					new_state: VoxelState::Solid,
					old_mass: 0.0,
					new_mass: 1000.0,
				})
				.unwrap();
		});
		assert_eq!(changes.new_ships, vec![ship]);
		ship
	}

	#[test]
	fn unsynchronized_physics_moves_ships() {
		let mut world = ShipWorld::new(&settings(), Arc::new(NoopSink)).unwrap();
		let mut pipeline =
			Pipeline::new(&settings(), Box::new(SimplePhysics::default()), Box::new(NoopNetwork)).unwrap();
		assert!(!pipeline.is_synchronized());
		let ship = spawn_ship(&mut pipeline, &mut world);
		let start = world.ships().by_id(ship).unwrap().transform().position_in_world;

		let deadline = Instant::now() + Duration::from_secs(5);
		loop {
			std::thread::sleep(Duration::from_millis(10));
			tick(&mut pipeline, &mut world, |_| {});
			let position = world.ships().by_id(ship).unwrap().transform().position_in_world;
			if position.y < start.y {
				break;
			}
			assert!(Instant::now() < deadline, "ship never fell");
		}

		pipeline.shutdown();
		assert!(pipeline.physics_rate() > 0.0);
	}

	#[test]
	fn paused_physics_keeps_ships_still() {
		let mut world = ShipWorld::new(&settings(), Arc::new(NoopSink)).unwrap();
		let mut pipeline =
			Pipeline::new(&settings(), Box::new(SimplePhysics::default()), Box::new(NoopNetwork)).unwrap();
		pipeline.set_physics_running(false);
		assert!(!pipeline.is_physics_running());
		let ship = spawn_ship(&mut pipeline, &mut world);
		let start = world.ships().by_id(ship).unwrap().transform().position_in_world;
		for _ in 0..5 {
			std::thread::sleep(Duration::from_millis(10));
			tick(&mut pipeline, &mut world, |_| {});
		}
		let ship = world.ships().by_id(ship).unwrap();
		assert_eq!(ship.transform().position_in_world, start);
		assert_eq!(*ship.linear_velocity(), Vector3::zeros());
	}

	struct CountingPhysics(Arc<AtomicU64>);
	impl PhysicsEngine for CountingPhysics {
		fn push_game_frame(&mut self, _frame: &GameFrame) {}
		fn tick(&mut self, _gravity: &Vector3<f64>, _time_step: f64, _running: bool) -> PhysicsFrame {
			let tick = self.0.fetch_add(1, Ordering::SeqCst) + 1;
			PhysicsFrame {
				tick,
				..Default::default()
			}
		}
		fn delete_resources(&mut self) {}
	}

	#[test]
	fn synchronized_physics_runs_fixed_steps_per_tick() {
		let settings = settings().with_synchronized_physics(3);
		let mut world = ShipWorld::new(&settings, Arc::new(NoopSink)).unwrap();
		let steps = Arc::new(AtomicU64::new(0));
		let mut pipeline = Pipeline::new(
			&settings,
			Box::new(CountingPhysics(steps.clone())),
			Box::new(NoopNetwork),
		)
		.unwrap();
		assert!(pipeline.is_synchronized());

		for game_tick in 1..=4 {
			pipeline.pre_tick_game(&mut world, vec![]).unwrap();
			assert_eq!(steps.load(Ordering::SeqCst), game_tick * 3);
			world.set_executed(&[], &[]).unwrap();
			pipeline.post_tick_game(&mut world).unwrap();
		}
		pipeline.shutdown();
	}

	#[test]
	fn tasks_run_on_the_physics_thread() {
		let pipeline =
			Pipeline::new(&settings(), Box::new(SimplePhysics::default()), Box::new(NoopNetwork)).unwrap();
		let (send, recv) = mpsc::channel();
		assert!(pipeline.submit_cross_thread_task(move || {
			let name = std::thread::current().name().map(str::to_owned);
			send.send(name).unwrap();
		}));
		let name = recv.recv_timeout(Duration::from_secs(5)).unwrap();
		assert_eq!(name.as_deref(), Some("physics-driver"));
	}

	#[test]
	fn game_ticks_must_alternate() {
		let mut world = ShipWorld::new(&settings(), Arc::new(NoopSink)).unwrap();
		let mut pipeline =
			Pipeline::new(&settings(), Box::new(SimplePhysics::default()), Box::new(NoopNetwork)).unwrap();
		assert!(pipeline.post_tick_game(&mut world).is_err());
		pipeline.pre_tick_game(&mut world, vec![]).unwrap();
		assert!(pipeline.pre_tick_game(&mut world, vec![]).is_err());
	}
}
