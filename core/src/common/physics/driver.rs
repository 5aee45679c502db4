use super::{RateController, TickWindow};
use crate::common::utility::{spawn_thread, KillFlag, ThreadHandle};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::{
	sync::{
		atomic::{AtomicU32, AtomicU64, Ordering},
		Arc,
	},
	time::{Duration, Instant},
};

/// The log category for the physics thread.
static LOG: &'static str = "physics-driver";

/// Work posted onto the physics thread from elsewhere.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy)]
pub struct DriverSettings {
	/// Physics steps per second.
	pub target_rate: u32,
	pub max_lost_time: Duration,
	/// The trailing window over which [`PhysicsDriver::measured_rate`] is computed.
	pub tick_window: Duration,
}

/// Owns the background thread which repeatedly runs a physics step at a target rate.
///
/// Other threads talk to the loop only through the task inbox and a few atomics.
/// The thread is stopped cooperatively: it finishes the step it is in and exits at the top of its loop.
pub struct PhysicsDriver {
	handle: ThreadHandle,
	inbox: Sender<Task>,
	target_rate: Arc<AtomicU32>,
	/// Bits of the measured rate, an f64.
	measured_rate: Arc<AtomicU64>,
	steps: Arc<AtomicU64>,
}

struct DriverLoop {
	inbox: Receiver<Task>,
	target_rate: Arc<AtomicU32>,
	measured_rate: Arc<AtomicU64>,
	steps: Arc<AtomicU64>,
	rate: RateController,
	window: TickWindow,
}

impl PhysicsDriver {
	/// Starts the physics thread. `step` is called once per loop with the ideal tick duration;
	/// if it fails the error is logged and the thread stops.
	pub fn spawn<F>(settings: DriverSettings, step: F) -> anyhow::Result<Self>
	where
		F: FnMut(Duration) -> anyhow::Result<()> + Send + 'static,
	{
		let (inbox, receiver) = crossbeam_channel::unbounded();
		let target_rate = Arc::new(AtomicU32::new(settings.target_rate.max(1)));
		let measured_rate = Arc::new(AtomicU64::new(0f64.to_bits()));
		let steps = Arc::new(AtomicU64::new(0));
		let driver_loop = DriverLoop {
			inbox: receiver,
			target_rate: target_rate.clone(),
			measured_rate: measured_rate.clone(),
			steps: steps.clone(),
			rate: RateController::new(settings.max_lost_time),
			window: TickWindow::new(settings.tick_window),
		};
		let handle = spawn_thread(LOG, move |kill| driver_loop.run(kill, step))?;
		Ok(Self {
			handle,
			inbox,
			target_rate,
			measured_rate,
			steps,
		})
	}

	/// Queues `task` to run on the physics thread before its next step.
	/// Returns false if the thread has already exited, in which case the task is dropped.
	pub fn submit<F>(&self, task: F) -> bool
	where
		F: FnOnce() + Send + 'static,
	{
		self.inbox.send(Box::new(task)).is_ok()
	}

	pub fn set_target_rate(&self, rate: u32) {
		self.target_rate.store(rate.max(1), Ordering::Relaxed);
	}

	pub fn target_rate(&self) -> u32 {
		self.target_rate.load(Ordering::Relaxed)
	}

	/// Steps per second completed over the trailing window.
	pub fn measured_rate(&self) -> f64 {
		f64::from_bits(self.measured_rate.load(Ordering::Relaxed))
	}

	/// The number of steps completed since the thread started.
	pub fn step_count(&self) -> u64 {
		self.steps.load(Ordering::Acquire)
	}

	pub fn kill_flag(&self) -> &KillFlag {
		self.handle.kill_flag()
	}

	pub fn is_running(&self) -> bool {
		self.handle.is_running()
	}

	/// Stops the thread at its next loop boundary and waits for it to exit.
	pub fn stop(&mut self) -> bool {
		self.handle.stop()
	}
}

impl DriverLoop {
	fn run<F>(mut self, kill: KillFlag, mut step: F)
	where
		F: FnMut(Duration) -> anyhow::Result<()>,
	{
		log::info!(target: LOG, "Starting physics thread");
		while !kill.is_set() {
			let ideal = RateController::ideal_duration(self.target_rate.load(Ordering::Relaxed));
			let start = Instant::now();

			self.run_tasks();
			if let Err(error) = step(ideal) {
				log::error!(target: LOG, "Physics step failed, stopping: {:?}", error);
				break;
			}

			let now = Instant::now();
			self.steps.fetch_add(1, Ordering::Release);
			self.window.record(now);
			let measured = self.window.rate(now);
			self.measured_rate
				.store(measured.to_bits(), Ordering::Relaxed);

			let sleep = self.rate.after_tick(ideal, now - start);
			if !sleep.is_zero() {
				std::thread::sleep(sleep);
			}
		}
		log::info!(target: LOG, "Ending physics thread");
	}

	#[profiling::function]
	fn run_tasks(&mut self) {
		loop {
			match self.inbox.try_recv() {
				Ok(task) => task(),
				Err(TryRecvError::Empty) => break,
				// The driver handle owns the sender, so this only happens while it is being dropped.
				Err(TryRecvError::Disconnected) => break,
			}
		}
	}
}
