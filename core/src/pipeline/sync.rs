use std::sync::{Condvar, Mutex, MutexGuard};

static LOG: &'static str = "tick-sync";

struct SyncState {
	physics_ticks: u32,
	shutdown: bool,
}

/// Lockstep gate between the game thread and the physics thread.
///
/// The game tick blocks until physics has run `ticks_per_game_tick` steps since the
/// previous game tick, and physics blocks once it has run that many steps until
/// the game tick completes. [`TickSync::shutdown`] releases both sides permanently.
pub struct TickSync {
	ticks_per_game_tick: u32,
	state: Mutex<SyncState>,
	physics_done: Condvar,
	game_done: Condvar,
}

impl TickSync {
	pub fn new(ticks_per_game_tick: u32) -> Self {
		Self {
			ticks_per_game_tick: ticks_per_game_tick.max(1),
			state: Mutex::new(SyncState {
				physics_ticks: 0,
				shutdown: false,
			}),
			physics_done: Condvar::new(),
			game_done: Condvar::new(),
		}
	}

	pub fn ticks_per_game_tick(&self) -> u32 {
		self.ticks_per_game_tick
	}

	fn lock(&self) -> anyhow::Result<MutexGuard<'_, SyncState>> {
		self.state
			.lock()
			.map_err(|_| anyhow::anyhow!("tick sync lock poisoned"))
	}

	/// Game side: blocks until physics has caught up with the current game tick.
	#[profiling::function]
	pub fn wait_for_physics(&self) -> anyhow::Result<()> {
		let mut state = self.lock()?;
		while state.physics_ticks < self.ticks_per_game_tick && !state.shutdown {
			state = self
				.physics_done
				.wait(state)
				.map_err(|_| anyhow::anyhow!("tick sync lock poisoned"))?;
		}
		Ok(())
	}

	/// Game side: resets the physics step counter and lets physics continue.
	pub fn finish_game_tick(&self) -> anyhow::Result<()> {
		let mut state = self.lock()?;
		state.physics_ticks = 0;
		self.game_done.notify_all();
		Ok(())
	}

	/// Physics side: blocks while physics is ahead of the game.
	/// Returns false if the sync was shut down and the step should not run.
	#[profiling::function]
	pub fn wait_for_game(&self) -> anyhow::Result<bool> {
		let mut state = self.lock()?;
		while state.physics_ticks >= self.ticks_per_game_tick && !state.shutdown {
			state = self
				.game_done
				.wait(state)
				.map_err(|_| anyhow::anyhow!("tick sync lock poisoned"))?;
		}
		Ok(!state.shutdown)
	}

	/// Physics side: records a completed step and wakes the game if it is waiting.
	pub fn finish_physics_tick(&self) -> anyhow::Result<()> {
		let mut state = self.lock()?;
		state.physics_ticks += 1;
		self.physics_done.notify_all();
		Ok(())
	}

	pub fn shutdown(&self) {
		match self.state.lock() {
			Ok(mut state) => state.shutdown = true,
			Err(poisoned) => poisoned.into_inner().shutdown = true,
		}
		log::debug!(target: LOG, "Releasing synchronized threads");
		self.physics_done.notify_all();
		self.game_done.notify_all();
	}

	pub fn is_shutdown(&self) -> bool {
		match self.state.lock() {
			Ok(state) => state.shutdown,
			Err(poisoned) => poisoned.into_inner().shutdown,
		}
	}
}
