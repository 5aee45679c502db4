use std::{
	collections::VecDeque,
	time::{Duration, Instant},
};

/// Paces a loop toward a target tick duration while absorbing jitter.
///
/// Time by which ticks overrun is accumulated as "lost time" (never more than `max_lost_time`).
/// Later ticks which finish early spend their spare time paying that debt before sleeping,
/// so the loop catches up without an unbounded burst of back-to-back ticks.
#[derive(Debug, Clone)]
pub struct RateController {
	max_lost_time: Duration,
	lost_time: Duration,
}

impl RateController {
	pub fn new(max_lost_time: Duration) -> Self {
		Self {
			max_lost_time,
			lost_time: Duration::ZERO,
		}
	}

	/// The duration of one tick at `rate` ticks per second.
	pub fn ideal_duration(rate: u32) -> Duration {
		Duration::from_secs(1) / rate.max(1)
	}

	pub fn lost_time(&self) -> Duration {
		self.lost_time
	}

	pub fn max_lost_time(&self) -> Duration {
		self.max_lost_time
	}

	/// Accounts for a tick which took `elapsed` and returns how long to sleep before the next one.
	pub fn after_tick(&mut self, ideal: Duration, elapsed: Duration) -> Duration {
		match elapsed.checked_sub(ideal) {
			Some(overrun) if !overrun.is_zero() => {
				self.lost_time = (self.lost_time + overrun).min(self.max_lost_time);
				Duration::ZERO
			}
			_ => {
				let spare = ideal - elapsed;
				let repaid = spare.min(self.lost_time);
				self.lost_time -= repaid;
				spare - repaid
			}
		}
	}
}

/// Counts the ticks completed within a trailing window of time.
#[derive(Debug, Clone)]
pub struct TickWindow {
	window: Duration,
	ticks: VecDeque<Instant>,
}

impl TickWindow {
	pub fn new(window: Duration) -> Self {
		Self {
			window,
			ticks: VecDeque::new(),
		}
	}

	fn prune(&mut self, now: Instant) {
		while let Some(oldest) = self.ticks.front() {
			if now.saturating_duration_since(*oldest) <= self.window {
				break;
			}
			self.ticks.pop_front();
		}
	}

	pub fn record(&mut self, now: Instant) {
		self.ticks.push_back(now);
		self.prune(now);
	}

	/// Ticks per second over the window ending at `now`.
	pub fn rate(&mut self, now: Instant) -> f64 {
		self.prune(now);
		if self.window.is_zero() {
			return 0.0;
		}
		self.ticks.len() as f64 / self.window.as_secs_f64()
	}
}
