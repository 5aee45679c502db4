use crate::common::utility::KillFlag;
use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use std::time::Duration;

static LOG: &'static str = "frame-queue";

/// Creates a bounded FIFO queue for frames crossing between threads.
///
/// Once fewer than `warn_margin` slots remain the producer logs a warning and is throttled
/// for `throttle` per attempt until the consumer catches up. Frames are never dropped
/// while the consumer is alive.
pub fn frame_queue<T>(
	name: &'static str,
	capacity: usize,
	warn_margin: usize,
	throttle: Duration,
) -> (FrameSender<T>, FrameReceiver<T>) {
	let capacity = capacity.max(1);
	let (send, recv) = crossbeam_channel::bounded(capacity);
	(
		FrameSender {
			name,
			send,
			capacity,
			warn_threshold: capacity.saturating_sub(warn_margin).max(1),
			throttle,
			kill: None,
		},
		FrameReceiver { recv },
	)
}

pub struct FrameSender<T> {
	name: &'static str,
	send: Sender<T>,
	capacity: usize,
	warn_threshold: usize,
	throttle: Duration,
	/// Lets a producer blocked on a full queue give up when its thread is asked to stop.
	kill: Option<KillFlag>,
}

impl<T> Clone for FrameSender<T> {
	fn clone(&self) -> Self {
		Self {
			name: self.name,
			send: self.send.clone(),
			capacity: self.capacity,
			warn_threshold: self.warn_threshold,
			throttle: self.throttle,
			kill: self.kill.clone(),
		}
	}
}

impl<T> FrameSender<T> {
	pub fn with_kill_flag(mut self, kill: KillFlag) -> Self {
		self.kill = Some(kill);
		self
	}

	pub fn len(&self) -> usize {
		self.send.len()
	}

	fn is_killed(&self) -> bool {
		self.kill.as_ref().map(KillFlag::is_set).unwrap_or(false)
	}

	/// Enqueues the frame, throttling while the queue is nearly full.
	/// Returns false if the frame was discarded because the consumer is gone or the producer was killed.
	#[profiling::function]
	pub fn send(&self, frame: T) -> bool {
		if self.send.len() >= self.warn_threshold {
			log::warn!(
				target: LOG,
				"{} queue holds {} of {} frames; is its consumer stalled?",
				self.name,
				self.send.len(),
				self.capacity
			);
			std::thread::sleep(self.throttle);
		}
		let mut frame = frame;
		loop {
			match self.send.send_timeout(frame, self.throttle) {
				Ok(()) => return true,
				Err(SendTimeoutError::Timeout(unsent)) => {
					if self.is_killed() {
						log::debug!(target: LOG, "Discarding {} frame, producer is stopping", self.name);
						return false;
					}
					log::warn!(
						target: LOG,
						"{} queue is full ({} frames), waiting for its consumer",
						self.name,
						self.capacity
					);
					frame = unsent;
				}
				Err(SendTimeoutError::Disconnected(_)) => {
					log::debug!(target: LOG, "Discarding {} frame, consumer is gone", self.name);
					return false;
				}
			}
		}
	}
}

pub struct FrameReceiver<T> {
	recv: Receiver<T>,
}

impl<T> FrameReceiver<T> {
	/// Takes every queued frame, oldest first.
	pub fn drain(&self) -> Vec<T> {
		self.recv.try_iter().collect()
	}

	pub fn len(&self) -> usize {
		self.recv.len()
	}

	pub fn is_empty(&self) -> bool {
		self.recv.is_empty()
	}
}
