use std::{
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	thread::JoinHandle,
};

/// Owning handle to a background thread which loops until told to stop.
///
/// The thread is never interrupted; it is expected to check [`KillFlag::is_set`] once per loop
/// and exit at that boundary. Dropping the handle sets the flag and joins the thread.
pub struct ThreadHandle {
	kill: KillFlag,
	join_handle: Option<JoinHandle<()>>,
}

/// Cooperative termination flag shared between a [`ThreadHandle`] and the thread it owns.
#[derive(Clone, Default)]
pub struct KillFlag(Arc<AtomicBool>);

impl KillFlag {
	pub fn set(&self) {
		self.0.store(true, Ordering::Release);
	}

	pub fn is_set(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}
}

/// Spawns a named thread which is passed the flag it should poll for termination.
pub fn spawn_thread<F>(name: &'static str, body: F) -> anyhow::Result<ThreadHandle>
where
	F: FnOnce(KillFlag) + Send + 'static,
{
	let kill = KillFlag::default();
	let thread_kill = kill.clone();
	let join_handle = std::thread::Builder::new()
		.name(name.to_owned())
		.spawn(move || body(thread_kill))?;
	Ok(ThreadHandle {
		kill,
		join_handle: Some(join_handle),
	})
}

impl ThreadHandle {
	pub fn kill_flag(&self) -> &KillFlag {
		&self.kill
	}

	pub fn is_running(&self) -> bool {
		match &self.join_handle {
			Some(handle) => !handle.is_finished(),
			None => false,
		}
	}

	/// Signals the thread to stop and blocks until it has.
	/// Returns false if the thread panicked.
	pub fn stop(&mut self) -> bool {
		self.kill.set();
		match self.join_handle.take() {
			Some(handle) => handle.join().is_ok(),
			None => true,
		}
	}
}

impl Drop for ThreadHandle {
	fn drop(&mut self) {
		let _ = self.stop();
	}
}
