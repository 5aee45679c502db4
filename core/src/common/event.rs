//! World notifications are delivered through an [`EventSink`] handed to each component when it is built.

use crate::server::world::ShipId;
use futures::channel::oneshot;
use std::sync::{
	atomic::{AtomicBool, AtomicU64, Ordering},
	Arc, Mutex, MutexGuard,
};

static LOG: &'static str = "events";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldEvent {
	/// A ship became loaded (it now participates in physics) during the given tick.
	ShipLoaded { ship: ShipId, tick: u64 },
	/// The world finished its post-tick work for the given tick.
	TickEnded { tick: u64 },
}

pub trait EventSink: Send + Sync {
	fn emit(&self, event: &WorldEvent);
}

/// Discards all events.
pub struct NoopSink;
impl EventSink for NoopSink {
	fn emit(&self, _event: &WorldEvent) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// What a listener wants to happen after it has seen an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
	Continue,
	Unsubscribe,
}

type Listener = Box<dyn FnMut(&WorldEvent) -> Flow + Send>;

struct Subscription {
	id: SubscriptionId,
	/// Cleared on unsubscribe, so emits already holding the subscription skip it.
	active: AtomicBool,
	listener: Mutex<Listener>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	match mutex.lock() {
		Ok(guard) => guard,
		// A listener panicked mid-emit; the guarded data is still coherent.
		Err(poisoned) => poisoned.into_inner(),
	}
}

/// An [`EventSink`] which fans events out to subscribed listeners.
///
/// Emits may happen from any thread; each listener sees one event at a time.
/// Listeners may subscribe and unsubscribe from inside a callback,
/// but must not emit on the bus which is calling them.
#[derive(Default)]
pub struct EventBus {
	next_id: AtomicU64,
	subscriptions: Mutex<Vec<Arc<Subscription>>>,
}

impl EventBus {
	pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
	where
		F: FnMut(&WorldEvent) -> Flow + Send + 'static,
	{
		let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
		lock(&self.subscriptions).push(Arc::new(Subscription {
			id,
			active: AtomicBool::new(true),
			listener: Mutex::new(Box::new(listener)),
		}));
		id
	}

	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		let mut subscriptions = lock(&self.subscriptions);
		match subscriptions.iter().position(|subscription| subscription.id == id) {
			Some(index) => {
				subscriptions.remove(index).active.store(false, Ordering::Release);
				true
			}
			None => false,
		}
	}

	/// Resolves with the first event matching `predicate`, after which the subscription is removed.
	/// If the bus is dropped before a match, the receiver resolves to `Canceled`.
	pub fn once<P>(&self, mut predicate: P) -> oneshot::Receiver<WorldEvent>
	where
		P: FnMut(&WorldEvent) -> bool + Send + 'static,
	{
		let (send, recv) = oneshot::channel();
		let mut send = Some(send);
		self.subscribe(move |event| {
			if !predicate(event) {
				return Flow::Continue;
			}
			if let Some(send) = send.take() {
				// The receiver may have been dropped by a caller that stopped waiting.
				let _ = send.send(event.clone());
			}
			Flow::Unsubscribe
		});
		recv
	}

	pub fn listener_count(&self) -> usize {
		lock(&self.subscriptions).len()
	}
}

impl EventSink for EventBus {
	fn emit(&self, event: &WorldEvent) {
		log::trace!(target: LOG, "{:?}", event);
		// Listeners run on a snapshot, without the list locked.
		let snapshot = lock(&self.subscriptions).clone();
		for subscription in snapshot.iter() {
			let mut listener = lock(&subscription.listener);
			if !subscription.active.load(Ordering::Acquire) {
				continue;
			}
			if (*listener)(event) == Flow::Unsubscribe {
				drop(listener);
				self.unsubscribe(subscription.id);
			}
		}
	}
}
