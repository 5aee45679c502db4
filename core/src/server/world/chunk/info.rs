use super::{ChunkPos, ObserverId};
use crate::{common::utility::MultiSet, server::world::ship::ShipId};
use std::collections::{BTreeSet, HashSet};

/// A chunk of a particular ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShipChunk {
	pub ship: ShipId,
	pub chunk: ChunkPos,
}

/// The committed result of one tick of chunk tracking.
///
/// Like the tasks it was built from, it describes a single tick and should be consumed
/// before the next tick's tasks are committed.
#[derive(Debug, Clone, Default)]
pub struct TrackingInfo {
	pub(super) tick: u64,
	/// Every ship chunk each observer is watching after this tick.
	pub(super) watching: MultiSet<ObserverId, ShipChunk>,
	pub(super) ship_watchers: MultiSet<ShipId, ObserverId>,
	pub(super) newly_watching: MultiSet<ObserverId, ShipChunk>,
	pub(super) no_longer_watching: MultiSet<ObserverId, ShipChunk>,
	/// Ships an observer started watching their first chunk of.
	pub(super) ships_started: MultiSet<ObserverId, ShipId>,
	/// Ships an observer stopped watching their last chunk of.
	pub(super) ships_stopped: MultiSet<ObserverId, ShipId>,
	pub(super) ships_to_load: BTreeSet<ShipId>,
	pub(super) ships_to_unload: BTreeSet<ShipId>,
}

impl TrackingInfo {
	pub fn tick(&self) -> u64 {
		self.tick
	}

	pub fn watching(&self) -> &MultiSet<ObserverId, ShipChunk> {
		&self.watching
	}

	/// The chunks of `ship` which `observer` is watching.
	pub fn watched_chunks(&self, observer: &ObserverId, ship: ShipId) -> BTreeSet<ChunkPos> {
		self.watching
			.get(observer)
			.into_iter()
			.flatten()
			.filter(|entry| entry.ship == ship)
			.map(|entry| entry.chunk)
			.collect()
	}

	/// The ships `observer` watches at least one chunk of.
	pub fn watched_ships(&self, observer: &ObserverId) -> BTreeSet<ShipId> {
		self.watching
			.get(observer)
			.into_iter()
			.flatten()
			.map(|entry| entry.ship)
			.collect()
	}

	pub fn ship_watchers(&self, ship: ShipId) -> Option<&HashSet<ObserverId>> {
		self.ship_watchers.get(&ship)
	}

	pub fn newly_watching(&self) -> &MultiSet<ObserverId, ShipChunk> {
		&self.newly_watching
	}

	pub fn no_longer_watching(&self) -> &MultiSet<ObserverId, ShipChunk> {
		&self.no_longer_watching
	}

	pub fn ships_started(&self) -> &MultiSet<ObserverId, ShipId> {
		&self.ships_started
	}

	pub fn ships_stopped(&self) -> &MultiSet<ObserverId, ShipId> {
		&self.ships_stopped
	}

	/// Ships which went from no watchers to at least one.
	pub fn ships_to_load(&self) -> &BTreeSet<ShipId> {
		&self.ships_to_load
	}

	/// Ships which lost their last watcher.
	pub fn ships_to_unload(&self) -> &BTreeSet<ShipId> {
		&self.ships_to_unload
	}
}
