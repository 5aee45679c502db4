use super::ChunkPos;
use crate::{
	common::math::Point3,
	server::world::ship::{DimensionId, ShipId},
};
use std::collections::BTreeSet;

pub type ObserverId = uuid::Uuid;

/// A remote viewer whose position decides which ship chunks it must watch.
/// Supplied fresh every tick; two observers are the same observer if their ids match.
#[derive(Debug, Clone)]
pub struct Observer {
	pub id: ObserverId,
	pub position: Point3<f64>,
	pub dimension: DimensionId,
}

impl Observer {
	pub fn new(id: ObserverId, position: Point3<f64>, dimension: DimensionId) -> Self {
		Self {
			id,
			position,
			dimension,
		}
	}
}

impl PartialEq for Observer {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for Observer {}

impl std::hash::Hash for Observer {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

/// Identifies a task within the proposal that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(super) u64);

/// An instruction to start watching a ship chunk for some observers.
/// Only valid for the tick which proposed it.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchTask {
	pub(super) id: TaskId,
	pub(super) tick: u64,
	pub chunk: ChunkPos,
	pub dimension: DimensionId,
	pub ship: ShipId,
	pub observers: BTreeSet<ObserverId>,
	/// Distance from the chunk to the nearest observer being added.
	pub priority: f64,
}

impl WatchTask {
	pub fn id(&self) -> TaskId {
		self.id
	}

	pub fn tick(&self) -> u64 {
		self.tick
	}
}

/// An instruction to stop watching a ship chunk for some observers.
/// Only valid for the tick which proposed it.
#[derive(Debug, Clone, PartialEq)]
pub struct UnwatchTask {
	pub(super) id: TaskId,
	pub(super) tick: u64,
	pub chunk: ChunkPos,
	pub dimension: DimensionId,
	pub ship: ShipId,
	pub observers: BTreeSet<ObserverId>,
	pub priority: f64,
	/// True when the owning ship loses its last watcher this tick.
	pub should_unload: bool,
}

impl UnwatchTask {
	pub fn id(&self) -> TaskId {
		self.id
	}

	pub fn tick(&self) -> u64 {
		self.tick
	}
}

/// The candidate tasks of one tick, each list ordered by ascending priority.
#[derive(Debug, Clone, Default)]
pub struct TaskProposal {
	pub watch_tasks: Vec<WatchTask>,
	pub unwatch_tasks: Vec<UnwatchTask>,
}

impl TaskProposal {
	pub fn is_empty(&self) -> bool {
		self.watch_tasks.is_empty() && self.unwatch_tasks.is_empty()
	}
}
