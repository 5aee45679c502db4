use super::{
	ChunkPos, Observer, ObserverId, ShipChunk, TaskId, TaskProposal, TrackingInfo, UnwatchTask,
	WatchTask,
};
use crate::{
	common::{math::Point3, utility::MultiSet},
	server::world::{
		claim::{Claim, ShipyardBounds},
		ownership::OwnershipIndex,
		ship::{DimensionId, ShipId},
	},
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

static LOG: &'static str = "chunk-tracking";

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
	#[error("tasks were committed without a pending proposal")]
	NothingProposed,
	#[error("task {id:?} belongs to tick {task_tick}, but the pending proposal is for tick {proposal_tick}")]
	StaleTask {
		id: TaskId,
		task_tick: u64,
		proposal_tick: u64,
	},
	#[error("task {id:?} for chunk {chunk} was never proposed")]
	Unproposed { id: TaskId, chunk: ChunkPos },
	#[error("task {0:?} was committed more than once")]
	DuplicateCommit(TaskId),
	#[error("claim diameter must be positive, found {0}")]
	InvalidDiameter(i32),
}

/// What the tracker remembers about a watched chunk.
#[derive(Debug, Clone)]
struct ChunkRecord {
	ship: ShipId,
	/// World-space center as of the last proposal, used to prioritize unwatching
	/// chunks of ships which no longer exist.
	center: Point3<f64>,
}

struct PendingProposal {
	tick: u64,
	observers: HashMap<ObserverId, Observer>,
	watch_tasks: HashMap<TaskId, WatchTask>,
	unwatch_tasks: HashMap<TaskId, UnwatchTask>,
	records: HashMap<ChunkPos, ChunkRecord>,
}

/// Decides which observers watch which ship chunks.
///
/// Each tick the tracker proposes watch and unwatch tasks. The caller executes whichever
/// subset it can afford and reports those back; only committed tasks change which observers
/// the tracker considers to be watching a chunk, so unexecuted work is proposed again next tick.
pub struct ChunkTracker {
	watch_radius: f64,
	shipyard: ShipyardBounds,
	claim_diameter: i32,
	chunk_watchers: MultiSet<ChunkPos, ObserverId>,
	/// The dimension each observer started watching a chunk in. Every entry of
	/// `chunk_watchers` has one; a ship may have changed dimension since.
	watched_in: HashMap<(ChunkPos, ObserverId), DimensionId>,
	ship_chunks: MultiSet<ShipId, ChunkPos>,
	records: HashMap<ChunkPos, ChunkRecord>,
	/// Last position of every observer that is still watching something.
	last_known: HashMap<ObserverId, Observer>,
	pending: Option<PendingProposal>,
	last_committed_tick: u64,
	next_task_id: u64,
}

impl ChunkTracker {
	pub fn new(watch_radius: f64, shipyard: ShipyardBounds, claim_diameter: i32) -> Result<Self, Error> {
		if claim_diameter <= 0 {
			return Err(Error::InvalidDiameter(claim_diameter));
		}
		Ok(Self {
			watch_radius,
			shipyard,
			claim_diameter,
			chunk_watchers: MultiSet::default(),
			watched_in: HashMap::new(),
			ship_chunks: MultiSet::default(),
			records: HashMap::new(),
			last_known: HashMap::new(),
			pending: None,
			last_committed_tick: 0,
			next_task_id: 0,
		})
	}

	pub fn watch_radius(&self) -> f64 {
		self.watch_radius
	}

	pub fn has_pending_proposal(&self) -> bool {
		self.pending.is_some()
	}

	fn make_task_id(&mut self) -> TaskId {
		let id = TaskId(self.next_task_id);
		self.next_task_id += 1;
		id
	}

	fn chunk_watchers(&self, chunk: &ChunkPos) -> BTreeSet<ObserverId> {
		self.chunk_watchers
			.get(chunk)
			.into_iter()
			.flatten()
			.cloned()
			.collect()
	}

	/// Groups the watchers of `chunk` by the dimension they are watching it in,
	/// keeping only those selected by `remove`.
	fn removals_by_dimension(
		&self,
		chunk: &ChunkPos,
		mut remove: impl FnMut(&ObserverId, &DimensionId) -> bool,
	) -> BTreeMap<DimensionId, BTreeSet<ObserverId>> {
		let mut removals = BTreeMap::<DimensionId, BTreeSet<ObserverId>>::new();
		for observer in self.chunk_watchers(chunk).into_iter() {
			if let Some(dimension) = self.watched_in.get(&(*chunk, observer)) {
				if remove(&observer, dimension) {
					removals.entry(dimension.clone()).or_default().insert(observer);
				}
			}
		}
		removals
	}

	/// Every observer watching any chunk of the ship.
	fn ship_watchers(&self, ship: ShipId) -> HashSet<ObserverId> {
		self.ship_chunks
			.get(&ship)
			.into_iter()
			.flatten()
			.filter_map(|chunk| self.chunk_watchers.get(chunk))
			.flatten()
			.cloned()
			.collect()
	}

	/// Distance from `point` to the closest of `ids`, using current positions where
	/// available and last-known positions for observers that have gone away.
	fn nearest_distance(
		&self,
		point: &Point3<f64>,
		ids: &BTreeSet<ObserverId>,
		observers: &HashMap<ObserverId, Observer>,
	) -> f64 {
		ids.iter()
			.filter_map(|id| observers.get(id).or_else(|| self.last_known.get(id)))
			.map(|observer| nalgebra::distance(point, &observer.position))
			.fold(f64::MAX, f64::min)
	}

	/// Computes the watch and unwatch tasks needed to bring every ship's watchers in line with
	/// the `observers` of this tick. Replaces any proposal which was never committed.
	#[profiling::function]
	pub fn propose_tasks<'a>(
		&mut self,
		observers: impl IntoIterator<Item = &'a Observer>,
		index: &OwnershipIndex,
		tick: u64,
	) -> TaskProposal {
		let observers = observers
			.into_iter()
			.map(|observer| (observer.id, observer.clone()))
			.collect::<HashMap<_, _>>();

		let mut proposal = TaskProposal::default();
		let mut records = HashMap::new();

		for ship in index.iter() {
			profiling::scope!("propose-ship");
			let wanted = observers
				.values()
				.filter(|observer| &observer.dimension == ship.dimension())
				.filter(|observer| ship.world_aabb().distance_to(&observer.position) <= self.watch_radius)
				.map(|observer| observer.id)
				.collect::<BTreeSet<_>>();
			let should_unload = wanted.is_empty() && !self.ship_watchers(ship.id()).is_empty();

			let chunks = ship
				.active_chunks()
				.iter()
				.chain(self.ship_chunks.get(&ship.id()).into_iter().flatten())
				.cloned()
				.collect::<BTreeSet<_>>();
			for chunk in chunks.into_iter() {
				let is_active = ship.active_chunks().contains(&chunk);
				let center = ship.chunk_center_in_world(&chunk);
				let current = self.chunk_watchers(&chunk);
				let wanted_here = match is_active {
					true => wanted.clone(),
					false => BTreeSet::new(),
				};

				// Observers still watching from a previous dimension are re-added once that watch is removed.
				let added = wanted_here
					.difference(&current)
					.cloned()
					.collect::<BTreeSet<_>>();
				if !added.is_empty() {
					let priority = self.nearest_distance(&center, &added, &observers);
					proposal.watch_tasks.push(WatchTask {
						id: self.make_task_id(),
						tick,
						chunk,
						dimension: ship.dimension().clone(),
						ship: ship.id(),
						observers: added,
						priority,
					});
				}

				let removals = self.removals_by_dimension(&chunk, |observer, dimension| {
					!wanted_here.contains(observer) || dimension != ship.dimension()
				});
				for (dimension, removed) in removals.into_iter() {
					let priority = self.nearest_distance(&center, &removed, &observers);
					proposal.unwatch_tasks.push(UnwatchTask {
						id: self.make_task_id(),
						tick,
						chunk,
						dimension,
						ship: ship.id(),
						observers: removed,
						priority,
						should_unload: should_unload && is_active,
					});
				}

				records.insert(
					chunk,
					ChunkRecord {
						ship: ship.id(),
						center,
					},
				);
			}
		}

		// Chunks whose ship has left the index
		let mut orphaned = self
			.records
			.iter()
			.filter(|(_, record)| !index.contains(record.ship))
			.map(|(chunk, record)| (*chunk, record.clone()))
			.collect::<Vec<_>>();
		orphaned.sort_by_key(|(chunk, _)| *chunk);
		for (chunk, record) in orphaned.into_iter() {
			let removals = self.removals_by_dimension(&chunk, |_, _| true);
			for (dimension, removed) in removals.into_iter() {
				let priority = self.nearest_distance(&record.center, &removed, &observers);
				proposal.unwatch_tasks.push(UnwatchTask {
					id: self.make_task_id(),
					tick,
					chunk,
					dimension,
					ship: record.ship,
					observers: removed,
					priority,
					should_unload: false,
				});
			}
		}

		proposal
			.watch_tasks
			.sort_by(|a, b| a.priority.total_cmp(&b.priority));
		proposal
			.unwatch_tasks
			.sort_by(|a, b| a.priority.total_cmp(&b.priority));

		log::trace!(
			target: LOG,
			"Tick {} proposed {} watch and {} unwatch tasks",
			tick,
			proposal.watch_tasks.len(),
			proposal.unwatch_tasks.len()
		);

		self.pending = Some(PendingProposal {
			tick,
			observers,
			watch_tasks: proposal
				.watch_tasks
				.iter()
				.map(|task| (task.id, task.clone()))
				.collect(),
			unwatch_tasks: proposal
				.unwatch_tasks
				.iter()
				.map(|task| (task.id, task.clone()))
				.collect(),
			records,
		});

		proposal
	}

	fn validate(
		pending: &PendingProposal,
		watch_tasks: &[WatchTask],
		unwatch_tasks: &[UnwatchTask],
	) -> Result<(), Error> {
		let mut committed = HashSet::new();
		let watch_ids = watch_tasks
			.iter()
			.map(|task| (task.id, task.tick, task.chunk, pending.watch_tasks.get(&task.id) == Some(task)));
		let unwatch_ids = unwatch_tasks.iter().map(|task| {
			(
				task.id,
				task.tick,
				task.chunk,
				pending.unwatch_tasks.get(&task.id) == Some(task),
			)
		});
		for (id, tick, chunk, was_proposed) in watch_ids.chain(unwatch_ids) {
			if tick != pending.tick {
				return Err(Error::StaleTask {
					id,
					task_tick: tick,
					proposal_tick: pending.tick,
				});
			}
			if !was_proposed {
				return Err(Error::Unproposed { id, chunk });
			}
			if !committed.insert(id) {
				return Err(Error::DuplicateCommit(id));
			}
		}
		Ok(())
	}

	/// Applies the tasks from the pending proposal which the caller executed, returning the
	/// resulting tracking state. Nothing is applied if any task was not part of the proposal.
	#[profiling::function]
	pub fn commit_executed(
		&mut self,
		watch_tasks: &[WatchTask],
		unwatch_tasks: &[UnwatchTask],
	) -> Result<TrackingInfo, Error> {
		match &self.pending {
			Some(pending) => Self::validate(pending, watch_tasks, unwatch_tasks)?,
			None => return Err(Error::NothingProposed),
		}
		let pending = match self.pending.take() {
			Some(pending) => pending,
			None => return Err(Error::NothingProposed),
		};

		let prev_watching = self.observer_watching();
		let prev_ship_watchers = self.ship_watcher_map();

		for task in watch_tasks.iter() {
			for observer in task.observers.iter() {
				self.chunk_watchers.insert(&task.chunk, *observer);
				self.watched_in
					.insert((task.chunk, *observer), task.dimension.clone());
			}
			self.ship_chunks.insert(&task.ship, task.chunk);
			let record = match pending.records.get(&task.chunk) {
				Some(record) => record.clone(),
				None => ChunkRecord {
					ship: task.ship,
					center: Point3::origin(),
				},
			};
			self.records.insert(task.chunk, record);
		}
		for task in unwatch_tasks.iter() {
			for observer in task.observers.iter() {
				let key = (task.chunk, *observer);
				if self.watched_in.get(&key) == Some(&task.dimension) {
					self.watched_in.remove(&key);
					self.chunk_watchers.remove(&task.chunk, observer);
				}
			}
			if self.chunk_watchers.count(&task.chunk) == 0 {
				if let Some(record) = self.records.remove(&task.chunk) {
					self.ship_chunks.remove(&record.ship, &task.chunk);
				}
			}
		}

		// Refresh where still-watched chunks are, for when their ship disappears.
		for (chunk, record) in self.records.iter_mut() {
			if let Some(latest) = pending.records.get(chunk) {
				record.center = latest.center;
			}
		}

		self.last_known.extend(pending.observers.into_iter());
		let still_watching = self
			.chunk_watchers
			.iter()
			.flat_map(|(_, watchers)| watchers.iter().cloned())
			.collect::<HashSet<_>>();
		self.last_known.retain(|id, _| still_watching.contains(id));

		self.last_committed_tick = pending.tick;
		let info = self.make_info(pending.tick, prev_watching, prev_ship_watchers);

		log::debug!(
			target: LOG,
			"Tick {} committed {}/{} watch and {}/{} unwatch tasks; {} ship(s) to load, {} to unload",
			pending.tick,
			watch_tasks.len(),
			pending.watch_tasks.len(),
			unwatch_tasks.len(),
			pending.unwatch_tasks.len(),
			info.ships_to_load.len(),
			info.ships_to_unload.len()
		);

		Ok(info)
	}

	fn observer_watching(&self) -> MultiSet<ObserverId, ShipChunk> {
		let mut watching = MultiSet::default();
		for (chunk, watchers) in self.chunk_watchers.iter() {
			if let Some(record) = self.records.get(chunk) {
				let entry = ShipChunk {
					ship: record.ship,
					chunk: *chunk,
				};
				for observer in watchers.iter() {
					watching.insert(observer, entry);
				}
			}
		}
		watching
	}

	fn ship_watcher_map(&self) -> MultiSet<ShipId, ObserverId> {
		let mut ship_watchers = MultiSet::default();
		for ship in self.ship_chunks.keys() {
			ship_watchers.insert_all(ship, self.ship_watchers(*ship).into_iter());
		}
		ship_watchers
	}

	fn make_info(
		&self,
		tick: u64,
		prev_watching: MultiSet<ObserverId, ShipChunk>,
		prev_ship_watchers: MultiSet<ShipId, ObserverId>,
	) -> TrackingInfo {
		let watching = self.observer_watching();
		let ship_watchers = self.ship_watcher_map();

		let ships_of = |watching: &MultiSet<ObserverId, ShipChunk>| {
			let mut ships = MultiSet::default();
			for (observer, entries) in watching.iter() {
				ships.insert_all(observer, entries.iter().map(|entry| entry.ship));
			}
			ships
		};
		let prev_ships = ships_of(&prev_watching);
		let ships = ships_of(&watching);

		let ships_to_load = ship_watchers
			.keys()
			.filter(|ship| prev_ship_watchers.count(ship) == 0)
			.cloned()
			.collect();
		let ships_to_unload = prev_ship_watchers
			.keys()
			.filter(|ship| ship_watchers.count(ship) == 0)
			.cloned()
			.collect();

		TrackingInfo {
			tick,
			newly_watching: watching.difference(&prev_watching),
			no_longer_watching: prev_watching.difference(&watching),
			ships_started: ships.difference(&prev_ships),
			ships_stopped: prev_ships.difference(&ships),
			watching,
			ship_watchers,
			ships_to_load,
			ships_to_unload,
		}
	}

	/// The observers watching a chunk. Only shipyard chunks are tracked, so anything outside
	/// the shipyard has no watchers.
	pub fn query(&self, chunk_x: i32, chunk_z: i32, dimension: &DimensionId) -> BTreeSet<ObserverId> {
		let in_shipyard = self.shipyard.contains_index(
			Claim::index_of(chunk_x, self.claim_diameter),
			Claim::index_of(chunk_z, self.claim_diameter),
		);
		if !in_shipyard {
			return BTreeSet::new();
		}
		let chunk = ChunkPos::new(chunk_x, chunk_z);
		self.chunk_watchers(&chunk)
			.into_iter()
			.filter(|observer| self.watched_in.get(&(chunk, *observer)) == Some(dimension))
			.collect()
	}

	pub fn last_committed_tick(&self) -> u64 {
		self.last_committed_tick
	}
}

#[cfg(test)]
mod chunk_tracker {
	use super::*;
	use crate::{
		common::math::ShipTransform,
		server::world::{claim::ClaimAllocator, ship::Ship},
	};
	use uuid::Uuid;

	const DIAMETER: i32 = 16;
	const RADIUS: f64 = 128.0;

	fn bounds() -> ShipyardBounds {
		ShipyardBounds {
			x_index_start: -10,
			x_index_end: 10,
			z_index_start: -10,
			z_index_end: 10,
		}
	}

	fn overworld() -> DimensionId {
		"overworld".to_owned()
	}

	struct Fixture {
		allocator: ClaimAllocator,
		index: OwnershipIndex,
		tracker: ChunkTracker,
	}

	impl Fixture {
		fn new() -> Self {
			Self {
				allocator: ClaimAllocator::new(bounds(), DIAMETER).unwrap(),
				index: OwnershipIndex::new(DIAMETER).unwrap(),
				tracker: ChunkTracker::new(RADIUS, bounds(), DIAMETER).unwrap(),
			}
		}

		fn spawn_ship(&mut self, position: Point3<f64>) -> ShipId {
			let claim = self.allocator.allocate_claim().unwrap();
			let id = self.allocator.allocate_ship_id();
			let transform = ShipTransform {
				position_in_world: position,
				position_in_ship: claim.center_chunk().center(0.0),
				..Default::default()
			};
			self.index
				.add(Ship::new(id, "Test".to_owned(), claim, overworld(), transform))
				.unwrap();
			id
		}

		fn propose(&mut self, observers: &[Observer], tick: u64) -> TaskProposal {
			self.tracker.propose_tasks(observers.iter(), &self.index, tick)
		}

		fn commit_all(&mut self, proposal: &TaskProposal) -> TrackingInfo {
			self.tracker
				.commit_executed(&proposal.watch_tasks, &proposal.unwatch_tasks)
				.unwrap()
		}
	}

	fn observer_at(id: Uuid, x: f64, z: f64) -> Observer {
		Observer::new(id, Point3::new(x, 0.0, z), overworld())
	}

	#[test]
	fn watch_then_unwatch_single_observer() {
		let mut fixture = Fixture::new();
		let ship = fixture.spawn_ship(Point3::origin());
		let claim = *fixture.index.by_id(ship).unwrap().claim();
		assert!(bounds().contains_index(claim.x_index(), claim.z_index()));

		let id = Uuid::new_v4();
		let proposal = fixture.propose(&[observer_at(id, 10.0, 0.0)], 1);
		assert_eq!(proposal.watch_tasks.len(), 1);
		assert!(proposal.unwatch_tasks.is_empty());
		let task = &proposal.watch_tasks[0];
		assert_eq!(task.ship, ship);
		assert_eq!(task.observers, BTreeSet::from([id]));
		assert_eq!(task.priority, 10.0);

		let info = fixture.commit_all(&proposal);
		assert_eq!(info.ships_to_load(), &BTreeSet::from([ship]));
		assert_eq!(info.watched_ships(&id), BTreeSet::from([ship]));
		assert_eq!(info.ships_started().count(&id), 1);
		assert_eq!(info.newly_watching().count(&id), 1);

		let proposal = fixture.propose(&[observer_at(id, 10_000.0, 0.0)], 2);
		assert!(proposal.watch_tasks.is_empty());
		assert_eq!(proposal.unwatch_tasks.len(), 1);
		let task = &proposal.unwatch_tasks[0];
		assert!(task.should_unload);
		assert_eq!(task.observers, BTreeSet::from([id]));

		let info = fixture.commit_all(&proposal);
		assert!(info.ship_watchers(ship).is_none());
		assert_eq!(info.ships_to_unload(), &BTreeSet::from([ship]));
		assert_eq!(info.ships_stopped().count(&id), 1);
		assert_eq!(info.no_longer_watching().count(&id), 1);
		assert!(fixture.propose(&[observer_at(id, 10_000.0, 0.0)], 3).is_empty());
	}

	#[test]
	fn observer_in_other_dimension_is_ignored() {
		let mut fixture = Fixture::new();
		fixture.spawn_ship(Point3::origin());
		let observer = Observer::new(Uuid::new_v4(), Point3::origin(), "nether".to_owned());
		assert!(fixture.propose(&[observer], 1).is_empty());
	}

	#[test]
	fn empty_commit_changes_nothing() {
		let mut fixture = Fixture::new();
		let ship = fixture.spawn_ship(Point3::origin());
		let id = Uuid::new_v4();
		let observers = [observer_at(id, 5.0, 0.0)];
		let chunk = fixture.index.by_id(ship).unwrap().claim().center_chunk();

		let first = fixture.propose(&observers, 1);
		let info = fixture.tracker.commit_executed(&[], &[]).unwrap();
		assert!(info.watching().is_empty());
		assert!(info.ships_to_load().is_empty());
		assert!(fixture.tracker.query(chunk.x, chunk.z, &overworld()).is_empty());

		let second = fixture.propose(&observers, 2);
		assert_eq!(second.watch_tasks.len(), first.watch_tasks.len());
		assert_eq!(second.watch_tasks[0].observers, first.watch_tasks[0].observers);
		assert_eq!(second.watch_tasks[0].chunk, first.watch_tasks[0].chunk);
	}

	#[test]
	fn tasks_are_sorted_by_priority() {
		let mut fixture = Fixture::new();
		let ship = fixture.spawn_ship(Point3::origin());
		{
			let ship = fixture.index.by_id_mut(ship).unwrap();
			let center = ship.claim().center_chunk();
			for offset in [3, -2, 1, 4, -1] {
				let block = Point3::new((center.x + offset) * DIAMETER, 0, center.z * DIAMETER);
				ship.on_block_changed(block, 0.0, 1.0);
			}
		}
		let observers = [
			observer_at(Uuid::new_v4(), 40.0, 0.0),
			observer_at(Uuid::new_v4(), -60.0, 8.0),
		];
		let proposal = fixture.propose(&observers, 1);
		assert_eq!(proposal.watch_tasks.len(), 6);
		assert!(proposal
			.watch_tasks
			.windows(2)
			.all(|pair| pair[0].priority <= pair[1].priority));

		fixture.commit_all(&proposal);
		let proposal = fixture.propose(&[], 2);
		assert_eq!(proposal.unwatch_tasks.len(), 6);
		assert!(proposal
			.unwatch_tasks
			.windows(2)
			.all(|pair| pair[0].priority <= pair[1].priority));
		assert!(proposal.unwatch_tasks.iter().all(|task| task.should_unload));
	}

	#[test]
	fn partial_commit_reproposes_remaining_work() {
		let mut fixture = Fixture::new();
		let near = fixture.spawn_ship(Point3::new(0.0, 0.0, 0.0));
		let far = fixture.spawn_ship(Point3::new(100.0, 0.0, 0.0));
		let id = Uuid::new_v4();
		let observers = [observer_at(id, 0.0, 0.0)];

		let proposal = fixture.propose(&observers, 1);
		assert_eq!(proposal.watch_tasks.len(), 2);
		assert_eq!(proposal.watch_tasks[0].ship, near);
		let info = fixture
			.tracker
			.commit_executed(&proposal.watch_tasks[..1], &[])
			.unwrap();
		assert_eq!(info.ships_to_load(), &BTreeSet::from([near]));

		let proposal = fixture.propose(&observers, 2);
		assert_eq!(proposal.watch_tasks.len(), 1);
		assert_eq!(proposal.watch_tasks[0].ship, far);
	}

	#[test]
	fn rejects_unproposed_and_stale_tasks() {
		let mut fixture = Fixture::new();
		fixture.spawn_ship(Point3::origin());
		let observers = [observer_at(Uuid::new_v4(), 0.0, 0.0)];

		assert_eq!(
			fixture.tracker.commit_executed(&[], &[]).err(),
			Some(Error::NothingProposed)
		);

		let old = fixture.propose(&observers, 1);
		let current = fixture.propose(&observers, 2);
		assert!(matches!(
			fixture.tracker.commit_executed(&old.watch_tasks, &[]),
			Err(Error::StaleTask { task_tick: 1, proposal_tick: 2, .. })
		));

		let mut forged = current.watch_tasks[0].clone();
		forged.observers.insert(Uuid::new_v4());
		assert!(matches!(
			fixture.tracker.commit_executed(&[forged], &[]),
			Err(Error::Unproposed { .. })
		));

		let twice = [current.watch_tasks[0].clone(), current.watch_tasks[0].clone()];
		assert!(matches!(
			fixture.tracker.commit_executed(&twice, &[]),
			Err(Error::DuplicateCommit(_))
		));

		// Failed commits leave the proposal in place.
		assert!(fixture.tracker.has_pending_proposal());
		assert!(fixture
			.tracker
			.commit_executed(&current.watch_tasks, &[])
			.is_ok());
		assert!(!fixture.tracker.has_pending_proposal());
	}

	#[test]
	fn deleted_ship_is_unwatched_without_unloading() {
		let mut fixture = Fixture::new();
		let ship = fixture.spawn_ship(Point3::origin());
		let id = Uuid::new_v4();
		let observers = [observer_at(id, 0.0, 0.0)];
		let proposal = fixture.propose(&observers, 1);
		fixture.commit_all(&proposal);

		fixture.index.remove(ship).unwrap();
		let proposal = fixture.propose(&observers, 2);
		assert_eq!(proposal.unwatch_tasks.len(), 1);
		assert_eq!(proposal.unwatch_tasks[0].ship, ship);
		assert!(!proposal.unwatch_tasks[0].should_unload);

		let info = fixture.commit_all(&proposal);
		assert!(info.watching().is_empty());
		assert_eq!(info.ships_to_unload(), &BTreeSet::from([ship]));
	}

	#[test]
	fn departed_observer_is_unwatched_using_last_position() {
		let mut fixture = Fixture::new();
		fixture.spawn_ship(Point3::origin());
		let id = Uuid::new_v4();
		let proposal = fixture.propose(&[observer_at(id, 30.0, 0.0)], 1);
		fixture.commit_all(&proposal);

		let proposal = fixture.propose(&[], 2);
		assert_eq!(proposal.unwatch_tasks.len(), 1);
		assert_eq!(proposal.unwatch_tasks[0].priority, 30.0);
	}

	#[test]
	fn deltas_reconcile_with_previous_tick() {
		let mut fixture = Fixture::new();
		let a = fixture.spawn_ship(Point3::new(0.0, 0.0, 0.0));
		fixture.spawn_ship(Point3::new(500.0, 0.0, 0.0));
		let id = Uuid::new_v4();

		let proposal = fixture.propose(&[observer_at(id, 0.0, 0.0)], 1);
		let info = fixture.commit_all(&proposal);
		let before = info.watching().clone();
		assert_eq!(info.watched_ships(&id), BTreeSet::from([a]));

		let proposal = fixture.propose(&[observer_at(id, 450.0, 0.0)], 2);
		let info = fixture.commit_all(&proposal);
		let after = info.watching();
		let reconciled = before
			.difference(info.no_longer_watching())
			.into_inner()
			.into_iter()
			.chain(info.newly_watching().clone().into_inner().into_iter());
		let mut expected = MultiSet::default();
		for (observer, entries) in reconciled {
			expected.insert_all(&observer, entries.into_iter());
		}
		assert_eq!(&expected, after);
	}

	#[test]
	fn rejects_non_positive_diameter() {
		assert_eq!(
			ChunkTracker::new(RADIUS, bounds(), 0).err(),
			Some(Error::InvalidDiameter(0))
		);
	}

	#[test]
	fn equal_priorities_keep_chunk_order() {
		let mut fixture = Fixture::new();
		let ship = fixture.spawn_ship(Point3::origin());
		let center = {
			let ship = fixture.index.by_id_mut(ship).unwrap();
			let center = ship.claim().center_chunk();
			for (dx, dz) in [(1, 0), (0, -1), (-1, 0), (0, 1)] {
				let block = Point3::new((center.x + dx) * DIAMETER, 0, (center.z + dz) * DIAMETER);
				ship.on_block_changed(block, 0.0, 1.0);
			}
			center
		};
		let id = Uuid::new_v4();
		let proposal = fixture.propose(&[observer_at(id, 0.0, 0.0)], 1);
		let chunks = proposal
			.watch_tasks
			.iter()
			.map(|task| (task.chunk.x - center.x, task.chunk.z - center.z))
			.collect::<Vec<_>>();
		assert_eq!(chunks, vec![(0, 0), (-1, 0), (0, -1), (0, 1), (1, 0)]);
		let tied = &proposal.watch_tasks[1..];
		assert!(tied.windows(2).all(|pair| pair[0].priority == pair[1].priority));
		assert!(tied.windows(2).all(|pair| pair[0].id() < pair[1].id()));

		let info = fixture.commit_all(&proposal);
		let watched = proposal.watch_tasks.iter().map(|task| task.chunk).collect::<BTreeSet<_>>();
		assert_eq!(info.watched_chunks(&id, ship), watched);
		assert!(info.watched_chunks(&id, ship + 1).is_empty());
	}

	#[test]
	fn dimension_change_keeps_uncommitted_watches_in_old_dimension() {
		let mut fixture = Fixture::new();
		let ship = fixture.spawn_ship(Point3::origin());
		let chunk = fixture.index.by_id(ship).unwrap().claim().center_chunk();
		let id = Uuid::new_v4();
		let proposal = fixture.propose(&[observer_at(id, 0.0, 0.0)], 1);
		fixture.commit_all(&proposal);

		let nether = "nether".to_owned();
		fixture
			.index
			.by_id_mut(ship)
			.unwrap()
			.set_dimension(nether.clone());
		let observers = [Observer::new(id, Point3::origin(), nether.clone())];

		let proposal = fixture.propose(&observers, 2);
		assert_eq!(proposal.unwatch_tasks.len(), 1);
		assert_eq!(proposal.unwatch_tasks[0].dimension, overworld());
		assert!(proposal.watch_tasks.is_empty());

		// Nothing executed, so the observer is still watching in the old dimension.
		fixture.tracker.commit_executed(&[], &[]).unwrap();
		assert_eq!(
			fixture.tracker.query(chunk.x, chunk.z, &overworld()),
			BTreeSet::from([id])
		);
		assert!(fixture.tracker.query(chunk.x, chunk.z, &nether).is_empty());

		let proposal = fixture.propose(&observers, 3);
		assert_eq!(proposal.unwatch_tasks.len(), 1);
		assert_eq!(proposal.unwatch_tasks[0].dimension, overworld());
		fixture.commit_all(&proposal);
		assert!(fixture.tracker.query(chunk.x, chunk.z, &overworld()).is_empty());

		let proposal = fixture.propose(&observers, 4);
		assert!(proposal.unwatch_tasks.is_empty());
		assert_eq!(proposal.watch_tasks.len(), 1);
		assert_eq!(proposal.watch_tasks[0].dimension, nether);
		fixture.commit_all(&proposal);
		assert_eq!(
			fixture.tracker.query(chunk.x, chunk.z, &nether),
			BTreeSet::from([id])
		);
	}

	#[test]
	fn query_is_limited_to_shipyard_and_dimension() {
		let mut fixture = Fixture::new();
		let ship = fixture.spawn_ship(Point3::origin());
		let id = Uuid::new_v4();
		let proposal = fixture.propose(&[observer_at(id, 0.0, 0.0)], 1);
		fixture.commit_all(&proposal);

		let chunk = fixture.index.by_id(ship).unwrap().claim().center_chunk();
		assert_eq!(
			fixture.tracker.query(chunk.x, chunk.z, &overworld()),
			BTreeSet::from([id])
		);
		assert!(fixture.tracker.query(chunk.x, chunk.z, &"nether".to_owned()).is_empty());
		let outside = (bounds().x_index_end + 1) * DIAMETER;
		assert!(fixture.tracker.query(outside, chunk.z, &overworld()).is_empty());
	}
}
