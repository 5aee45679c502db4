use super::{
	chunk::{ChunkPos, Observer, ObserverId, TaskProposal, TrackingInfo, UnwatchTask, WatchTask},
	claim::ClaimAllocator,
	loading::ShipLoadManager,
	ownership::OwnershipIndex,
	ship::{generate_name, Capability, DimensionId, Ship, ShipId, MIN_MASS},
	voxel::{VoxelDeltas, VoxelState, VoxelUpdate},
};
use crate::{
	common::{
		event::{EventSink, WorldEvent},
		math::{Point3, ShipTransform, Vector3},
		stage::{StageEnforcer, Step},
	},
	settings::Settings,
};
use std::{
	collections::{BTreeMap, BTreeSet, HashMap},
	sync::Arc,
};

static LOG: &'static str = "ship-world";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldStage {
	PreTick,
	UpdateDimensions,
	UpdateBlocks,
	UpdateChunks,
	PostTick,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
	#[error("dimension {0} already has a ground body")]
	DimensionExists(DimensionId),
	#[error("dimension {0} is not known to the world")]
	UnknownDimension(DimensionId),
}

/// A block which the host world changed.
#[derive(Debug, Clone)]
pub struct BlockChange {
	pub position: Point3<i32>,
	pub dimension: DimensionId,
	pub old_state: VoxelState,
	pub new_state: VoxelState,
	pub old_mass: f64,
	pub new_mass: f64,
}

/// Everything that changed in the world during one tick.
/// Only valid for the tick it was produced by.
#[derive(Debug, Default)]
pub struct TickChanges {
	pub tick: u64,
	/// Ships which were loaded this tick, in id order.
	pub new_ships: Vec<ShipId>,
	/// Every loaded ship, in id order.
	pub updated_ships: Vec<ShipId>,
	pub deleted_ships: Vec<ShipId>,
	pub new_ground_bodies: Vec<(DimensionId, ShipId)>,
	pub deleted_ground_bodies: Vec<ShipId>,
	pub voxel_updates: HashMap<ShipId, Vec<VoxelUpdate>>,
	pub tracking: TrackingInfo,
}

/// The simulation-thread view of every ship in a world.
///
/// Each tick must follow `pre_tick`, then any number of dimension/block/chunk updates
/// (with `set_executed` reporting which chunk watch tasks were carried out), then `post_tick`.
pub struct ShipWorld {
	events: Arc<dyn EventSink>,
	allocator: ClaimAllocator,
	ships: OwnershipIndex,
	load_manager: ShipLoadManager,
	enforcer: StageEnforcer<WorldStage>,
	/// Static bodies standing in for each dimension's terrain.
	ground_bodies: BTreeMap<DimensionId, ShipId>,
	dimensions_added: Vec<DimensionId>,
	dimensions_removed: Vec<DimensionId>,
	voxel_deltas: VoxelDeltas,
	loaded_chunks: Vec<(DimensionId, Vec<VoxelUpdate>)>,
	observers: Vec<Observer>,
	tick: u64,
}

impl ShipWorld {
	pub fn new(settings: &Settings, events: Arc<dyn EventSink>) -> anyhow::Result<Self> {
		Ok(Self {
			events,
			allocator: ClaimAllocator::new(*settings.shipyard(), settings.claim_diameter())?,
			ships: OwnershipIndex::new(settings.claim_diameter())?,
			load_manager: ShipLoadManager::new(
				settings.watch_radius(),
				*settings.shipyard(),
				settings.claim_diameter(),
			)?,
			enforcer: StageEnforcer::builder(WorldStage::PreTick)
				.ignore_until_first_reset()
				.require_order([
					Step::Single(WorldStage::PreTick),
					Step::any_of([
						WorldStage::UpdateDimensions,
						WorldStage::UpdateBlocks,
						WorldStage::UpdateChunks,
					]),
					Step::Single(WorldStage::PostTick),
				])
				.require_final(WorldStage::PostTick)
				.build(),
			ground_bodies: BTreeMap::new(),
			dimensions_added: Vec::new(),
			dimensions_removed: Vec::new(),
			voxel_deltas: VoxelDeltas::default(),
			loaded_chunks: Vec::new(),
			observers: Vec::new(),
			tick: 0,
		})
	}

	/// The number of the current (or most recently completed) tick.
	pub fn tick(&self) -> u64 {
		self.tick
	}

	pub fn ships(&self) -> &OwnershipIndex {
		&self.ships
	}

	pub fn ships_mut(&mut self) -> &mut OwnershipIndex {
		&mut self.ships
	}

	pub fn allocator(&self) -> &ClaimAllocator {
		&self.allocator
	}

	pub fn observers(&self) -> &Vec<Observer> {
		&self.observers
	}

	pub fn ground_body(&self, dimension: &DimensionId) -> Option<ShipId> {
		self.ground_bodies.get(dimension).cloned()
	}

	pub fn is_ground_body(&self, id: ShipId) -> bool {
		self.ground_bodies.values().any(|ground| *ground == id)
	}

	/// Creates an empty ship whose center is the block at `block` in the world.
	/// It is loaded once it has mass, emitting [`WorldEvent::ShipLoaded`].
	pub fn create_ship_at_block(
		&mut self,
		block: Point3<i32>,
		dimension: DimensionId,
		scaling: f64,
	) -> anyhow::Result<ShipId> {
		let claim = self.allocator.allocate_claim()?;
		let id = self.allocator.allocate_ship_id();
		let name = generate_name(&mut rand::thread_rng());

		let half_block = Vector3::new(0.5, 0.5, 0.5);
		let center_chunk = claim.center_chunk();
		let center_block_in_ship = Point3::new(
			center_chunk.x * super::chunk::DIAMETER,
			block.y,
			center_chunk.z * super::chunk::DIAMETER,
		);
		let transform = ShipTransform {
			position_in_world: block.cast::<f64>() + half_block,
			position_in_ship: center_block_in_ship.cast::<f64>() + half_block,
			scaling,
			..Default::default()
		};

		log::debug!(target: LOG, "Creating ship {} \"{}\" in {} at {}", id, name, dimension, block);
		self.ships
			.add(Ship::new(id, name, claim, dimension, transform))?;
		Ok(id)
	}

	/// The block position in the ship's claim which sits at the ship's center.
	pub fn center_block_of(&self, ship: ShipId) -> Option<Point3<i32>> {
		let ship = self.ships.by_id(ship)?;
		let center = ship.transform().position_in_ship;
		Some(Point3::new(
			center.x.floor() as i32,
			center.y.floor() as i32,
			center.z.floor() as i32,
		))
	}

	pub fn add_dimension(&mut self, dimension: DimensionId) -> anyhow::Result<ShipId> {
		self.enforcer.stage(WorldStage::UpdateDimensions)?;
		if self.ground_bodies.contains_key(&dimension) {
			return Err(Error::DimensionExists(dimension).into());
		}
		let id = self.allocator.allocate_ship_id();
		log::debug!(target: LOG, "Dimension {} has ground body {}", dimension, id);
		self.ground_bodies.insert(dimension.clone(), id);
		self.dimensions_added.push(dimension);
		Ok(id)
	}

	/// Marks the dimension's ground body for removal at the end of the tick.
	pub fn remove_dimension(&mut self, dimension: DimensionId) -> anyhow::Result<()> {
		self.enforcer.stage(WorldStage::UpdateDimensions)?;
		if !self.ground_bodies.contains_key(&dimension) {
			return Err(Error::UnknownDimension(dimension).into());
		}
		self.dimensions_removed.push(dimension);
		Ok(())
	}

	fn body_for_chunk(&self, chunk_x: i32, chunk_z: i32, dimension: &DimensionId) -> Result<ShipId, Error> {
		match self.ships.by_chunk(chunk_x, chunk_z, dimension) {
			Some(ship) => Ok(ship.id()),
			None => self
				.ground_body(dimension)
				.ok_or_else(|| Error::UnknownDimension(dimension.clone())),
		}
	}

	/// Routes a block change to the ship owning its chunk, or to the dimension's terrain.
	#[profiling::function]
	pub fn on_set_block(&mut self, change: BlockChange) -> anyhow::Result<()> {
		self.enforcer.stage(WorldStage::UpdateBlocks)?;
		if change.old_state == change.new_state {
			return Ok(());
		}

		let chunk = ChunkPos::from_block(change.position.x, change.position.z);
		let body = self.body_for_chunk(chunk.x, chunk.z, &change.dimension)?;
		self.voxel_deltas
			.set_voxel(body, &change.position, change.new_state);
		if let Some(ship) = self.ships.by_id_mut(body) {
			ship.on_block_changed(change.position, change.old_mass, change.new_mass);
		}
		Ok(())
	}

	/// Queues the voxel contents of chunks the host just loaded, or [`Delete`](VoxelUpdate::Delete)s
	/// for chunks it unloaded. Chunks in a ship's claim update that ship's loaded chunks and bounds.
	#[profiling::function]
	pub fn add_voxel_chunks(
		&mut self,
		dimension: DimensionId,
		updates: Vec<VoxelUpdate>,
	) -> anyhow::Result<()> {
		self.enforcer.stage(WorldStage::UpdateChunks)?;
		for update in updates.iter() {
			let chunk = update.column();
			let ship = match self.ships.by_chunk_mut(chunk.x, chunk.z, &dimension) {
				Some(ship) => ship,
				None => continue,
			};
			match update {
				VoxelUpdate::Empty(_) | VoxelUpdate::Dense { .. } => {
					ship.on_load_chunk(chunk, &update.occupied_blocks());
				}
				VoxelUpdate::Delete(_) => {
					ship.on_unload_chunk(chunk);
				}
				VoxelUpdate::Sparse { .. } => {}
			}
		}
		self.loaded_chunks.push((dimension, updates));
		Ok(())
	}

	/// Begins a tick with the observers present in the world, and proposes chunk watch tasks for them.
	pub fn pre_tick(&mut self, observers: Vec<Observer>) -> anyhow::Result<()> {
		self.enforcer.stage(WorldStage::PreTick)?;
		self.tick += 1;
		self.observers = observers;
		self.load_manager
			.pre_tick(self.observers.iter(), &self.ships, self.tick)?;
		Ok(())
	}

	/// The chunk tasks proposed this tick. The host executes any subset of them
	/// and reports that subset to [`set_executed`](ShipWorld::set_executed).
	pub fn chunk_watch_tasks(&self) -> &TaskProposal {
		self.load_manager.proposal()
	}

	pub fn set_executed(
		&mut self,
		watch_tasks: &[WatchTask],
		unwatch_tasks: &[UnwatchTask],
	) -> anyhow::Result<()> {
		self.load_manager.set_executed(watch_tasks, unwatch_tasks)?;
		Ok(())
	}

	/// The observers watching a shipyard chunk.
	pub fn query(&self, chunk_x: i32, chunk_z: i32, dimension: &DimensionId) -> BTreeSet<ObserverId> {
		self.load_manager.query(chunk_x, chunk_z, dimension)
	}

	/// Ends the tick: deletes ships which lost all their mass, loads ships which gained mass,
	/// routes loaded chunk voxels, and reports everything that changed.
	#[profiling::function]
	pub fn post_tick(&mut self) -> anyhow::Result<TickChanges> {
		self.enforcer.stage(WorldStage::PostTick)?;
		let mut changes = TickChanges {
			tick: self.tick,
			..Default::default()
		};

		{
			profiling::scope!("delete-massless-ships");
			let mut cursor = self.ships.cursor();
			while let Some(ship) = cursor.next() {
				if !ship.has(Capability::Loaded) || ship.mass() >= MIN_MASS {
					continue;
				}
				if let Some(ship) = cursor.remove_current() {
					log::debug!(target: LOG, "Deleting {:?}, it has no mass", ship);
					self.voxel_deltas.remove_body(ship.id());
					changes.deleted_ships.push(ship.id());
				}
			}
		}

		let mut loaded_this_tick = Vec::new();
		for ship in self.ships.iter_mut() {
			if ship.has(Capability::Loaded) {
				continue;
			}
			if ship.mass() == 0.0 {
				log::warn!(target: LOG, "{:?} has a mass of 0, not loading it", ship);
				continue;
			}
			ship.insert_capability(Capability::Loaded);
			log::debug!(target: LOG, "Loaded {:?}", ship);
			loaded_this_tick.push(ship.id());
		}
		changes.new_ships = loaded_this_tick.clone();
		changes.updated_ships = self
			.ships
			.iter()
			.filter(|ship| ship.has(Capability::Loaded))
			.map(Ship::id)
			.collect();

		for (dimension, updates) in std::mem::take(&mut self.loaded_chunks).into_iter() {
			for update in updates.into_iter() {
				let pos = update.pos();
				let body = self.body_for_chunk(pos.x, pos.z, &dimension)?;
				self.voxel_deltas.insert_chunk(body, update);
			}
		}
		changes.voxel_updates = self.voxel_deltas.take();

		changes.new_ground_bodies = self
			.dimensions_added
			.drain(..)
			.filter_map(|dimension| {
				let id = self.ground_bodies.get(&dimension).cloned()?;
				Some((dimension, id))
			})
			.collect();
		for dimension in self.dimensions_removed.drain(..) {
			if let Some(id) = self.ground_bodies.remove(&dimension) {
				changes.deleted_ground_bodies.push(id);
			}
		}

		changes.tracking = self.load_manager.post_tick()?;

		for ship in loaded_this_tick.into_iter() {
			self.events.emit(&WorldEvent::ShipLoaded {
				ship,
				tick: self.tick,
			});
		}
		self.events.emit(&WorldEvent::TickEnded { tick: self.tick });

		Ok(changes)
	}
}
