//! Drives the [`ChunkTracker`] through its once-per-tick propose/commit protocol.

use super::{
	chunk::{ChunkTracker, Observer, ObserverId, TaskProposal, TrackingInfo, UnwatchTask, WatchTask},
	claim::ShipyardBounds,
	ownership::OwnershipIndex,
	ship::DimensionId,
};
use crate::common::stage::{self, StageEnforcer};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
	PreTick,
	SetExecuted,
	PostTick,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error(transparent)]
	Stage(#[from] stage::Error),
	#[error(transparent)]
	Tracking(#[from] super::chunk::Error),
}

/// Owns the chunk tracker for a world and checks that every tick proposes tasks,
/// commits the executed ones, and consumes the result, in that order.
pub struct ShipLoadManager {
	tracker: ChunkTracker,
	enforcer: StageEnforcer<LoadStage>,
	proposal: TaskProposal,
	tracking_info: Option<TrackingInfo>,
}

impl ShipLoadManager {
	pub fn new(watch_radius: f64, shipyard: ShipyardBounds, claim_diameter: i32) -> Result<Self, Error> {
		Ok(Self {
			tracker: ChunkTracker::new(watch_radius, shipyard, claim_diameter)?,
			enforcer: StageEnforcer::builder(LoadStage::PreTick)
				.require_stages_and_order([
					LoadStage::PreTick,
					LoadStage::SetExecuted,
					LoadStage::PostTick,
				])
				.build(),
			proposal: TaskProposal::default(),
			tracking_info: None,
		})
	}

	pub fn pre_tick<'a>(
		&mut self,
		observers: impl IntoIterator<Item = &'a Observer>,
		ships: &OwnershipIndex,
		tick: u64,
	) -> Result<(), Error> {
		self.enforcer.stage(LoadStage::PreTick)?;
		self.proposal = self.tracker.propose_tasks(observers, ships, tick);
		Ok(())
	}

	/// The tasks proposed this tick, each list in ascending priority.
	pub fn proposal(&self) -> &TaskProposal {
		&self.proposal
	}

	pub fn set_executed(
		&mut self,
		watch_tasks: &[WatchTask],
		unwatch_tasks: &[UnwatchTask],
	) -> Result<(), Error> {
		self.enforcer.stage(LoadStage::SetExecuted)?;
		let info = self.tracker.commit_executed(watch_tasks, unwatch_tasks)?;
		self.tracking_info = Some(info);
		Ok(())
	}

	/// Hands over the tracking info committed this tick.
	pub fn post_tick(&mut self) -> Result<TrackingInfo, Error> {
		self.enforcer.stage(LoadStage::PostTick)?;
		self.proposal = TaskProposal::default();
		Ok(self.tracking_info.take().unwrap_or_default())
	}

	pub fn query(&self, chunk_x: i32, chunk_z: i32, dimension: &DimensionId) -> BTreeSet<ObserverId> {
		self.tracker.query(chunk_x, chunk_z, dimension)
	}
}
