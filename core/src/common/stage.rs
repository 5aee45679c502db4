//! Runtime protocol checking for per-tick call sequences.
//!
//! A [`StageEnforcer`] is told about every checkpoint ("stage") a component passes through during a tick.
//! Each call appends to the sequence of stages since the last reset, and the configured [`Constraint`]s
//! are re-evaluated immediately so that an out-of-order call faults at the call site which caused it.
//! When the reset stage is seen again, the completed sequence is checked as a whole before being cleared.

mod constraint;
pub use constraint::*;

use std::fmt::Debug;

static LOG: &'static str = "stage";

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
	#[error("first executed stage must be the reset stage {reset}, but was {stage}")]
	FirstStageNotReset { reset: String, stage: String },
	#[error("stage constraints failed (completed sequence: {completed}). Stages since last reset: {stages}\n{}", .failures.join("\n"))]
	ConstraintsFailed {
		completed: bool,
		stages: String,
		failures: Vec<String>,
	},
}

pub struct StageEnforcer<S> {
	reset_stage: S,
	constraints: Vec<Constraint<S>>,
	ignore_until_first_reset: bool,
	ignore_repeat_failures: bool,
	/// Failures of the last reported error, until a tick completes cleanly.
	last_failures: Option<Vec<String>>,
	stages_since_reset: Vec<S>,
}

impl<S> StageEnforcer<S>
where
	S: Copy + Eq + Debug,
{
	pub fn builder(reset_stage: S) -> Builder<S> {
		Builder {
			reset_stage,
			constraints: Vec::new(),
			ignore_until_first_reset: false,
			ignore_repeat_failures: false,
		}
	}

	pub fn reset_stage(&self) -> S {
		self.reset_stage
	}

	/// Records that `stage` has been reached.
	///
	/// Returns an error if any constraint is violated. The error indicates a bug in the caller's
	/// integration and is not recoverable; the enforcer's history is left as it was before the call.
	///
	/// With [`ignore_repeat_failures`](Builder::ignore_repeat_failures), a violation identical to the
	/// one last reported is skipped instead: a failed tick is abandoned and a new one begins at the
	/// reset stage, and an out-of-order stage is dropped.
	pub fn stage(&mut self, stage: S) -> Result<(), Error> {
		let reset = stage == self.reset_stage;

		if self.stages_since_reset.is_empty() && !reset {
			if self.ignore_until_first_reset {
				return Ok(());
			}
			return Err(Error::FirstStageNotReset {
				reset: format!("{:?}", self.reset_stage),
				stage: format!("{:?}", stage),
			});
		}

		if reset && !self.stages_since_reset.is_empty() {
			let failures = self.failures(&self.stages_since_reset, true);
			if failures.is_empty() {
				self.last_failures = None;
			} else if !self.is_repeat(&failures) {
				let stages = format!("{:?}", self.stages_since_reset);
				return Err(self.report(true, stages, failures));
			}
			self.stages_since_reset.clear();
		}

		self.stages_since_reset.push(stage);
		let failures = self.failures(&self.stages_since_reset, false);
		if !failures.is_empty() {
			let stages = format!("{:?}", self.stages_since_reset);
			self.stages_since_reset.pop();
			if !self.is_repeat(&failures) {
				return Err(self.report(false, stages, failures));
			}
		}

		Ok(())
	}

	fn is_repeat(&self, failures: &[String]) -> bool {
		if self.ignore_repeat_failures && self.last_failures.as_deref() == Some(failures) {
			log::debug!(target: LOG, "Skipping repeated stage failure: {}", failures.join("; "));
			return true;
		}
		false
	}

	fn report(&mut self, completed: bool, stages: String, failures: Vec<String>) -> Error {
		self.last_failures = Some(failures.clone());
		Error::ConstraintsFailed {
			completed,
			stages,
			failures,
		}
	}

	fn failures(&self, stages: &[S], completed: bool) -> Vec<String> {
		self.constraints
			.iter()
			.filter_map(|constraint| constraint.check(stages, completed))
			.collect()
	}
}

pub struct Builder<S> {
	reset_stage: S,
	constraints: Vec<Constraint<S>>,
	ignore_until_first_reset: bool,
	ignore_repeat_failures: bool,
}

impl<S> Builder<S>
where
	S: Copy + Eq + Debug,
{
	/// Stages reported before the reset stage is seen for the first time are not checked.
	pub fn ignore_until_first_reset(mut self) -> Self {
		self.ignore_until_first_reset = true;
		self
	}

	/// A constraint failure is only reported once while it keeps repeating;
	/// it is reported again after a tick completes without failures.
	pub fn ignore_repeat_failures(mut self) -> Self {
		self.ignore_repeat_failures = true;
		self
	}

	/// The stages (filtered to those named by `steps`) must follow the pattern described by `steps`.
	pub fn require_order(mut self, steps: impl IntoIterator<Item = Step<S>>) -> Self {
		self.constraints
			.push(Constraint::Order(steps.into_iter().collect()));
		self
	}

	/// Every one of `stages` must happen exactly once per tick, in the provided order.
	pub fn require_stages_and_order(self, stages: impl IntoIterator<Item = S>) -> Self {
		self.require_order(stages.into_iter().map(Step::Single))
	}

	/// The last stage before the next reset must be `stage`.
	pub fn require_final(mut self, stage: S) -> Self {
		self.constraints.push(Constraint::Final(stage));
		self
	}

	pub fn build(self) -> StageEnforcer<S> {
		StageEnforcer {
			reset_stage: self.reset_stage,
			constraints: self.constraints,
			ignore_until_first_reset: self.ignore_until_first_reset,
			ignore_repeat_failures: self.ignore_repeat_failures,
			last_failures: None,
			stages_since_reset: Vec::new(),
		}
	}
}

#[cfg(test)]
mod stage_enforcer {
	use super::*;

	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	enum Stage {
		PreTick,
		UpdateBlocks,
		UpdateChunks,
		PostTick,
	}
	use Stage::*;

	fn world_enforcer() -> StageEnforcer<Stage> {
		StageEnforcer::builder(PreTick)
			.require_order([
				Step::Single(PreTick),
				Step::any_of([UpdateBlocks, UpdateChunks]),
				Step::Single(PostTick),
			])
			.require_final(PostTick)
			.build()
	}

	#[test]
	fn full_ticks_pass_repeatedly() {
		let mut enforcer = world_enforcer();
		for _ in 0..5 {
			assert_eq!(enforcer.stage(PreTick), Ok(()));
			assert_eq!(enforcer.stage(UpdateBlocks), Ok(()));
			assert_eq!(enforcer.stage(UpdateChunks), Ok(()));
			assert_eq!(enforcer.stage(UpdateBlocks), Ok(()));
			assert_eq!(enforcer.stage(PostTick), Ok(()));
		}
	}

	#[test]
	fn optional_stages_may_be_skipped() {
		let mut enforcer = world_enforcer();
		for _ in 0..3 {
			assert_eq!(enforcer.stage(PreTick), Ok(()));
			assert_eq!(enforcer.stage(PostTick), Ok(()));
		}
	}

	#[test]
	fn first_stage_must_be_reset() {
		let mut enforcer = world_enforcer();
		assert!(matches!(
			enforcer.stage(UpdateBlocks),
			Err(Error::FirstStageNotReset { .. })
		));
	}

	#[test]
	fn ignores_stages_until_first_reset() {
		let mut enforcer = StageEnforcer::builder(PreTick)
			.ignore_until_first_reset()
			.require_stages_and_order([PreTick, PostTick])
			.build();
		assert_eq!(enforcer.stage(PostTick), Ok(()));
		assert_eq!(enforcer.stage(UpdateBlocks), Ok(()));
		assert_eq!(enforcer.stage(PreTick), Ok(()));
		assert_eq!(enforcer.stage(PostTick), Ok(()));
	}

	#[test]
	fn missing_final_stage_faults_on_reset() {
		let mut enforcer = world_enforcer();
		assert_eq!(enforcer.stage(PreTick), Ok(()));
		assert_eq!(enforcer.stage(UpdateBlocks), Ok(()));
		assert!(matches!(
			enforcer.stage(PreTick),
			Err(Error::ConstraintsFailed {
				completed: true,
				..
			})
		));
	}

	#[test]
	fn out_of_order_faults_immediately() {
		let mut enforcer = world_enforcer();
		assert_eq!(enforcer.stage(PreTick), Ok(()));
		assert_eq!(enforcer.stage(PostTick), Ok(()));
		assert!(matches!(
			enforcer.stage(UpdateBlocks),
			Err(Error::ConstraintsFailed {
				completed: false,
				..
			})
		));
	}

	#[test]
	fn repeated_failures_are_reported_once() {
		let mut enforcer = StageEnforcer::builder(PreTick)
			.ignore_repeat_failures()
			.require_order([
				Step::Single(PreTick),
				Step::any_of([UpdateBlocks]),
				Step::Single(PostTick),
			])
			.require_final(PostTick)
			.build();

		// A tick missing its final stage, twice in a row.
		assert_eq!(enforcer.stage(PreTick), Ok(()));
		assert_eq!(enforcer.stage(UpdateBlocks), Ok(()));
		assert!(enforcer.stage(PreTick).is_err());
		assert_eq!(enforcer.stage(PreTick), Ok(()));
		assert_eq!(enforcer.stage(UpdateBlocks), Ok(()));
		assert_eq!(enforcer.stage(PreTick), Ok(()));

		// A different failure is still reported, and so is its repeat after a clean tick.
		assert_eq!(enforcer.stage(PostTick), Ok(()));
		assert!(enforcer.stage(UpdateBlocks).is_err());
		assert_eq!(enforcer.stage(UpdateBlocks), Ok(()));
		assert_eq!(enforcer.stage(PreTick), Ok(()));
		assert_eq!(enforcer.stage(PostTick), Ok(()));
		assert_eq!(enforcer.stage(PreTick), Ok(()));
		assert_eq!(enforcer.stage(PostTick), Ok(()));
		assert!(enforcer.stage(UpdateBlocks).is_err());
	}

	#[test]
	fn repeated_failures_fault_by_default() {
		let mut enforcer = world_enforcer();
		assert_eq!(enforcer.stage(PreTick), Ok(()));
		assert_eq!(enforcer.stage(PostTick), Ok(()));
		assert!(enforcer.stage(UpdateBlocks).is_err());
		assert!(enforcer.stage(UpdateBlocks).is_err());
	}

	#[test]
	fn post_tick_as_reset() {
		let mut enforcer = StageEnforcer::builder(PostTick)
			.ignore_until_first_reset()
			.require_order([
				Step::Single(PostTick),
				Step::Single(PreTick),
				Step::any_of([UpdateBlocks]),
			])
			.build();
		for _ in 0..4 {
			assert_eq!(enforcer.stage(PreTick), Ok(()));
			assert_eq!(enforcer.stage(UpdateBlocks), Ok(()));
			assert_eq!(enforcer.stage(PostTick), Ok(()));
		}
		// PostTick never arrived before the next PreTick
		assert_eq!(enforcer.stage(PreTick), Ok(()));
		assert_eq!(enforcer.stage(UpdateBlocks), Ok(()));
		assert!(enforcer.stage(PreTick).is_err());
	}
}
