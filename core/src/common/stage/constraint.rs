use std::fmt::Debug;

/// One element of an ordering pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<S> {
	/// Exactly one occurrence of the stage.
	Single(S),
	/// Zero or more occurrences of any of the stages, in any order.
	AnyOf(Vec<S>),
}

impl<S> Step<S> {
	pub fn any_of(stages: impl IntoIterator<Item = S>) -> Self {
		Self::AnyOf(stages.into_iter().collect())
	}
}

impl<S: PartialEq> Step<S> {
	fn matches(&self, stage: &S) -> bool {
		match self {
			Self::Single(expected) => expected == stage,
			Self::AnyOf(stages) => stages.contains(stage),
		}
	}

	fn is_optional(&self) -> bool {
		matches!(self, Self::AnyOf(_))
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint<S> {
	/// The stages named by the pattern must occur in the pattern's order.
	/// Stages not named by the pattern are not considered.
	Order(Vec<Step<S>>),
	/// The completed sequence must end on the stage.
	Final(S),
}

impl<S> Constraint<S>
where
	S: Copy + Eq + Debug,
{
	/// Returns a description of the failure, or None if `stages` satisfies the constraint.
	/// When `completed` is false, `stages` only needs to be a valid prefix.
	pub(super) fn check(&self, stages: &[S], completed: bool) -> Option<String> {
		match self {
			Self::Order(steps) => Self::check_order(steps, stages, completed),
			Self::Final(stage) => {
				if !completed || stages.last() == Some(stage) {
					None
				} else {
					Some(format!(
						"Expected final stage {:?}, but was {:?}",
						stage,
						stages.last()
					))
				}
			}
		}
	}

	fn check_order(steps: &[Step<S>], stages: &[S], completed: bool) -> Option<String> {
		let relevant = stages
			.iter()
			.filter(|stage| steps.iter().any(|step| step.matches(stage)));
		let mut index = 0;
		for stage in relevant {
			// Optional steps are greedy; fall through them until some step accepts the stage.
			loop {
				let step = match steps.get(index) {
					Some(step) => step,
					None => {
						return Some(format!(
							"Stage {:?} occurred after the ordered sequence {:?} was complete",
							stage, steps
						))
					}
				};
				match step {
					Step::Single(expected) if expected == stage => {
						index += 1;
						break;
					}
					Step::Single(expected) => {
						return Some(format!(
							"Expected stage {:?} but got {:?} (order {:?})",
							expected, stage, steps
						));
					}
					Step::AnyOf(_) if step.matches(stage) => break,
					Step::AnyOf(_) => index += 1,
				}
			}
		}
		if completed {
			if let Some(missing) = steps[index.min(steps.len())..]
				.iter()
				.find(|step| !step.is_optional())
			{
				return Some(format!(
					"Sequence ended before required step {:?} (order {:?})",
					missing, steps
				));
			}
		}
		None
	}
}
