//! Trigger rules: how a unit's eligibility is decided from the
//! terminal states of its predecessors.

use crate::task::TaskState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy at a join determining whether a unit executes given its
/// predecessors' states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerRule {
    /// Run only once every predecessor succeeded. If any predecessor
    /// ends in failure, the unit is skipped as upstream-failed.
    AllSuccess,
    /// Run once every predecessor reached any terminal state,
    /// regardless of outcome. Never skips.
    AllDone,
}

impl Default for TriggerRule {
    fn default() -> Self {
        Self::AllSuccess
    }
}

impl fmt::Display for TriggerRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllSuccess => write!(f, "all_success"),
            Self::AllDone => write!(f, "all_done"),
        }
    }
}

/// The outcome of evaluating a trigger rule against predecessor states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// All gates are satisfied; the unit may run now.
    Fire,
    /// The unit will never run; mark it upstream-failed.
    Skip,
    /// Some predecessor has not reached a deciding state yet.
    Wait,
}

impl TriggerRule {
    /// Evaluates the rule over the states of a unit's predecessors.
    ///
    /// An empty predecessor list always fires (entry units).
    #[must_use]
    pub fn evaluate<'a, I>(&self, predecessor_states: I) -> TriggerDecision
    where
        I: IntoIterator<Item = &'a TaskState>,
    {
        match self {
            Self::AllSuccess => {
                let mut all_success = true;
                for state in predecessor_states {
                    // One terminal failure settles the decision even if
                    // other predecessors are still running.
                    if state.is_failure() {
                        return TriggerDecision::Skip;
                    }
                    if !state.is_success() {
                        all_success = false;
                    }
                }
                if all_success {
                    TriggerDecision::Fire
                } else {
                    TriggerDecision::Wait
                }
            }
            Self::AllDone => {
                for state in predecessor_states {
                    if !state.is_terminal() {
                        return TriggerDecision::Wait;
                    }
                }
                TriggerDecision::Fire
            }
        }
    }
}
