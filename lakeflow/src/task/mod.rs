//! Task units: the atomic, named, retryable nodes of the graph.

mod kind;
mod outcome;
mod state;

pub use kind::TaskKind;
pub use outcome::{ArtifactHandle, TaskInputs, TaskOutcome};
pub use state::TaskState;

use crate::errors::GraphValidationError;
use crate::graph::TriggerRule;
use serde::{Deserialize, Serialize};

/// Default retry budget: one retry after the initial attempt.
pub const DEFAULT_RETRIES: u32 = 1;

/// One node of the task graph: a named, retryable wrapper around
/// exactly one external connector operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUnit {
    /// Graph-scoped unique name.
    pub name: String,
    /// The operation this unit performs.
    pub kind: TaskKind,
    /// Gate applied to this unit's predecessors.
    pub trigger_rule: TriggerRule,
    /// Retries allowed after the initial attempt.
    pub retries: u32,
}

impl TaskUnit {
    /// Creates a task unit with the default trigger rule and retry budget.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            name: name.into(),
            kind,
            trigger_rule: TriggerRule::AllSuccess,
            retries: DEFAULT_RETRIES,
        }
    }

    /// Creates an inert marker unit (entry/exit node).
    #[must_use]
    pub fn marker(name: impl Into<String>) -> Self {
        Self::new(name, TaskKind::Marker)
    }

    /// Sets the trigger rule.
    #[must_use]
    pub fn with_trigger_rule(mut self, rule: TriggerRule) -> Self {
        self.trigger_rule = rule;
        self
    }

    /// Overrides the retry budget.
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Total attempts the unit may make: the initial one plus retries.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.retries + 1
    }

    /// Validates the unit definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or whitespace-only.
    pub fn validate(&self) -> Result<(), GraphValidationError> {
        if self.name.trim().is_empty() {
            return Err(GraphValidationError::new(
                "Task unit name cannot be empty or whitespace-only",
            ));
        }
        Ok(())
    }
}
