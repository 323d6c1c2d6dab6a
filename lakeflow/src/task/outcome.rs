//! Task outcomes and the produced-artifact handoff between units.
//!
//! A unit's result travels to its dependents as an explicit
//! [`ArtifactHandle`] resolved by the engine at dispatch time, not
//! through a shared key-value store.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A reference to an object a unit produced in external storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHandle {
    /// Bucket holding the object.
    pub bucket: String,
    /// Object key.
    pub key: String,
}

impl ArtifactHandle {
    /// Creates a new artifact handle.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// The successful result of one task unit execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Handle to the object this unit produced, if any.
    pub artifact: Option<ArtifactHandle>,
}

impl TaskOutcome {
    /// An outcome with no produced artifact.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// An outcome carrying a produced artifact.
    #[must_use]
    pub fn with_artifact(artifact: ArtifactHandle) -> Self {
        Self {
            artifact: Some(artifact),
        }
    }
}

/// Read-only view of predecessor outcomes handed to a unit at dispatch.
///
/// Only direct predecessors are visible; a unit cannot reach across the
/// graph for results it did not declare an edge to.
#[derive(Debug, Clone, Default)]
pub struct TaskInputs {
    outcomes: HashMap<String, TaskOutcome>,
}

impl TaskInputs {
    /// Builds inputs from the outcomes of the named predecessors.
    #[must_use]
    pub fn new(outcomes: HashMap<String, TaskOutcome>) -> Self {
        Self { outcomes }
    }

    /// Returns the outcome of a predecessor, if it completed.
    #[must_use]
    pub fn outcome(&self, unit: &str) -> Option<&TaskOutcome> {
        self.outcomes.get(unit)
    }

    /// Returns the artifact a predecessor produced, if any.
    #[must_use]
    pub fn artifact(&self, unit: &str) -> Option<&ArtifactHandle> {
        self.outcomes.get(unit).and_then(|o| o.artifact.as_ref())
    }

    /// Returns the number of predecessor outcomes available.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if no predecessor outcomes are available.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
