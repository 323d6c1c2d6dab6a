//! Per-unit execution state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution state of a task unit within one run.
///
/// Legal transitions:
/// `Pending -> Running -> {Success | FailedRetrying -> Running | Failed}`
/// and `Pending -> UpstreamFailed`. The last two and `Success` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Not yet eligible or not yet started.
    Pending,
    /// The unit's single external operation is in flight.
    Running,
    /// The unit completed successfully.
    Success,
    /// The last attempt failed and budget remains; will run again.
    FailedRetrying,
    /// The unit failed and its retry budget is exhausted.
    Failed,
    /// An all-success predecessor failed; the unit was never executed.
    UpstreamFailed,
}

impl Default for TaskState {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::FailedRetrying => write!(f, "failed_retrying"),
            Self::Failed => write!(f, "failed"),
            Self::UpstreamFailed => write!(f, "upstream_failed"),
        }
    }
}

impl TaskState {
    /// Returns true if the state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::UpstreamFailed)
    }

    /// Returns true if the state is a successful terminal state.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if the state is an unsuccessful terminal state.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::UpstreamFailed)
    }

    /// Returns true if `next` is a legal transition from this state.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::UpstreamFailed)
                | (Self::Running, Self::Success | Self::FailedRetrying | Self::Failed)
                | (Self::FailedRetrying, Self::Running)
        )
    }
}
