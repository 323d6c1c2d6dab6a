//! Error types for the lakeflow pipeline model.
//!
//! The taxonomy separates connector failures (transient vs permanent,
//! which drives the retry decision) from graph construction failures,
//! which are always programming errors surfaced at build time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for lakeflow operations.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A graph validation error occurred.
    #[error("{0}")]
    Validation(#[from] GraphValidationError),

    /// A cycle was detected in the task graph.
    #[error("{0}")]
    CycleDetected(#[from] CycleDetectedError),

    /// A connector operation failed.
    #[error("{0}")]
    Connector(#[from] ConnectorError),

    /// The run was cancelled before the graph drained.
    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// The state store rejected or lost a record.
    #[error("State store error: {0}")]
    StateStore(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure reported by an external connector.
///
/// The `Transient` variant is retried up to the owning task unit's
/// budget; `Permanent` fails the unit immediately.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum ConnectorError {
    /// A transient failure (network, timeout, throttling).
    #[error("Transient connector error in '{connector}': {message}")]
    Transient {
        /// The connector that failed.
        connector: String,
        /// Description of the failure.
        message: String,
    },

    /// A permanent failure (auth, bad request, missing required object).
    #[error("Permanent connector error in '{connector}': {message}")]
    Permanent {
        /// The connector that failed.
        connector: String,
        /// Description of the failure.
        message: String,
    },
}

impl ConnectorError {
    /// Creates a transient error.
    #[must_use]
    pub fn transient(connector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            connector: connector.into(),
            message: message.into(),
        }
    }

    /// Creates a permanent error.
    #[must_use]
    pub fn permanent(connector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Permanent {
            connector: connector.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error should be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns the name of the connector that failed.
    #[must_use]
    pub fn connector(&self) -> &str {
        match self {
            Self::Transient { connector, .. } | Self::Permanent { connector, .. } => connector,
        }
    }
}

/// Error raised when task graph validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GraphValidationError {
    /// The error message.
    pub message: String,
    /// The task units involved in the error.
    pub units: Vec<String>,
}

impl GraphValidationError {
    /// Creates a new graph validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            units: Vec::new(),
        }
    }

    /// Sets the units involved.
    #[must_use]
    pub fn with_units(mut self, units: Vec<String>) -> Self {
        self.units = units;
        self
    }
}

/// Error raised when a cycle is detected in the task graph.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in task graph: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of units forming the cycle.
    pub cycle_path: Vec<String>,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        Self { cycle_path }
    }
}

impl From<CycleDetectedError> for GraphValidationError {
    fn from(err: CycleDetectedError) -> Self {
        GraphValidationError {
            message: err.to_string(),
            units: err.cycle_path,
        }
    }
}
