//! Run reports and overall status computation.

use crate::graph::{TaskGraph, TriggerRule};
use crate::task::TaskState;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Overall status of one run of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every all-success-gated unit succeeded.
    Success,
    /// Some all-success-gated unit failed or was skipped upstream.
    Failed,
    /// The run was cancelled before the graph drained.
    Cancelled,
}

/// Final state of one unit within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReport {
    /// The unit's final state.
    pub state: TaskState,
    /// Attempts made.
    pub attempts: u32,
    /// The last failure message, if any.
    pub error: Option<String>,
}

/// The observable result of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Name of the executed graph.
    pub graph_name: String,
    /// The logical date the run covered.
    pub logical_date: NaiveDate,
    /// The run invocation ID.
    pub run_id: Uuid,
    /// Overall status.
    pub status: RunStatus,
    /// Per-unit final states.
    pub units: BTreeMap<String, UnitReport>,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: f64,
}

impl RunReport {
    /// Returns the report for a unit, if it exists in the graph.
    #[must_use]
    pub fn unit(&self, name: &str) -> Option<&UnitReport> {
        self.units.get(name)
    }

    /// Returns true if the run succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// Computes the overall status from per-unit final states.
///
/// A run is failed if any all-success-gated unit ended `Failed` or
/// `UpstreamFailed`. An all-done join's own failure is reported in its
/// unit entry but does not mask the branches it joins. Non-terminal
/// units mean the run was cut short and count as cancelled.
#[must_use]
pub fn overall_status(graph: &TaskGraph, units: &BTreeMap<String, UnitReport>) -> RunStatus {
    let mut failed = false;
    for unit in graph.units() {
        let Some(report) = units.get(&unit.name) else {
            return RunStatus::Cancelled;
        };
        if !report.state.is_terminal() {
            return RunStatus::Cancelled;
        }
        if unit.trigger_rule == TriggerRule::AllSuccess && report.state.is_failure() {
            failed = true;
        }
    }
    if failed {
        RunStatus::Failed
    } else {
        RunStatus::Success
    }
}
