//! Run context identifying one logical pipeline execution.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one logical execution of the pipeline.
///
/// The logical date is a data partition key, not a wall-clock time:
/// re-running the pipeline for the same date produces exactly the same
/// derived paths and keys, so retries overwrite rather than duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    /// Unique ID for this invocation of the run.
    pub run_id: Uuid,
    /// The logical date this run covers.
    pub logical_date: NaiveDate,
}

impl RunContext {
    /// Creates a new run context for a logical date.
    #[must_use]
    pub fn new(logical_date: NaiveDate) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            logical_date,
        }
    }

    /// Creates a run context with an explicit run ID.
    ///
    /// Used when resuming a run after a process restart, so recorded
    /// state keeps correlating with the same invocation.
    #[must_use]
    pub fn with_run_id(logical_date: NaiveDate, run_id: Uuid) -> Self {
        Self { run_id, logical_date }
    }

    /// Returns the logical date in compact `YYYYMMDD` form.
    ///
    /// Embedded in file names so two dates never share a key.
    #[must_use]
    pub fn ds_nodash(&self) -> String {
        self.logical_date.format("%Y%m%d").to_string()
    }

    /// Returns the date-partitioned path fragment, `YYYY/MM/DD`.
    #[must_use]
    pub fn date_path(&self) -> String {
        self.logical_date.format("%Y/%m/%d").to_string()
    }

    /// Returns the logical date in ISO form, `YYYY-MM-DD`.
    #[must_use]
    pub fn ds(&self) -> String {
        self.logical_date.format("%Y-%m-%d").to_string()
    }
}
