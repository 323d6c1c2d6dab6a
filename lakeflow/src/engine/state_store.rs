//! Durable per-run, per-unit state records.
//!
//! Records are keyed by `(logical_date, unit_name)` so a process
//! restart can resume a run: units recorded `Success` are not executed
//! again, and their persisted outcomes keep feeding dependents.

use crate::errors::FlowError;
use crate::task::{TaskOutcome, TaskState};
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;

/// One recorded state transition for a unit within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    /// The recorded state.
    pub state: TaskState,
    /// Attempts made so far.
    pub attempts: u32,
    /// The outcome, present once the unit succeeded.
    pub outcome: Option<TaskOutcome>,
    /// The last failure message, if any.
    pub error: Option<String>,
}

impl StateRecord {
    /// Creates a record for a state with no outcome or error.
    #[must_use]
    pub fn new(state: TaskState, attempts: u32) -> Self {
        Self {
            state,
            attempts,
            outcome: None,
            error: None,
        }
    }

    /// Attaches the unit's outcome.
    #[must_use]
    pub fn with_outcome(mut self, outcome: TaskOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Attaches a failure message.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Store for per-run, per-unit state records.
#[async_trait]
pub trait StateStore: Send + Sync + Debug {
    /// Records the state of a unit for a logical date, replacing any
    /// prior record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted.
    async fn record(
        &self,
        logical_date: NaiveDate,
        unit: &str,
        record: StateRecord,
    ) -> Result<(), FlowError>;

    /// Returns the recorded state of a unit, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn get(
        &self,
        logical_date: NaiveDate,
        unit: &str,
    ) -> Result<Option<StateRecord>, FlowError>;

    /// Returns all recorded unit states for a logical date.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn run_states(
        &self,
        logical_date: NaiveDate,
    ) -> Result<HashMap<String, StateRecord>, FlowError>;
}

/// A concurrent in-memory state store.
///
/// Durable only for the lifetime of the process; deployments wanting
/// restart resume back this trait with real storage.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    records: DashMap<(NaiveDate, String), StateRecord>,
}

impl InMemoryStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn record(
        &self,
        logical_date: NaiveDate,
        unit: &str,
        record: StateRecord,
    ) -> Result<(), FlowError> {
        self.records.insert((logical_date, unit.to_string()), record);
        Ok(())
    }

    async fn get(
        &self,
        logical_date: NaiveDate,
        unit: &str,
    ) -> Result<Option<StateRecord>, FlowError> {
        Ok(self
            .records
            .get(&(logical_date, unit.to_string()))
            .map(|r| r.clone()))
    }

    async fn run_states(
        &self,
        logical_date: NaiveDate,
    ) -> Result<HashMap<String, StateRecord>, FlowError> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.key().0 == logical_date)
            .map(|entry| (entry.key().1.clone(), entry.value().clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::ArtifactHandle;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[tokio::test]
    async fn test_record_and_get() {
        let store = InMemoryStateStore::new();
        let record = StateRecord::new(TaskState::Success, 1)
            .with_outcome(TaskOutcome::with_artifact(ArtifactHandle::new("b", "k")));

        store.record(date(5), "extract", record.clone()).await.unwrap();

        let loaded = store.get(date(5), "extract").await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(store.get(date(6), "extract").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_replaces() {
        let store = InMemoryStateStore::new();
        store
            .record(date(5), "load", StateRecord::new(TaskState::Running, 1))
            .await
            .unwrap();
        store
            .record(
                date(5),
                "load",
                StateRecord::new(TaskState::Failed, 2).with_error("timeout"),
            )
            .await
            .unwrap();

        let loaded = store.get(date(5), "load").await.unwrap().unwrap();
        assert_eq!(loaded.state, TaskState::Failed);
        assert_eq!(loaded.attempts, 2);
        assert_eq!(loaded.error.as_deref(), Some("timeout"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_run_states_isolated_by_date() {
        let store = InMemoryStateStore::new();
        store
            .record(date(5), "extract", StateRecord::new(TaskState::Success, 1))
            .await
            .unwrap();
        store
            .record(date(5), "load", StateRecord::new(TaskState::Failed, 2))
            .await
            .unwrap();
        store
            .record(date(6), "extract", StateRecord::new(TaskState::Running, 1))
            .await
            .unwrap();

        let day5 = store.run_states(date(5)).await.unwrap();
        assert_eq!(day5.len(), 2);
        assert_eq!(day5["extract"].state, TaskState::Success);

        let day6 = store.run_states(date(6)).await.unwrap();
        assert_eq!(day6.len(), 1);
    }
}
