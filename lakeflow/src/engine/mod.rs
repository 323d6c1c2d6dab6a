//! Execution engine: graph walking, retries, state recording, reports.

mod executor;
mod report;
mod retry;
mod state_store;

pub use executor::{Executor, DEFAULT_MAX_CONCURRENCY};
pub use report::{overall_status, RunReport, RunStatus, UnitReport};
pub use retry::RetryPolicy;
pub use state_store::{InMemoryStateStore, StateRecord, StateStore};
