//! # Lakeflow
//!
//! A task-graph execution engine for landing-zone ELT pipelines.
//!
//! Lakeflow models a pipeline run as a directed acyclic graph of task
//! units walked once per logical date:
//!
//! - **Graph model**: explicit builder, trigger rules, cycle detection
//! - **Execution engine**: bounded concurrency, retry budgets, resumable
//!   state recording
//! - **Connector seams**: source extraction, object storage and
//!   warehouse traits with in-memory fakes for testing
//! - **Event-driven observability**: lifecycle event emission per unit
//! - **Cancellation handling**: cooperative scheduling stop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lakeflow::prelude::*;
//!
//! let config = PipelineConfig::new("landing", "raw", "customers_staging");
//! let ctx = RunContext::new(logical_date);
//! let graph = crm_accounts(&config, &ctx)?;
//!
//! let report = Executor::new(connectors)
//!     .run(&graph, &ctx, &CancelToken::new())
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod connectors;
pub mod context;
pub mod engine;
pub mod errors;
pub mod events;
pub mod graph;
pub mod pipelines;
pub mod task;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancelToken;
    pub use crate::connectors::{
        Connectors, ObjectStoreConnector, SourceQueryConnector, WarehouseConnector,
    };
    pub use crate::context::{PipelineConfig, RunContext};
    pub use crate::engine::{
        overall_status, Executor, InMemoryStateStore, RetryPolicy, RunReport, RunStatus,
        StateRecord, StateStore, UnitReport,
    };
    pub use crate::errors::{
        ConnectorError, CycleDetectedError, FlowError, GraphValidationError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::graph::{GraphBuilder, TaskGraph, TriggerDecision, TriggerRule};
    pub use crate::pipelines::{crm_accounts, units};
    pub use crate::task::{
        ArtifactHandle, TaskInputs, TaskKind, TaskOutcome, TaskState, TaskUnit,
    };
}
