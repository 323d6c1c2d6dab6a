//! Connector contracts the task graph depends on.
//!
//! These traits are the boundary of the core: credential handling, wire
//! protocols and SQL text all live behind them. The contracts each
//! operation must honor (overwrite semantics, no-op deletes, merge-keyed
//! transforms) are documented per method; the graph's ordering
//! guarantees assume them.

mod memory;

pub use memory::{InMemoryObjectStore, InMemorySource, InMemoryWarehouse};

use crate::errors::ConnectorError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Queries the source CRM and writes the result to object storage.
#[async_trait]
pub trait SourceQueryConnector: Send + Sync + Debug {
    /// Runs the referenced query and writes the result object to
    /// `{bucket, key}`.
    ///
    /// Must overwrite deterministically: re-invoking with the same key
    /// replaces the object rather than appending or erroring.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] if the query or the write fails.
    async fn run(&self, query_ref: &str, bucket: &str, key: &str) -> Result<(), ConnectorError>;
}

/// Object-storage operations.
#[async_trait]
pub trait ObjectStoreConnector: Send + Sync + Debug {
    /// Copies an object. Copying onto an existing destination key is a
    /// safe overwrite.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] if the source is missing or the
    /// copy fails.
    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<(), ConnectorError>;

    /// Deletes objects. Deleting an absent key is a no-op, not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] only on storage failures.
    async fn delete(&self, bucket: &str, keys: &[String]) -> Result<(), ConnectorError>;

    /// Lists object keys under a prefix.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] if the listing fails.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, ConnectorError>;
}

/// Warehouse DDL/DML and bulk-load operations.
///
/// Implementations are not required to serialize loads from concurrent
/// runs sharing one staging table; callers overlapping logical dates on
/// the same table must arrange table-level exclusion themselves.
#[async_trait]
pub trait WarehouseConnector: Send + Sync + Debug {
    /// Truncates a staging table. Truncating an empty or absent table
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] if the statement fails.
    async fn truncate_table(&self, table: &str) -> Result<(), ConnectorError>;

    /// Executes the referenced SQL statement.
    ///
    /// Transform statements must use merge/upsert semantics keyed on a
    /// natural business key, so re-execution over identical staging
    /// input is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] if the statement fails.
    async fn execute_sql(&self, statement_ref: &str) -> Result<(), ConnectorError>;

    /// Loads all objects under `prefix` through the named stage into
    /// `table`. Appends without dedup; at-most-once accumulation is the
    /// caller's responsibility (truncate-then-load).
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] if the load fails.
    async fn bulk_load(
        &self,
        stage_ref: &str,
        prefix: &str,
        file_format: &str,
        table: &str,
    ) -> Result<(), ConnectorError>;
}

/// The connector set a run executes against.
#[derive(Debug, Clone)]
pub struct Connectors {
    /// Source CRM connector.
    pub source: Arc<dyn SourceQueryConnector>,
    /// Object-storage connector.
    pub storage: Arc<dyn ObjectStoreConnector>,
    /// Warehouse connector.
    pub warehouse: Arc<dyn WarehouseConnector>,
}

impl Connectors {
    /// Bundles the three connectors.
    #[must_use]
    pub fn new(
        source: Arc<dyn SourceQueryConnector>,
        storage: Arc<dyn ObjectStoreConnector>,
        warehouse: Arc<dyn WarehouseConnector>,
    ) -> Self {
        Self {
            source,
            storage,
            warehouse,
        }
    }
}
