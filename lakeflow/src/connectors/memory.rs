//! In-memory connector fakes.
//!
//! Used by the crate's own tests and usable by downstream test suites.
//! They record calls, accept scripted failures, and implement the real
//! operation contracts: the object store overwrites and no-op deletes,
//! and the warehouse fake performs an actual merge-by-business-key so
//! upsert idempotence is observable.

use super::{ObjectStoreConnector, SourceQueryConnector, WarehouseConnector};
use crate::errors::ConnectorError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

/// Call recording and failure scripting shared by the fakes.
#[derive(Debug, Default)]
struct FakeControl {
    call_counts: Mutex<HashMap<String, usize>>,
    scripted_failures: Mutex<HashMap<String, VecDeque<ConnectorError>>>,
}

impl FakeControl {
    fn record(&self, op: &str) {
        *self.call_counts.lock().entry(op.to_string()).or_insert(0) += 1;
    }

    fn next_failure(&self, op: &str) -> Option<ConnectorError> {
        self.scripted_failures
            .lock()
            .get_mut(op)
            .and_then(VecDeque::pop_front)
    }

    fn push_failure(&self, op: &str, err: ConnectorError) {
        self.scripted_failures
            .lock()
            .entry(op.to_string())
            .or_default()
            .push_back(err);
    }

    fn call_count(&self, op: &str) -> usize {
        self.call_counts.lock().get(op).copied().unwrap_or(0)
    }
}

/// An in-memory object store keyed by `(bucket, key)`.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<BTreeMap<(String, String), String>>,
    control: FakeControl,
}

impl InMemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes an object, overwriting any existing one.
    pub fn put(&self, bucket: &str, key: &str, content: impl Into<String>) {
        self.objects
            .lock()
            .insert((bucket.to_string(), key.to_string()), content.into());
    }

    /// Returns an object's content, if present.
    #[must_use]
    pub fn get(&self, bucket: &str, key: &str) -> Option<String> {
        self.objects
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Returns true if the object exists.
    #[must_use]
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.get(bucket, key).is_some()
    }

    /// Returns the number of stored objects across all buckets.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }

    /// Scripts the next call to `op` ("copy", "delete", "list") to fail.
    pub fn fail_next(&self, op: &str, err: ConnectorError) {
        self.control.push_failure(op, err);
    }

    /// Returns how many times `op` was called.
    #[must_use]
    pub fn call_count(&self, op: &str) -> usize {
        self.control.call_count(op)
    }
}

#[async_trait]
impl ObjectStoreConnector for InMemoryObjectStore {
    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<(), ConnectorError> {
        self.control.record("copy");
        if let Some(err) = self.control.next_failure("copy") {
            return Err(err);
        }

        let content = self.get(src_bucket, src_key).ok_or_else(|| {
            ConnectorError::permanent(
                "object_store",
                format!("source object '{src_bucket}/{src_key}' not found"),
            )
        })?;
        self.put(dst_bucket, dst_key, content);
        Ok(())
    }

    async fn delete(&self, bucket: &str, keys: &[String]) -> Result<(), ConnectorError> {
        self.control.record("delete");
        if let Some(err) = self.control.next_failure("delete") {
            return Err(err);
        }

        let mut objects = self.objects.lock();
        for key in keys {
            // Absent keys are silently ignored.
            objects.remove(&(bucket.to_string(), key.clone()));
        }
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, ConnectorError> {
        self.control.record("list");
        if let Some(err) = self.control.next_failure("list") {
            return Err(err);
        }

        Ok(self
            .objects
            .lock()
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }
}

/// An in-memory source system that "extracts" a fixed CSV payload into
/// a shared [`InMemoryObjectStore`].
#[derive(Debug)]
pub struct InMemorySource {
    store: Arc<InMemoryObjectStore>,
    payload: Mutex<String>,
    control: FakeControl,
}

impl InMemorySource {
    /// Creates a source writing into the given store.
    #[must_use]
    pub fn new(store: Arc<InMemoryObjectStore>, payload: impl Into<String>) -> Self {
        Self {
            store,
            payload: Mutex::new(payload.into()),
            control: FakeControl::default(),
        }
    }

    /// Replaces the payload the next extraction writes.
    pub fn set_payload(&self, payload: impl Into<String>) {
        *self.payload.lock() = payload.into();
    }

    /// Scripts the next extraction to fail.
    pub fn fail_next(&self, err: ConnectorError) {
        self.control.push_failure("run", err);
    }

    /// Returns how many extractions ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.control.call_count("run")
    }
}

#[async_trait]
impl SourceQueryConnector for InMemorySource {
    async fn run(&self, _query_ref: &str, bucket: &str, key: &str) -> Result<(), ConnectorError> {
        self.control.record("run");
        if let Some(err) = self.control.next_failure("run") {
            return Err(err);
        }

        let payload = self.payload.lock().clone();
        self.store.put(bucket, key, payload);
        Ok(())
    }
}

/// An in-memory warehouse with staging tables and merge targets.
///
/// `bulk_load` reads CSV objects from a shared [`InMemoryObjectStore`]
/// through a registered named stage and appends their rows to a staging
/// table without dedup, exactly like a real staged load. `execute_sql`
/// resolves the statement reference against registered merge targets
/// and upserts staging rows into the target table keyed on the first
/// CSV column.
#[derive(Debug)]
pub struct InMemoryWarehouse {
    store: Arc<InMemoryObjectStore>,
    stages: Mutex<HashMap<String, String>>,
    staging: Mutex<HashMap<String, Vec<String>>>,
    tables: Mutex<HashMap<String, BTreeMap<String, String>>>,
    merge_targets: Mutex<HashMap<String, (String, String)>>,
    control: FakeControl,
}

impl InMemoryWarehouse {
    /// Creates a warehouse loading from the given store.
    #[must_use]
    pub fn new(store: Arc<InMemoryObjectStore>) -> Self {
        Self {
            store,
            stages: Mutex::new(HashMap::new()),
            staging: Mutex::new(HashMap::new()),
            tables: Mutex::new(HashMap::new()),
            merge_targets: Mutex::new(HashMap::new()),
            control: FakeControl::default(),
        }
    }

    /// Binds a named stage to the bucket it reads from.
    pub fn register_stage(&self, stage_ref: impl Into<String>, bucket: impl Into<String>) {
        self.stages.lock().insert(stage_ref.into(), bucket.into());
    }

    /// Registers a merge statement: executing `statement_ref` upserts
    /// rows from `staging_table` into `target_table`.
    pub fn register_merge(
        &self,
        statement_ref: impl Into<String>,
        staging_table: impl Into<String>,
        target_table: impl Into<String>,
    ) {
        self.merge_targets
            .lock()
            .insert(statement_ref.into(), (staging_table.into(), target_table.into()));
    }

    /// Returns the number of rows currently staged in a table.
    #[must_use]
    pub fn staging_row_count(&self, table: &str) -> usize {
        self.staging.lock().get(table).map_or(0, Vec::len)
    }

    /// Returns the number of rows in a merged table.
    #[must_use]
    pub fn table_row_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, BTreeMap::len)
    }

    /// Returns a merged row by business key.
    #[must_use]
    pub fn table_row(&self, table: &str, key: &str) -> Option<String> {
        self.tables
            .lock()
            .get(table)
            .and_then(|rows| rows.get(key))
            .cloned()
    }

    /// Scripts the next call to `op` ("truncate_table", "execute_sql",
    /// "bulk_load") to fail.
    pub fn fail_next(&self, op: &str, err: ConnectorError) {
        self.control.push_failure(op, err);
    }

    /// Returns how many times `op` was called.
    #[must_use]
    pub fn call_count(&self, op: &str) -> usize {
        self.control.call_count(op)
    }
}

#[async_trait]
impl WarehouseConnector for InMemoryWarehouse {
    async fn truncate_table(&self, table: &str) -> Result<(), ConnectorError> {
        self.control.record("truncate_table");
        if let Some(err) = self.control.next_failure("truncate_table") {
            return Err(err);
        }

        // Truncating a missing or empty table is a no-op.
        self.staging.lock().entry(table.to_string()).or_default().clear();
        Ok(())
    }

    async fn execute_sql(&self, statement_ref: &str) -> Result<(), ConnectorError> {
        self.control.record("execute_sql");
        if let Some(err) = self.control.next_failure("execute_sql") {
            return Err(err);
        }

        let target = self.merge_targets.lock().get(statement_ref).cloned();
        let (staging_table, target_table) = target.ok_or_else(|| {
            ConnectorError::permanent(
                "warehouse",
                format!("unknown statement reference '{statement_ref}'"),
            )
        })?;

        let staged: Vec<String> = self
            .staging
            .lock()
            .get(&staging_table)
            .cloned()
            .unwrap_or_default();

        let mut tables = self.tables.lock();
        let rows = tables.entry(target_table).or_default();
        for line in staged {
            let business_key = line.split(',').next().unwrap_or("").to_string();
            if business_key.is_empty() {
                continue;
            }
            // Merge keyed on the business key: last write wins, reruns
            // over identical staging input change nothing.
            rows.insert(business_key, line);
        }
        Ok(())
    }

    async fn bulk_load(
        &self,
        stage_ref: &str,
        prefix: &str,
        _file_format: &str,
        table: &str,
    ) -> Result<(), ConnectorError> {
        self.control.record("bulk_load");
        if let Some(err) = self.control.next_failure("bulk_load") {
            return Err(err);
        }

        let bucket = self.stages.lock().get(stage_ref).cloned().ok_or_else(|| {
            ConnectorError::permanent("warehouse", format!("unknown stage '{stage_ref}'"))
        })?;

        let keys = self.store.list(&bucket, prefix).await?;
        let mut staging = self.staging.lock();
        let rows = staging.entry(table.to_string()).or_default();
        for key in keys {
            if let Some(content) = self.store.get(&bucket, &key) {
                rows.extend(
                    content
                        .lines()
                        .filter(|l| !l.trim().is_empty())
                        .map(String::from),
                );
            }
        }
        Ok(())
    }
}
