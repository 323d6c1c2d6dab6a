//! The execution engine: walks a task graph for one run context,
//! respecting trigger rules, retry budgets and recorded state.

use super::report::{overall_status, RunReport, UnitReport};
use super::retry::RetryPolicy;
use super::state_store::{InMemoryStateStore, StateRecord, StateStore};
use crate::cancellation::CancelToken;
use crate::connectors::Connectors;
use crate::context::RunContext;
use crate::errors::{ConnectorError, FlowError};
use crate::events::{EventSink, NoOpEventSink};
use crate::graph::{TaskGraph, TriggerDecision};
use crate::task::{ArtifactHandle, TaskInputs, TaskKind, TaskOutcome, TaskState, TaskUnit};
use chrono::NaiveDate;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Default bound on concurrently executing connector operations.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Executes task graphs against a connector set.
///
/// Guarantees relied on by the graph model: a unit never starts before
/// its trigger rule fires, at most one invocation of a unit is active
/// per run context, every state transition is recorded before the run
/// proceeds past it, and units recorded successful by a previous
/// process are not re-executed.
#[derive(Clone)]
pub struct Executor {
    connectors: Connectors,
    state_store: Arc<dyn StateStore>,
    events: Arc<dyn EventSink>,
    retry_policy: RetryPolicy,
    max_concurrency: usize,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("retry_policy", &self.retry_policy)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Creates an executor with an in-memory state store, no event sink
    /// and the default retry backoff.
    #[must_use]
    pub fn new(connectors: Connectors) -> Self {
        Self {
            connectors,
            state_store: Arc::new(InMemoryStateStore::new()),
            events: Arc::new(NoOpEventSink),
            retry_policy: RetryPolicy::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Sets the state store.
    #[must_use]
    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = store;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the retry backoff policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the concurrency bound.
    #[must_use]
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit.max(1);
        self
    }

    /// Runs the graph for one run context until every unit is terminal
    /// or the token cancels further scheduling.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store fails, a spawned unit panics,
    /// or the graph deadlocks (which a validated graph cannot).
    pub async fn run(
        &self,
        graph: &TaskGraph,
        ctx: &RunContext,
        cancel: &CancelToken,
    ) -> Result<RunReport, FlowError> {
        let start = Instant::now();
        info!(
            graph = graph.name(),
            logical_date = %ctx.ds(),
            run_id = %ctx.run_id,
            "Starting run"
        );

        let mut states: HashMap<String, TaskState> = graph
            .topo_order()
            .iter()
            .map(|name| (name.clone(), TaskState::Pending))
            .collect();
        let mut attempts: HashMap<String, u32> = HashMap::new();
        let mut errors: HashMap<String, String> = HashMap::new();
        let mut outcomes: HashMap<String, TaskOutcome> = HashMap::new();

        // Resume: successes recorded by a previous process stand; their
        // outcomes keep feeding dependents. Anything else re-runs.
        for (name, record) in self.state_store.run_states(ctx.logical_date).await? {
            if record.state == TaskState::Success && states.contains_key(&name) {
                states.insert(name.clone(), TaskState::Success);
                attempts.insert(name.clone(), record.attempts);
                if let Some(outcome) = record.outcome {
                    outcomes.insert(name, outcome);
                }
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut active: FuturesUnordered<
            tokio::task::JoinHandle<(String, u32, Result<TaskOutcome, ConnectorError>)>,
        > = FuturesUnordered::new();

        loop {
            // Fires and skips cascade, so rescan until nothing changes.
            loop {
                let mut progressed = false;
                for name in graph.topo_order().to_vec() {
                    if states.get(&name) != Some(&TaskState::Pending) {
                        continue;
                    }
                    let Some(unit) = graph.unit(&name) else {
                        continue;
                    };
                    let pred_states: Vec<TaskState> =
                        graph.predecessors(&name).filter_map(|p| states.get(p).copied()).collect();
                    match unit.trigger_rule.evaluate(pred_states.iter()) {
                        TriggerDecision::Fire => {
                            if cancel.is_cancelled() {
                                continue;
                            }
                            states.insert(name.clone(), TaskState::Running);
                            self.state_store
                                .record(
                                    ctx.logical_date,
                                    &name,
                                    StateRecord::new(TaskState::Running, 1),
                                )
                                .await?;
                            self.events.try_emit(
                                "task.started",
                                Some(serde_json::json!({
                                    "unit": &name,
                                    "kind": unit.kind.label(),
                                    "logical_date": ctx.ds(),
                                })),
                            );
                            let inputs = self.gather_inputs(graph, &name, &outcomes);
                            active.push(self.spawn_unit(
                                unit.clone(),
                                inputs,
                                ctx.logical_date,
                                semaphore.clone(),
                            ));
                            progressed = true;
                        }
                        TriggerDecision::Skip => {
                            states.insert(name.clone(), TaskState::UpstreamFailed);
                            self.state_store
                                .record(
                                    ctx.logical_date,
                                    &name,
                                    StateRecord::new(TaskState::UpstreamFailed, 0),
                                )
                                .await?;
                            self.events.try_emit(
                                "task.upstream_failed",
                                Some(serde_json::json!({
                                    "unit": &name,
                                    "logical_date": ctx.ds(),
                                })),
                            );
                            progressed = true;
                        }
                        TriggerDecision::Wait => {}
                    }
                }
                if !progressed {
                    break;
                }
            }

            if states.values().all(TaskState::is_terminal) {
                break;
            }

            if active.is_empty() {
                if cancel.is_cancelled() {
                    break;
                }
                let stuck: Vec<&String> = states
                    .iter()
                    .filter(|(_, s)| !s.is_terminal())
                    .map(|(n, _)| n)
                    .collect();
                return Err(FlowError::Internal(format!(
                    "Deadlocked task graph; remaining units: {stuck:?}"
                )));
            }

            match active.next().await {
                Some(Ok((name, used, result))) => {
                    attempts.insert(name.clone(), used);
                    match result {
                        Ok(outcome) => {
                            states.insert(name.clone(), TaskState::Success);
                            self.state_store
                                .record(
                                    ctx.logical_date,
                                    &name,
                                    StateRecord::new(TaskState::Success, used)
                                        .with_outcome(outcome.clone()),
                                )
                                .await?;
                            self.events.try_emit(
                                "task.succeeded",
                                Some(serde_json::json!({
                                    "unit": &name,
                                    "attempts": used,
                                    "logical_date": ctx.ds(),
                                })),
                            );
                            outcomes.insert(name, outcome);
                        }
                        Err(err) => {
                            states.insert(name.clone(), TaskState::Failed);
                            errors.insert(name.clone(), err.to_string());
                            self.state_store
                                .record(
                                    ctx.logical_date,
                                    &name,
                                    StateRecord::new(TaskState::Failed, used)
                                        .with_error(err.to_string()),
                                )
                                .await?;
                            self.events.try_emit(
                                "task.failed",
                                Some(serde_json::json!({
                                    "unit": &name,
                                    "attempts": used,
                                    "error": err.to_string(),
                                    "logical_date": ctx.ds(),
                                })),
                            );
                        }
                    }
                }
                Some(Err(join_err)) => {
                    return Err(FlowError::Internal(format!("Unit task panicked: {join_err}")));
                }
                None => {}
            }
        }

        let units: BTreeMap<String, UnitReport> = graph
            .topo_order()
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    UnitReport {
                        state: states.get(name).copied().unwrap_or_default(),
                        attempts: attempts.get(name).copied().unwrap_or(0),
                        error: errors.get(name).cloned(),
                    },
                )
            })
            .collect();

        let status = overall_status(graph, &units);
        let report = RunReport {
            graph_name: graph.name().to_string(),
            logical_date: ctx.logical_date,
            run_id: ctx.run_id,
            status,
            units,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        };

        self.events.try_emit(
            "run.completed",
            Some(serde_json::json!({
                "graph": graph.name(),
                "status": report.status,
                "logical_date": ctx.ds(),
                "duration_ms": report.duration_ms,
            })),
        );
        info!(
            graph = graph.name(),
            logical_date = %ctx.ds(),
            status = ?report.status,
            "Run completed"
        );
        Ok(report)
    }

    /// Collects the outcomes of a unit's direct predecessors.
    fn gather_inputs(
        &self,
        graph: &TaskGraph,
        name: &str,
        outcomes: &HashMap<String, TaskOutcome>,
    ) -> TaskInputs {
        let available: HashMap<String, TaskOutcome> = graph
            .predecessors(name)
            .filter_map(|pred| outcomes.get(pred).map(|o| (pred.to_string(), o.clone())))
            .collect();
        TaskInputs::new(available)
    }

    /// Spawns the attempt loop for one unit.
    fn spawn_unit(
        &self,
        unit: TaskUnit,
        inputs: TaskInputs,
        logical_date: NaiveDate,
        semaphore: Arc<Semaphore>,
    ) -> tokio::task::JoinHandle<(String, u32, Result<TaskOutcome, ConnectorError>)> {
        let connectors = self.connectors.clone();
        let state_store = Arc::clone(&self.state_store);
        let events = Arc::clone(&self.events);
        let policy = self.retry_policy.clone();

        tokio::spawn(async move {
            let name = unit.name.clone();
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return (
                        name,
                        0,
                        Err(ConnectorError::permanent("engine", "scheduler shut down")),
                    );
                }
            };

            let mut attempt = 0_u32;
            loop {
                attempt += 1;
                if attempt > 1 {
                    // Back in flight after a transient failure.
                    if let Err(err) = state_store
                        .record(
                            logical_date,
                            &name,
                            StateRecord::new(TaskState::Running, attempt),
                        )
                        .await
                    {
                        warn!(unit = %name, error = %err, "Failed to record running state");
                    }
                }

                match dispatch(&unit.kind, &inputs, &connectors).await {
                    Ok(outcome) => return (name, attempt, Ok(outcome)),
                    Err(err) if err.is_retryable() && attempt < unit.max_attempts() => {
                        let delay = policy.delay_for(attempt - 1);
                        warn!(
                            unit = %name,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Transient failure, retrying"
                        );
                        if let Err(record_err) = state_store
                            .record(
                                logical_date,
                                &name,
                                StateRecord::new(TaskState::FailedRetrying, attempt)
                                    .with_error(err.to_string()),
                            )
                            .await
                        {
                            warn!(unit = %name, error = %record_err, "Failed to record retry state");
                        }
                        events.try_emit(
                            "task.retrying",
                            Some(serde_json::json!({
                                "unit": &name,
                                "attempt": attempt,
                                "error": err.to_string(),
                            })),
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(err) => return (name, attempt, Err(err)),
                }
            }
        })
    }
}

/// Performs the single external operation for a task kind.
async fn dispatch(
    kind: &TaskKind,
    inputs: &TaskInputs,
    connectors: &Connectors,
) -> Result<TaskOutcome, ConnectorError> {
    match kind {
        TaskKind::Extract { query_ref, bucket, key } => {
            connectors.source.run(query_ref, bucket, key).await?;
            Ok(TaskOutcome::with_artifact(ArtifactHandle::new(
                bucket.clone(),
                key.clone(),
            )))
        }
        TaskKind::StageClear { table } => {
            connectors.warehouse.truncate_table(table).await?;
            Ok(TaskOutcome::empty())
        }
        TaskKind::BulkLoad {
            stage_ref,
            prefix,
            file_format,
            table,
        } => {
            connectors
                .warehouse
                .bulk_load(stage_ref, prefix, file_format, table)
                .await?;
            Ok(TaskOutcome::empty())
        }
        TaskKind::Transform { statement_ref } => {
            connectors.warehouse.execute_sql(statement_ref).await?;
            Ok(TaskOutcome::empty())
        }
        TaskKind::Copy {
            source_unit,
            dst_bucket,
            dst_key,
        } => {
            let artifact = inputs.artifact(source_unit).ok_or_else(|| {
                ConnectorError::permanent(
                    "engine",
                    format!("no artifact available from upstream unit '{source_unit}'"),
                )
            })?;
            connectors
                .storage
                .copy(&artifact.bucket, &artifact.key, dst_bucket, dst_key)
                .await?;
            Ok(TaskOutcome::with_artifact(ArtifactHandle::new(
                dst_bucket.clone(),
                dst_key.clone(),
            )))
        }
        TaskKind::Delete { bucket, keys } => {
            connectors.storage.delete(bucket, keys).await?;
            Ok(TaskOutcome::empty())
        }
        TaskKind::Marker => Ok(TaskOutcome::empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::{InMemoryObjectStore, InMemorySource, InMemoryWarehouse};
    use crate::graph::{GraphBuilder, TriggerRule};
    use crate::task::TaskUnit;
    use chrono::NaiveDate;

    fn test_connectors() -> (Connectors, Arc<InMemoryObjectStore>, Arc<InMemoryWarehouse>) {
        let store = Arc::new(InMemoryObjectStore::new());
        let warehouse = Arc::new(InMemoryWarehouse::new(store.clone()));
        let source = Arc::new(InMemorySource::new(store.clone(), "1,alpha"));
        let connectors = Connectors::new(source, store.clone(), warehouse.clone());
        (connectors, store, warehouse)
    }

    fn ctx() -> RunContext {
        RunContext::new(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
    }

    fn fast_executor(connectors: Connectors) -> Executor {
        Executor::new(connectors)
            .with_retry_policy(RetryPolicy::new().with_base_delay_ms(1).without_jitter())
    }

    #[tokio::test]
    async fn test_runs_marker_chain() {
        let (connectors, _, _) = test_connectors();
        let graph = GraphBuilder::new("chain")
            .unit(TaskUnit::marker("a"))
            .unit(TaskUnit::marker("b"))
            .edge("a", "b")
            .build()
            .unwrap();

        let report = fast_executor(connectors)
            .run(&graph, &ctx(), &CancelToken::new())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.unit("a").unwrap().state, TaskState::Success);
        assert_eq!(report.unit("b").unwrap().state, TaskState::Success);
    }

    #[tokio::test]
    async fn test_extract_produces_artifact_for_copy() {
        let (connectors, store, _) = test_connectors();
        let graph = GraphBuilder::new("extract-copy")
            .unit(TaskUnit::new(
                "extract",
                TaskKind::Extract {
                    query_ref: "q".to_string(),
                    bucket: "landing".to_string(),
                    key: "crm/x.csv".to_string(),
                },
            ))
            .unit(TaskUnit::new(
                "copy",
                TaskKind::Copy {
                    source_unit: "extract".to_string(),
                    dst_bucket: "raw".to_string(),
                    dst_key: "crm/2024/x.csv".to_string(),
                },
            ))
            .edge("extract", "copy")
            .build()
            .unwrap();

        let report = fast_executor(connectors)
            .run(&graph, &ctx(), &CancelToken::new())
            .await
            .unwrap();

        assert!(report.is_success());
        assert!(store.contains("raw", "crm/2024/x.csv"));
    }

    #[tokio::test]
    async fn test_transient_failure_retried_within_budget() {
        let (connectors, _, warehouse) = test_connectors();
        warehouse.fail_next("truncate_table", ConnectorError::transient("warehouse", "timeout"));

        let graph = GraphBuilder::new("retry")
            .unit(TaskUnit::new(
                "stage_clear",
                TaskKind::StageClear { table: "t".to_string() },
            ))
            .build()
            .unwrap();

        let report = fast_executor(connectors)
            .run(&graph, &ctx(), &CancelToken::new())
            .await
            .unwrap();

        assert!(report.is_success());
        let unit = report.unit("stage_clear").unwrap();
        assert_eq!(unit.attempts, 2);
        assert_eq!(warehouse.call_count("truncate_table"), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let (connectors, _, warehouse) = test_connectors();
        warehouse.fail_next("truncate_table", ConnectorError::permanent("warehouse", "no grants"));

        let graph = GraphBuilder::new("permanent")
            .unit(TaskUnit::new(
                "stage_clear",
                TaskKind::StageClear { table: "t".to_string() },
            ))
            .build()
            .unwrap();

        let report = fast_executor(connectors)
            .run(&graph, &ctx(), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(report.status, crate::engine::RunStatus::Failed);
        let unit = report.unit("stage_clear").unwrap();
        assert_eq!(unit.state, TaskState::Failed);
        assert_eq!(unit.attempts, 1);
        assert_eq!(warehouse.call_count("truncate_table"), 1);
    }

    #[tokio::test]
    async fn test_upstream_failed_cascade_and_all_done_join() {
        let (connectors, _, warehouse) = test_connectors();
        // Exceed the budget of 1 retry: two transient failures.
        warehouse.fail_next("truncate_table", ConnectorError::transient("warehouse", "t1"));
        warehouse.fail_next("truncate_table", ConnectorError::transient("warehouse", "t2"));

        let graph = GraphBuilder::new("cascade")
            .unit(TaskUnit::new(
                "stage_clear",
                TaskKind::StageClear { table: "t".to_string() },
            ))
            .unit(TaskUnit::marker("downstream"))
            .unit(TaskUnit::marker("end").with_trigger_rule(TriggerRule::AllDone))
            .edge("stage_clear", "downstream")
            .edge("downstream", "end")
            .build()
            .unwrap();

        let report = fast_executor(connectors)
            .run(&graph, &ctx(), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(report.status, crate::engine::RunStatus::Failed);
        assert_eq!(report.unit("stage_clear").unwrap().state, TaskState::Failed);
        assert_eq!(report.unit("stage_clear").unwrap().attempts, 2);
        assert_eq!(
            report.unit("downstream").unwrap().state,
            TaskState::UpstreamFailed
        );
        // The all-done join still reaches a terminal state.
        assert_eq!(report.unit("end").unwrap().state, TaskState::Success);
    }

    #[tokio::test]
    async fn test_resume_skips_recorded_successes() {
        let (connectors, _, warehouse) = test_connectors();
        let store = Arc::new(InMemoryStateStore::new());
        let run_ctx = ctx();

        store
            .record(
                run_ctx.logical_date,
                "stage_clear",
                StateRecord::new(TaskState::Success, 1),
            )
            .await
            .unwrap();

        let graph = GraphBuilder::new("resume")
            .unit(TaskUnit::new(
                "stage_clear",
                TaskKind::StageClear { table: "t".to_string() },
            ))
            .unit(TaskUnit::marker("after"))
            .edge("stage_clear", "after")
            .build()
            .unwrap();

        let report = fast_executor(connectors)
            .with_state_store(store)
            .run(&graph, &run_ctx, &CancelToken::new())
            .await
            .unwrap();

        assert!(report.is_success());
        // The recorded success was honored: no new truncate call.
        assert_eq!(warehouse.call_count("truncate_table"), 0);
        assert_eq!(report.unit("after").unwrap().state, TaskState::Success);
    }

    #[tokio::test]
    async fn test_cancellation_stops_scheduling() {
        let (connectors, _, _) = test_connectors();
        let cancel = CancelToken::new();
        cancel.cancel("operator");

        let graph = GraphBuilder::new("cancelled")
            .unit(TaskUnit::marker("a"))
            .unit(TaskUnit::marker("b"))
            .edge("a", "b")
            .build()
            .unwrap();

        let report = fast_executor(connectors)
            .run(&graph, &ctx(), &cancel)
            .await
            .unwrap();

        assert_eq!(report.status, crate::engine::RunStatus::Cancelled);
        assert_eq!(report.unit("a").unwrap().state, TaskState::Pending);
        assert_eq!(report.unit("b").unwrap().state, TaskState::Pending);
    }

    #[tokio::test]
    async fn test_events_emitted() {
        use crate::events::CollectingEventSink;

        let (connectors, _, _) = test_connectors();
        let sink = Arc::new(CollectingEventSink::new());
        let graph = GraphBuilder::new("events")
            .unit(TaskUnit::marker("a"))
            .build()
            .unwrap();

        fast_executor(connectors)
            .with_events(sink.clone())
            .run(&graph, &ctx(), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(sink.events_of_type("task.started").len(), 1);
        assert_eq!(sink.events_of_type("task.succeeded").len(), 1);
        assert_eq!(sink.events_of_type("run.completed").len(), 1);
    }
}
