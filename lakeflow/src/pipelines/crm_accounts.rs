//! The CRM accounts ELT topology.
//!
//! One fixed graph shape for every logical date; only the templated
//! parameters vary with the run context:
//!
//! ```text
//! begin -> extract -> stage_clear -> bulk_load -> copy_to_archive -> delete_from_landing
//!                                        |                                   |
//!                                        `-> transform -------------> end (all-done)
//! ```
//!
//! `stage_clear` precedes `bulk_load` so the staging table accumulates
//! at most once per run, and `copy_to_archive` precedes
//! `delete_from_landing` so the extract object always exists in at
//! least one location until it is durably archived.

use crate::context::{PipelineConfig, RunContext};
use crate::errors::GraphValidationError;
use crate::graph::{GraphBuilder, TaskGraph, TriggerRule};
use crate::task::{TaskKind, TaskUnit};

/// Unit names of the CRM accounts graph.
pub mod units {
    /// Entry marker.
    pub const BEGIN: &str = "begin";
    /// Extracts accounts from the CRM into landing storage.
    pub const EXTRACT: &str = "extract";
    /// Truncates the staging table before the load.
    pub const STAGE_CLEAR: &str = "stage_clear";
    /// Loads landed objects into the staging table.
    pub const BULK_LOAD: &str = "bulk_load";
    /// Merges staging rows into the dimension table.
    pub const TRANSFORM: &str = "transform";
    /// Copies the landed object to the archive bucket.
    pub const COPY_TO_ARCHIVE: &str = "copy_to_archive";
    /// Removes the landed object once archived.
    pub const DELETE_FROM_LANDING: &str = "delete_from_landing";
    /// Exit join; fires on all-done so the run always terminates
    /// observably.
    pub const END: &str = "end";
}

/// Builds the CRM accounts graph for one run.
///
/// # Errors
///
/// Returns an error if graph validation fails, which for this fixed
/// topology indicates a bug in the builder itself.
pub fn crm_accounts(
    config: &PipelineConfig,
    ctx: &RunContext,
) -> Result<TaskGraph, GraphValidationError> {
    let landing_key = config.landing_key(ctx);

    GraphBuilder::new("crm_accounts")
        .unit(TaskUnit::marker(units::BEGIN))
        .unit(TaskUnit::new(
            units::EXTRACT,
            TaskKind::Extract {
                query_ref: "salesforce/extract/extract_accounts.sql".to_string(),
                bucket: config.landing_bucket.clone(),
                key: landing_key.clone(),
            },
        ))
        .unit(TaskUnit::new(
            units::STAGE_CLEAR,
            TaskKind::StageClear {
                table: config.staging_table.clone(),
            },
        ))
        .unit(TaskUnit::new(
            units::BULK_LOAD,
            TaskKind::BulkLoad {
                stage_ref: config.stage_ref.clone(),
                prefix: format!("{}/", config.base_path),
                file_format: config.file_format.clone(),
                table: config.staging_table.clone(),
            },
        ))
        .unit(TaskUnit::new(
            units::TRANSFORM,
            TaskKind::Transform {
                statement_ref: config.transform_ref.clone(),
            },
        ))
        .unit(TaskUnit::new(
            units::COPY_TO_ARCHIVE,
            TaskKind::Copy {
                source_unit: units::EXTRACT.to_string(),
                dst_bucket: config.raw_bucket.clone(),
                dst_key: config.archive_key(ctx),
            },
        ))
        .unit(TaskUnit::new(
            units::DELETE_FROM_LANDING,
            TaskKind::Delete {
                bucket: config.landing_bucket.clone(),
                keys: vec![landing_key],
            },
        ))
        .unit(TaskUnit::marker(units::END).with_trigger_rule(TriggerRule::AllDone))
        .chain(&[
            units::BEGIN,
            units::EXTRACT,
            units::STAGE_CLEAR,
            units::BULK_LOAD,
            units::COPY_TO_ARCHIVE,
            units::DELETE_FROM_LANDING,
            units::END,
        ])
        .edge(units::BULK_LOAD, units::TRANSFORM)
        .edge(units::TRANSFORM, units::END)
        // The copy reads the extract's artifact handle, so the extract
        // must be a direct predecessor.
        .edge(units::EXTRACT, units::COPY_TO_ARCHIVE)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn graph() -> TaskGraph {
        let config = PipelineConfig::new("landing-bucket", "raw-bucket", "customers_staging");
        let ctx = RunContext::new(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        crm_accounts(&config, &ctx).unwrap()
    }

    #[test]
    fn test_topology_shape() {
        let graph = graph();
        assert_eq!(graph.unit_count(), 8);
        assert_eq!(graph.entry_units(), vec![units::BEGIN]);
        assert_eq!(graph.exit_units(), vec![units::END]);
    }

    #[test]
    fn test_stage_clear_precedes_bulk_load() {
        let graph = graph();
        let preds: Vec<_> = graph.predecessors(units::BULK_LOAD).collect();
        assert_eq!(preds, vec![units::STAGE_CLEAR]);
    }

    #[test]
    fn test_copy_precedes_delete() {
        let graph = graph();
        let preds: Vec<_> = graph.predecessors(units::DELETE_FROM_LANDING).collect();
        assert_eq!(preds, vec![units::COPY_TO_ARCHIVE]);
        assert!(graph.reaches(units::COPY_TO_ARCHIVE, units::DELETE_FROM_LANDING));
        assert!(!graph.reaches(units::DELETE_FROM_LANDING, units::COPY_TO_ARCHIVE));
    }

    #[test]
    fn test_copy_depends_directly_on_extract() {
        // The engine hands a unit only its direct predecessors'
        // outcomes, so the artifact edge must be explicit.
        let graph = graph();
        let mut preds: Vec<_> = graph.predecessors(units::COPY_TO_ARCHIVE).collect();
        preds.sort_unstable();
        assert_eq!(preds, vec![units::BULK_LOAD, units::EXTRACT]);
    }

    #[test]
    fn test_end_joins_both_branches_all_done() {
        let graph = graph();
        let mut preds: Vec<_> = graph.predecessors(units::END).collect();
        preds.sort_unstable();
        assert_eq!(preds, vec![units::DELETE_FROM_LANDING, units::TRANSFORM]);

        let end = graph.unit(units::END).unwrap();
        assert_eq!(end.trigger_rule, TriggerRule::AllDone);
    }

    #[test]
    fn test_transform_branches_off_bulk_load() {
        let graph = graph();
        let mut succs: Vec<_> = graph.successors(units::BULK_LOAD).collect();
        succs.sort_unstable();
        assert_eq!(succs, vec![units::COPY_TO_ARCHIVE, units::TRANSFORM]);
    }

    #[test]
    fn test_parameters_templated_from_context() {
        let config = PipelineConfig::new("landing-bucket", "raw-bucket", "customers_staging");
        let ctx = RunContext::new(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        let graph = crm_accounts(&config, &ctx).unwrap();

        let extract = graph.unit(units::EXTRACT).unwrap();
        let TaskKind::Extract { key, bucket, .. } = &extract.kind else {
            panic!("extract unit has wrong kind");
        };
        assert_eq!(bucket, "landing-bucket");
        assert_eq!(key, "salesforce/accounts/accounts_extract_20240105.csv");

        let copy = graph.unit(units::COPY_TO_ARCHIVE).unwrap();
        let TaskKind::Copy { dst_key, source_unit, .. } = &copy.kind else {
            panic!("copy unit has wrong kind");
        };
        assert_eq!(source_unit, units::EXTRACT);
        assert_eq!(
            dst_key,
            "salesforce/accounts/2024/01/05/accounts_extract_20240105.csv"
        );
    }

    #[test]
    fn test_default_retry_budget_on_every_unit() {
        let graph = graph();
        for unit in graph.units() {
            assert_eq!(unit.retries, 1, "unit {} has wrong budget", unit.name);
        }
    }
}
