//! Pipeline configuration: the named-parameter surface consumed by the
//! task graph. Owned externally (deployment config), consumed here.

use super::RunContext;
use serde::{Deserialize, Serialize};

/// Configuration for one deployment of the CRM pipeline.
///
/// All fields are plain names and identifiers; credential resolution
/// belongs to the connector implementations, not to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bucket receiving freshly extracted objects.
    pub landing_bucket: String,
    /// Bucket holding the permanent, date-partitioned archive.
    pub raw_bucket: String,
    /// Warehouse staging table loaded each run.
    pub staging_table: String,
    /// Warehouse file-format identifier used by the bulk load.
    pub file_format: String,
    /// Named warehouse stage the bulk load reads through.
    pub stage_ref: String,
    /// Connection identifier for the source CRM connector.
    pub source_conn: String,
    /// Connection identifier for the object-storage connector.
    pub storage_conn: String,
    /// Connection identifier for the warehouse connector.
    pub warehouse_conn: String,
    /// Reference to the merge statement the transform unit executes.
    #[serde(default = "default_transform_ref")]
    pub transform_ref: String,
    /// Key prefix shared by the landing and archive copies.
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// File-name stem for the extract object.
    #[serde(default = "default_file_stem")]
    pub file_stem: String,
}

fn default_base_path() -> String {
    "salesforce/accounts".to_string()
}

fn default_file_stem() -> String {
    "accounts_extract".to_string()
}

fn default_transform_ref() -> String {
    "staging/merge_customers.sql".to_string()
}

impl PipelineConfig {
    /// Creates a config with the required bucket and table names.
    #[must_use]
    pub fn new(
        landing_bucket: impl Into<String>,
        raw_bucket: impl Into<String>,
        staging_table: impl Into<String>,
    ) -> Self {
        Self {
            landing_bucket: landing_bucket.into(),
            raw_bucket: raw_bucket.into(),
            staging_table: staging_table.into(),
            file_format: "S3_LANDING_CSV".to_string(),
            stage_ref: "s3_elt_data_lake_landing".to_string(),
            source_conn: "salesforce".to_string(),
            storage_conn: "s3".to_string(),
            warehouse_conn: "snowflake".to_string(),
            transform_ref: default_transform_ref(),
            base_path: default_base_path(),
            file_stem: default_file_stem(),
        }
    }

    /// Sets the warehouse file-format identifier.
    #[must_use]
    pub fn with_file_format(mut self, file_format: impl Into<String>) -> Self {
        self.file_format = file_format.into();
        self
    }

    /// Sets the named warehouse stage.
    #[must_use]
    pub fn with_stage_ref(mut self, stage_ref: impl Into<String>) -> Self {
        self.stage_ref = stage_ref.into();
        self
    }

    /// Sets the source connection identifier.
    #[must_use]
    pub fn with_source_conn(mut self, conn: impl Into<String>) -> Self {
        self.source_conn = conn.into();
        self
    }

    /// Sets the storage connection identifier.
    #[must_use]
    pub fn with_storage_conn(mut self, conn: impl Into<String>) -> Self {
        self.storage_conn = conn.into();
        self
    }

    /// Sets the warehouse connection identifier.
    #[must_use]
    pub fn with_warehouse_conn(mut self, conn: impl Into<String>) -> Self {
        self.warehouse_conn = conn.into();
        self
    }

    /// Sets the transform statement reference.
    #[must_use]
    pub fn with_transform_ref(mut self, statement_ref: impl Into<String>) -> Self {
        self.transform_ref = statement_ref.into();
        self
    }

    /// Sets the shared key prefix.
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Sets the extract file-name stem.
    #[must_use]
    pub fn with_file_stem(mut self, file_stem: impl Into<String>) -> Self {
        self.file_stem = file_stem.into();
        self
    }

    /// Returns the extract file name for a run, e.g.
    /// `accounts_extract_20240105.csv`.
    #[must_use]
    pub fn extract_file_name(&self, ctx: &RunContext) -> String {
        format!("{}_{}.csv", self.file_stem, ctx.ds_nodash())
    }

    /// Returns the landing-zone key for a run's extract object.
    #[must_use]
    pub fn landing_key(&self, ctx: &RunContext) -> String {
        format!("{}/{}", self.base_path, self.extract_file_name(ctx))
    }

    /// Returns the date-partitioned archive key for a run's object.
    #[must_use]
    pub fn archive_key(&self, ctx: &RunContext) -> String {
        format!(
            "{}/{}/{}",
            self.base_path,
            ctx.date_path(),
            self.extract_file_name(ctx)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn test_config() -> PipelineConfig {
        PipelineConfig::new("landing-bucket", "raw-bucket", "customers_staging")
    }

    fn test_context() -> RunContext {
        RunContext::new(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
    }

    #[test]
    fn test_extract_file_name() {
        let config = test_config();
        let ctx = test_context();
        assert_eq!(config.extract_file_name(&ctx), "accounts_extract_20240105.csv");
    }

    #[test]
    fn test_landing_key() {
        let config = test_config();
        let ctx = test_context();
        assert_eq!(
            config.landing_key(&ctx),
            "salesforce/accounts/accounts_extract_20240105.csv"
        );
    }

    #[test]
    fn test_archive_key_is_date_partitioned() {
        let config = test_config();
        let ctx = test_context();
        assert_eq!(
            config.archive_key(&ctx),
            "salesforce/accounts/2024/01/05/accounts_extract_20240105.csv"
        );
    }

    #[test]
    fn test_keys_isolated_per_date() {
        let config = test_config();
        let a = RunContext::new(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        let b = RunContext::new(NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());

        assert_ne!(config.landing_key(&a), config.landing_key(&b));
        assert_ne!(config.archive_key(&a), config.archive_key(&b));
    }

    #[test]
    fn test_builder_overrides() {
        let config = test_config()
            .with_file_format("PARQUET")
            .with_base_path("crm/contacts")
            .with_file_stem("contacts_extract");
        let ctx = test_context();

        assert_eq!(config.file_format, "PARQUET");
        assert_eq!(config.landing_key(&ctx), "crm/contacts/contacts_extract_20240105.csv");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "landing_bucket": "landing",
            "raw_bucket": "raw",
            "staging_table": "customers_staging",
            "file_format": "S3_LANDING_CSV",
            "stage_ref": "s3_elt_data_lake_landing",
            "source_conn": "salesforce",
            "storage_conn": "s3",
            "warehouse_conn": "snowflake"
        }"#;

        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.base_path, "salesforce/accounts");
        assert_eq!(config.file_stem, "accounts_extract");
        assert_eq!(config.transform_ref, "staging/merge_customers.sql");
    }
}
