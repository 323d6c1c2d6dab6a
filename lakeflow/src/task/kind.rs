//! The closed set of operation kinds a task unit can perform.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The operation a task unit wraps, with its parameter payload.
///
/// Exactly one external side effect per kind. Dispatch happens in the
/// executor over this enum; there is no open plugin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    /// Query the source system and write the result object to landing
    /// storage. Overwrites deterministically at the same key on rerun.
    Extract {
        /// Reference to the extraction query.
        query_ref: String,
        /// Destination bucket.
        bucket: String,
        /// Destination key.
        key: String,
    },

    /// Truncate a staging table. Truncating an empty table is a no-op.
    StageClear {
        /// The staging table to truncate.
        table: String,
    },

    /// Load all objects under a storage prefix into a staging table.
    ///
    /// The load itself has no dedup guarantee; at-most-once accumulation
    /// comes from the graph always placing a stage-clear before it.
    BulkLoad {
        /// Named warehouse stage to read through.
        stage_ref: String,
        /// Storage prefix to load.
        prefix: String,
        /// File-format identifier.
        file_format: String,
        /// Destination staging table.
        table: String,
    },

    /// Execute a warehouse-side SQL transformation. The referenced
    /// statement must merge on a natural business key so reruns do not
    /// duplicate rows.
    Transform {
        /// Reference to the SQL statement.
        statement_ref: String,
    },

    /// Copy the object produced by an upstream unit to an archive key.
    /// Copying over an existing destination is a safe overwrite.
    Copy {
        /// Name of the upstream unit whose artifact is copied.
        source_unit: String,
        /// Destination bucket.
        dst_bucket: String,
        /// Destination key.
        dst_key: String,
    },

    /// Delete objects from landing storage. Deleting an absent key is
    /// not an error.
    Delete {
        /// Bucket holding the objects.
        bucket: String,
        /// Keys to remove.
        keys: Vec<String>,
    },

    /// An inert entry/exit marker. Performs no external operation.
    Marker,
}

impl TaskKind {
    /// Returns a short label for the kind, used in logs and events.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Extract { .. } => "extract",
            Self::StageClear { .. } => "stage_clear",
            Self::BulkLoad { .. } => "bulk_load",
            Self::Transform { .. } => "transform",
            Self::Copy { .. } => "copy",
            Self::Delete { .. } => "delete",
            Self::Marker => "marker",
        }
    }

    /// Returns true if the kind performs no external operation.
    #[must_use]
    pub fn is_marker(&self) -> bool {
        matches!(self, Self::Marker)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let extract = TaskKind::Extract {
            query_ref: "q".to_string(),
            bucket: "b".to_string(),
            key: "k".to_string(),
        };
        assert_eq!(extract.label(), "extract");
        assert_eq!(extract.to_string(), "extract");
        assert_eq!(TaskKind::Marker.label(), "marker");
    }

    #[test]
    fn test_marker_predicate() {
        assert!(TaskKind::Marker.is_marker());
        assert!(!TaskKind::StageClear { table: "t".to_string() }.is_marker());
    }

    #[test]
    fn test_serde_tagged() {
        let kind = TaskKind::Delete {
            bucket: "landing".to_string(),
            keys: vec!["a/b.csv".to_string()],
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains(r#""kind":"delete""#));

        let back: TaskKind = serde_json::from_str(&json).unwrap();
        assert_eq!(kind, back);
    }
}
