#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CSV ingestion configuration, parsed table, and result types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum_macros::{AsRefStr, Display, EnumString};

/// Default ceiling for a single uploaded file (32 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 32 << 20;

/// Default directory uploaded files are written to.
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// How the per-row inserts of one upload are committed.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum CommitPolicy {
    /// All rows are inserted in one transaction. The first failing row
    /// rolls back every row of the upload.
    #[default]
    Atomic,
    /// Every row commits on its own. The first failing row stops the
    /// upload; rows before it stay committed.
    PerRow,
}

/// Settings for handling uploaded files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSettings {
    /// Directory uploaded files are written to before decoding.
    pub upload_dir: PathBuf,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: u64,
    /// Keep uploaded files on disk after ingestion (audit trail) instead of
    /// deleting them.
    pub retain_uploads: bool,
    /// Commit policy for the row inserts.
    pub commit_policy: CommitPolicy,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            retain_uploads: false,
            commit_policy: CommitPolicy::Atomic,
        }
    }
}

/// A decoded CSV file: the header row and the data rows after it.
///
/// Every data row has exactly `headers.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTable {
    /// Raw header cells, in file order.
    pub headers: Vec<String>,
    /// Data rows, in file order.
    pub rows: Vec<Vec<String>>,
}

/// A parametrized insert built from the sanitized header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    /// Target table.
    pub table: String,
    /// Column list: the project column followed by the sanitized headers.
    pub columns: Vec<String>,
    /// SQL text with one `$n` placeholder per column.
    pub sql: String,
}

impl InsertStatement {
    /// Number of bound parameters each execution takes.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.columns.len()
    }

    /// The data columns (everything after the project column).
    #[must_use]
    pub fn data_columns(&self) -> &[String] {
        self.columns.get(1..).unwrap_or_default()
    }
}

/// Result of a completed ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertionSummary {
    /// Project every row was attached to.
    pub project_id: i64,
    /// Sanitized data columns, in file order.
    pub columns: Vec<String>,
    /// Number of data rows in the file.
    pub rows_attempted: u64,
    /// Number of rows persisted.
    pub rows_inserted: u64,
    /// Commit policy the rows were inserted with.
    pub policy: CommitPolicy,
    /// Location of the retained upload, if retention is enabled.
    pub upload_path: Option<PathBuf>,
    /// Wall time of the whole ingestion.
    pub duration_ms: u64,
}
