#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CSV upload ingestion into the `datapoints` table.
//!
//! An upload flows through four stages, always as one ordered column list:
//!
//! 1. the byte stream is written to a uniquely named file in the upload
//!    directory,
//! 2. the file is decoded ([`decode`]),
//! 3. the header row is sanitized into column names ([`sanitize`]),
//! 4. a parametrized insert is built ([`statement`]) and executed once per
//!    data row, in file order.

pub mod decode;
pub mod sanitize;
pub mod statement;

use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::{Stream, StreamExt as _};
use haver_database::{DbError, queries};
use haver_database_models::{DATAPOINTS_TABLE, PROJECT_ID_COLUMN};
use haver_ingest_models::{CommitPolicy, InsertStatement, InsertionSummary, UploadSettings};
use switchy_database::Database;
use tokio::io::AsyncWriteExt as _;

pub use decode::DecodeError;
pub use statement::BuildError;

/// Errors that can occur while ingesting an upload.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Writing or reading the upload file failed.
    #[error("Upload I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The upload is larger than the configured limit.
    #[error("Upload exceeds the {limit} byte limit")]
    UploadTooLarge {
        /// Configured limit in bytes.
        limit: u64,
    },

    /// The client's byte stream failed part way through.
    #[error("Upload stream error: {0}")]
    UploadStream(String),

    /// The upload is not usable CSV.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The header row does not form a valid column set.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// A data row could not be inserted. Rows after it were not attempted.
    #[error("Failed to insert data row {row_index} ({rows_committed} rows committed): {source}")]
    RowInsert {
        /// 0-based index among the data rows.
        row_index: usize,
        /// Rows that remain stored after the failure.
        rows_committed: u64,
        /// The store's error.
        #[source]
        source: DbError,
    },

    /// Opening or finishing the insert transaction failed.
    #[error(transparent)]
    Database(#[from] DbError),
}

impl IngestError {
    /// Returns `true` when the error was caused by the request content
    /// rather than the server's filesystem or database.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UploadTooLarge { .. } | Self::UploadStream(_) | Self::Decode(_) | Self::Build(_)
        )
    }
}

/// Ingests an uploaded CSV byte stream for `project_id`.
///
/// The stream is written to `<upload_dir>/<uuid>.csv`, decoded, and
/// inserted row by row into the `datapoints` table according to
/// [`UploadSettings::commit_policy`]. The file is removed afterwards on
/// every path unless [`UploadSettings::retain_uploads`] is set. Project
/// existence is not checked.
///
/// # Errors
///
/// Returns [`IngestError`] for the first failing stage; later stages are
/// not run.
pub async fn ingest_upload<S, B, E>(
    db: &dyn Database,
    settings: &UploadSettings,
    project_id: i64,
    stream: S,
) -> Result<InsertionSummary, IngestError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let start = Instant::now();

    let path = persist_upload(settings, stream).await?;
    log::info!(
        "Ingesting upload {} for project {project_id}",
        path.display()
    );

    let result = ingest_persisted(db, settings, project_id, &path, start).await;

    if settings.retain_uploads {
        log::debug!("Retaining upload {}", path.display());
    } else {
        remove_upload(&path).await;
    }

    match &result {
        Ok(summary) => log::info!(
            "Inserted {}/{} rows for project {project_id} in {}ms",
            summary.rows_inserted,
            summary.rows_attempted,
            summary.duration_ms
        ),
        Err(e) => log::error!("Ingestion for project {project_id} failed: {e}"),
    }

    result
}

/// Ingests a CSV file already on disk, going through the same upload path
/// as [`ingest_upload`].
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or ingestion fails.
pub async fn ingest_file(
    db: &dyn Database,
    settings: &UploadSettings,
    project_id: i64,
    path: &Path,
) -> Result<InsertionSummary, IngestError> {
    let bytes = tokio::fs::read(path).await?;
    let stream = futures::stream::iter([Ok::<_, std::convert::Infallible>(bytes)]);
    ingest_upload(db, settings, project_id, stream).await
}

async fn persist_upload<S, B, E>(settings: &UploadSettings, stream: S) -> Result<PathBuf, IngestError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    tokio::fs::create_dir_all(&settings.upload_dir).await?;
    let path = settings
        .upload_dir
        .join(format!("{}.csv", uuid::Uuid::new_v4()));

    if let Err(e) = write_upload(&path, settings.max_upload_bytes, stream).await {
        remove_upload(&path).await;
        return Err(e);
    }

    Ok(path)
}

async fn write_upload<S, B, E>(path: &Path, limit: u64, stream: S) -> Result<u64, IngestError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = std::pin::pin!(stream);
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| IngestError::UploadStream(e.to_string()))?;
        let bytes = chunk.as_ref();

        written += bytes.len() as u64;
        if written > limit {
            return Err(IngestError::UploadTooLarge { limit });
        }

        file.write_all(bytes).await?;
    }

    file.flush().await?;
    log::debug!("Wrote {written} bytes to {}", path.display());
    Ok(written)
}

async fn remove_upload(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        log::warn!("Failed to remove upload {}: {e}", path.display());
    }
}

async fn ingest_persisted(
    db: &dyn Database,
    settings: &UploadSettings,
    project_id: i64,
    path: &Path,
    start: Instant,
) -> Result<InsertionSummary, IngestError> {
    let bytes = tokio::fs::read(path).await?;
    let table = decode::decode(&bytes)?;

    let columns = sanitize::sanitize(&table.headers);
    log::debug!("Sanitized header {:?} to {columns:?}", table.headers);

    let statement = statement::build(DATAPOINTS_TABLE, PROJECT_ID_COLUMN, &columns)?;

    let rows_inserted = match settings.commit_policy {
        CommitPolicy::Atomic => insert_atomic(db, &statement, project_id, &table.rows).await?,
        CommitPolicy::PerRow => insert_rows(db, &statement, project_id, &table.rows).await?,
    };

    Ok(InsertionSummary {
        project_id,
        columns,
        rows_attempted: table.rows.len() as u64,
        rows_inserted,
        policy: settings.commit_policy,
        upload_path: settings.retain_uploads.then(|| path.to_path_buf()),
        duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
    })
}

/// Runs [`insert_rows`] inside one transaction.
async fn insert_atomic(
    db: &dyn Database,
    statement: &InsertStatement,
    project_id: i64,
    rows: &[Vec<String>],
) -> Result<u64, IngestError> {
    let tx = db.begin_transaction().await.map_err(DbError::from)?;

    match insert_rows(&*tx, statement, project_id, rows).await {
        Ok(inserted) => {
            tx.commit().await.map_err(DbError::from)?;
            Ok(inserted)
        }
        Err(e) => {
            tx.rollback().await.map_err(DbError::from)?;
            Err(match e {
                IngestError::RowInsert {
                    row_index, source, ..
                } => IngestError::RowInsert {
                    row_index,
                    rows_committed: 0,
                    source,
                },
                other => other,
            })
        }
    }
}

/// Executes `statement` once per row, stopping at the first failure.
async fn insert_rows<D: Database + ?Sized>(
    db: &D,
    statement: &InsertStatement,
    project_id: i64,
    rows: &[Vec<String>],
) -> Result<u64, IngestError> {
    let mut inserted = 0u64;

    for (row_index, row) in rows.iter().enumerate() {
        match queries::insert_datapoint_row(db, &statement.sql, project_id, row).await {
            Ok(count) => inserted += count,
            Err(source) => {
                return Err(IngestError::RowInsert {
                    row_index,
                    rows_committed: inserted,
                    source,
                });
            }
        }
    }

    Ok(inserted)
}
