#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Database connection, schema, and queries for haver.
//!
//! Uses `switchy_database` over `SQLite` (rusqlite). All statements are raw
//! SQL executed through `query_raw_params()`/`exec_raw_params()` with
//! positional `$n` placeholders.

pub mod db;
pub mod queries;

use switchy_database::Database;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// The database file could not be opened.
    #[error("Failed to open database: {0}")]
    Open(String),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Creates all tables and indexes if they don't already exist.
///
/// The `datapoints` table carries the column set that uploaded CSV headers
/// are expected to name. Uploads naming other columns are rejected by the
/// store when the insert is first executed.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails.
pub async fn ensure_schema(db: &dyn Database) -> Result<(), DbError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS services (
            id    INTEGER PRIMARY KEY,
            name  TEXT NOT NULL
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS projects (
            id         INTEGER PRIMARY KEY,
            name       TEXT NOT NULL,
            title      TEXT NOT NULL,
            date       TEXT NOT NULL,
            sapnumber  TEXT NOT NULL,
            notes      TEXT NOT NULL DEFAULT '',
            branchId   INTEGER NOT NULL,
            statusId   INTEGER NOT NULL,
            serviceId  INTEGER NOT NULL
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS datapoints (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            projectID   INTEGER NOT NULL,
            EquipID     TEXT,
            System      TEXT,
            EquipType   TEXT,
            Descriptor  TEXT,
            PointName   TEXT,
            PointType   TEXT
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_datapoints_project
         ON datapoints (projectID)",
    )
    .await?;

    log::debug!("Database schema is up to date");
    Ok(())
}
