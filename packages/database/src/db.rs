//! Database connection utilities.

use std::path::{Path, PathBuf};

use switchy_database::Database;
use switchy_database_connection::init_sqlite_rusqlite;

use crate::{DbError, ensure_schema};

/// Default location of the `SQLite` database file.
pub const DEFAULT_DB_PATH: &str = "data/haver.db";

/// Returns the database path from the `DATABASE_PATH` environment variable,
/// falling back to [`DEFAULT_DB_PATH`].
#[must_use]
pub fn path_from_env() -> PathBuf {
    std::env::var("DATABASE_PATH").map_or_else(|_| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from)
}

/// Opens (or creates) the `SQLite` database at `path` and ensures the
/// schema exists.
///
/// # Errors
///
/// Returns [`DbError`] if the parent directory cannot be created, the
/// database cannot be opened, or schema creation fails.
pub async fn open(path: &Path) -> Result<Box<dyn Database>, DbError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let db = init_sqlite_rusqlite(Some(path)).map_err(|e| DbError::Open(e.to_string()))?;

    ensure_schema(db.as_ref()).await?;

    log::info!("Opened database at {}", path.display());
    Ok(db)
}
