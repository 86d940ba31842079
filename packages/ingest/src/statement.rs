//! Builds the parametrized datapoint insert from a sanitized header row.
//!
//! This is the only place where text taken from an upload becomes part of
//! SQL statement text. Column names are re-validated and double-quoted here;
//! cell values are always bound parameters.

use std::collections::BTreeSet;

use haver_ingest_models::InsertStatement;

use crate::sanitize::is_identifier_char;

/// Errors that can occur while building an insert statement.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The header row had no columns.
    #[error("CSV header has no columns to insert")]
    EmptyColumnSet,

    /// A column name is empty or contains characters outside `[A-Za-z0-9_]`.
    #[error("Invalid column name {name:?} in header position {index}")]
    InvalidColumnName {
        /// 0-based header position.
        index: usize,
        /// The offending (sanitized) name.
        name: String,
    },

    /// Two columns resolve to the same identifier. `SQLite` compares
    /// identifiers case-insensitively, so `EquipID` and `equipid` collide.
    #[error("Duplicate column {name:?} in CSV header")]
    DuplicateColumn {
        /// The repeated name.
        name: String,
    },
}

/// Builds `INSERT INTO "<table>" ("<project_column>", "<h0>", ...) VALUES ($1, $2, ...)`.
///
/// The column list is the project column followed by `columns` in the same
/// order, so the `n`-th cell of every data row binds to the `n + 2`-th
/// placeholder.
///
/// # Errors
///
/// * [`BuildError::EmptyColumnSet`] if `columns` is empty.
/// * [`BuildError::InvalidColumnName`] if a column is empty or not a plain
///   identifier.
/// * [`BuildError::DuplicateColumn`] if two columns (or a column and the
///   project column) collide.
pub fn build(
    table: &str,
    project_column: &str,
    columns: &[String],
) -> Result<InsertStatement, BuildError> {
    if columns.is_empty() {
        return Err(BuildError::EmptyColumnSet);
    }

    let mut seen = BTreeSet::new();
    seen.insert(project_column.to_ascii_lowercase());

    for (index, name) in columns.iter().enumerate() {
        if name.is_empty() || !name.chars().all(is_identifier_char) {
            return Err(BuildError::InvalidColumnName {
                index,
                name: name.clone(),
            });
        }
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(BuildError::DuplicateColumn { name: name.clone() });
        }
    }

    let all_columns: Vec<String> = std::iter::once(project_column.to_string())
        .chain(columns.iter().cloned())
        .collect();

    let column_list = all_columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=all_columns.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
        quote_identifier(table)
    );

    Ok(InsertStatement {
        table: table.to_string(),
        columns: all_columns,
        sql,
    })
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
