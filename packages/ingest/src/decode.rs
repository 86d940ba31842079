//! CSV decoding into a header row and data rows.

use haver_ingest_models::ParsedTable;

/// Errors that can occur while decoding an uploaded CSV file.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The input contained no rows at all, so there is no header to derive
    /// columns from.
    #[error("CSV file contains no rows")]
    EmptyInput,

    /// The input is not well-formed CSV.
    #[error("Malformed CSV at line {line}: {message}")]
    Malformed {
        /// 1-based line where the problem was detected.
        line: u64,
        /// Description of the problem.
        message: String,
    },
}

/// Decodes comma-separated, RFC 4180 quoted CSV text.
///
/// Row 0 becomes [`ParsedTable::headers`]; every following row must have
/// the same number of fields. Blank lines are skipped.
///
/// # Errors
///
/// * [`DecodeError::EmptyInput`] if the input yields no rows.
/// * [`DecodeError::Malformed`] for ragged rows, an unterminated quoted
///   field, or invalid UTF-8.
pub fn decode(bytes: &[u8]) -> Result<ParsedTable, DecodeError> {
    if let Some(line) = unterminated_quote_line(bytes) {
        return Err(DecodeError::Malformed {
            line,
            message: "unterminated quoted field".to_string(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .from_reader(bytes);

    let mut records = reader.records();

    let Some(first) = records.next() else {
        return Err(DecodeError::EmptyInput);
    };
    let headers: Vec<String> = first
        .map_err(malformed)?
        .iter()
        .map(str::to_owned)
        .collect();

    let mut rows = Vec::new();
    for result in records {
        let record = result.map_err(malformed)?;
        rows.push(record.iter().map(str::to_owned).collect());
    }

    log::debug!(
        "Decoded CSV with {} columns and {} data rows",
        headers.len(),
        rows.len()
    );

    Ok(ParsedTable { headers, rows })
}

fn malformed(e: csv::Error) -> DecodeError {
    let line = e.position().map_or(0, csv::Position::line);
    let message = match e.kind() {
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => format!("expected {expected_len} fields, found {len}"),
        _ => e.to_string(),
    };
    DecodeError::Malformed { line, message }
}

/// Returns the line a quoted field was opened on if the input ends while
/// still inside it.
///
/// An escaped quote (`""`) toggles the state twice, so only a genuinely
/// unbalanced quote leaves it set.
fn unterminated_quote_line(bytes: &[u8]) -> Option<u64> {
    let mut line = 1u64;
    let mut opened_at = None;

    for &b in bytes {
        match b {
            b'"' => {
                opened_at = if opened_at.is_some() { None } else { Some(line) };
            }
            b'\n' => line += 1,
            _ => {}
        }
    }

    opened_at
}
