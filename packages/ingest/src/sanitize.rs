//! Header cell to column identifier conversion.
//!
//! Only ASCII letters, digits, and `_` survive. Everything else (spaces,
//! `.`, `?`, quotes, punctuation, non-ASCII) is removed, so a sanitized
//! name can never close a quoted identifier or start a new token.

/// Returns `true` for characters allowed in a column identifier.
#[must_use]
pub const fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Sanitizes a single header cell.
///
/// A header made only of removed characters sanitizes to an empty string;
/// it is passed through and rejected later by
/// [`crate::statement::build`].
#[must_use]
pub fn sanitize_header(header: &str) -> String {
    header.chars().filter(|&c| is_identifier_char(c)).collect()
}

/// Sanitizes a header row, preserving length and order.
#[must_use]
pub fn sanitize(headers: &[String]) -> Vec<String> {
    headers.iter().map(|h| sanitize_header(h)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_spaces_periods_and_question_marks() {
        assert_eq!(sanitize_header("Equip ID?"), "EquipID");
        assert_eq!(sanitize_header("A.B C"), "ABC");
    }

    #[test]
    fn strips_identifier_breaking_characters() {
        assert_eq!(sanitize_header("x\"); DROP TABLE projects; --"), "xDROPTABLEprojects");
        assert_eq!(sanitize_header("`Point`-Name"), "PointName");
        assert_eq!(sanitize_header("Point_Type"), "Point_Type");
        assert_eq!(sanitize_header("Température"), "Temprature");
    }

    #[test]
    fn passes_through_empty_result() {
        assert_eq!(sanitize_header("?. ?"), "");
        assert_eq!(sanitize_header(""), "");
    }

    #[test]
    fn is_idempotent() {
        for header in ["Equip ID?", "A.B C", "\u{feff}EquipID", "a b.c?d_e", "", "??"] {
            let once = sanitize_header(header);
            assert_eq!(sanitize_header(&once), once, "header {header:?}");
        }
    }

    #[test]
    fn preserves_length_and_order() {
        let headers = vec!["B b".to_string(), "?".to_string(), "A.a".to_string()];

        assert_eq!(sanitize(&headers), vec!["Bb", "", "Aa"]);
    }
}
