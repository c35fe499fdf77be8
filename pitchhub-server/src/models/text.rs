//! Bounded free-text fields (names, titles, bodies)

use super::ValidationError;

/// Validate a required text field.
///
/// # Rules
/// - Leading/trailing whitespace is trimmed before checking
/// - Length is counted in characters, not bytes
/// - `min..=max` characters after trimming
///
/// # Example
/// ```
/// use pitchhub_server::models::text;
///
/// assert_eq!(text::required("title", "  Solar farm ", 3, 150).unwrap(), "Solar farm");
/// assert!(text::required("title", "   ", 3, 150).is_err());
/// ```
pub fn required(
    field: &'static str,
    s: &str,
    min: usize,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }

    let len = trimmed.chars().count();
    if len < min {
        return Err(ValidationError::TooShort { field, min });
    }
    if len > max {
        return Err(ValidationError::TooLong { field, max });
    }

    Ok(trimmed.to_owned())
}

/// Validate an optional text field.
///
/// Absent and blank values both become `None`.
pub fn optional(
    field: &'static str,
    s: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match s.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.chars().count() > max => Err(ValidationError::TooLong { field, max }),
        Some(value) => Ok(Some(value.to_owned())),
    }
}
