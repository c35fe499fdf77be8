//! Route modules, one router per resource

pub mod auth;
pub mod comments;
pub mod connects;
pub mod discussions;
pub mod health;
pub mod likes;
pub mod media;
pub mod notifications;
pub mod offers;
pub mod posts;
pub mod projects;
pub mod sectors;
pub mod teams;
pub mod users;

use crate::models::{ValidationError, ValidationErrors};

/// Run `check` on a field that may be absent from a partial update.
///
/// Absent stays `None`; a failed check is recorded in `errors`.
pub(crate) fn optional_field<T, U>(
    errors: &mut ValidationErrors,
    value: Option<T>,
    check: impl FnOnce(T) -> Result<U, ValidationError>,
) -> Option<U> {
    value.and_then(|v| errors.check(check(v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::text;

    #[test]
    fn absent_field_is_skipped() {
        let mut errors = ValidationErrors::new();
        let value: Option<String> = optional_field(&mut errors, None::<String>, |s| {
            text::required("title", &s, 3, 10)
        });
        assert_eq!(value, None);
        assert!(errors.is_empty());
    }

    #[test]
    fn failed_check_is_recorded() {
        let mut errors = ValidationErrors::new();
        let value = optional_field(&mut errors, Some("ab".to_owned()), |s| {
            text::required("title", &s, 3, 10)
        });
        assert_eq!(value, None);
        assert_eq!(errors.errors().len(), 1);
    }
}
