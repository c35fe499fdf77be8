//! Validation error types

use std::fmt;

use serde::Serialize;

/// Validation error for a single request field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Field is shorter than the minimum length
    TooShort { field: &'static str, min: usize },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// String doesn't match required format (e.g., email)
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Invalid enum variant
    InvalidVariant { field: &'static str, value: String },

    /// Number outside the accepted range
    OutOfRange { field: &'static str, min: i64, max: i64 },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Empty { field }
            | Self::TooShort { field, .. }
            | Self::TooLong { field, .. }
            | Self::InvalidFormat { field, .. }
            | Self::InvalidVariant { field, .. }
            | Self::OutOfRange { field, .. } => field,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::TooShort { field, min } => {
                write!(f, "{} must be at least {} characters", field, min)
            }
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::InvalidFormat { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
            Self::InvalidVariant { field, value } => {
                write!(f, "invalid {} value: '{}'", field, value)
            }
            Self::OutOfRange { field, min, max } => {
                write!(f, "{} must be between {} and {}", field, min, max)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Field-level error as rendered in a 400 response body
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All validation failures for one request body
#[derive(Debug, Clone, Default)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the error of a failed check and keep the value of a passing one.
    ///
    /// Lets a DTO run every field check before reporting, so one response
    /// lists all offending fields.
    pub fn check<T>(&mut self, result: Result<T, ValidationError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.0.push(e);
                None
            }
        }
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn fields(&self) -> Vec<FieldError> {
        self.0
            .iter()
            .map(|e| FieldError {
                field: e.field(),
                message: e.to_string(),
            })
            .collect()
    }

    /// Turn the collected errors into a result.
    pub fn finish(self) -> Result<(), Self> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(e: ValidationError) -> Self {
        Self(vec![e])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Turns a raw request body into its validated form.
pub trait Validate {
    type Valid;

    fn validate(self) -> Result<Self::Valid, ValidationErrors>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidationError::TooLong {
            field: "title",
            max: 150,
        };
        assert_eq!(
            err.to_string(),
            "title exceeds maximum length of 150 characters"
        );
    }

    #[test]
    fn collects_every_failure() {
        let mut errors = ValidationErrors::new();
        let a: Option<u8> = errors.check(Err(ValidationError::Empty { field: "a" }));
        let b = errors.check(Ok::<_, ValidationError>(7));
        let c: Option<u8> = errors.check(Err(ValidationError::TooShort { field: "c", min: 2 }));

        assert!(a.is_none());
        assert_eq!(b, Some(7));
        assert!(c.is_none());

        let fields = errors.fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field, "a");
        assert_eq!(fields[1].field, "c");
        assert!(errors.finish().is_err());
    }

    #[test]
    fn empty_collection_finishes_ok() {
        assert!(ValidationErrors::new().finish().is_ok());
    }
}
