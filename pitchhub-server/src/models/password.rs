//! Password strength rules

use super::ValidationError;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;

/// Plain-text password that passed the strength rules.
///
/// Never logged or serialized; hashed by `auth::password` before storage.
pub struct Password(String);

impl Password {
    /// # Rules
    /// - 8..=128 characters
    /// - at least one letter and one digit
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "password" });
        }

        let len = s.chars().count();
        if len < MIN_PASSWORD_LEN {
            return Err(ValidationError::TooShort {
                field: "password",
                min: MIN_PASSWORD_LEN,
            });
        }
        if len > MAX_PASSWORD_LEN {
            return Err(ValidationError::TooLong {
                field: "password",
                max: MAX_PASSWORD_LEN,
            });
        }

        let has_letter = s.chars().any(char::is_alphabetic);
        let has_digit = s.chars().any(|c| c.is_ascii_digit());
        if !has_letter || !has_digit {
            return Err(ValidationError::InvalidFormat {
                field: "password",
                reason: "must contain at least one letter and one digit",
            });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}
