//! Email address validation

use once_cell::sync::Lazy;
use regex::Regex;

use super::ValidationError;

/// Maximum length for email addresses (RFC 5321 path limit)
const MAX_EMAIL_LEN: usize = 254;

/// local@domain.tld with no whitespace and a dotted domain
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]{2,}$").expect("invalid email regex")
});

/// Validated, normalized (trimmed + lowercased) email address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Email(String);

impl Email {
    /// Create a new email address.
    ///
    /// # Example
    /// ```
    /// use pitchhub_server::models::Email;
    ///
    /// assert_eq!(Email::new(" Ada@Example.COM ").unwrap().as_str(), "ada@example.com");
    /// assert!(Email::new("not-an-email").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let normalized = s.trim().to_lowercase();

        if normalized.is_empty() {
            return Err(ValidationError::Empty { field: "email" });
        }

        if normalized.len() > MAX_EMAIL_LEN {
            return Err(ValidationError::TooLong {
                field: "email",
                max: MAX_EMAIL_LEN,
            });
        }

        if !EMAIL_RE.is_match(&normalized) {
            return Err(ValidationError::InvalidFormat {
                field: "email",
                reason: "must be a valid email address",
            });
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_addresses() {
        assert!(Email::new("a@b.io").is_ok());
        assert!(Email::new("first.last+tag@sub.example.org").is_ok());
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        let email = Email::new("  Grace@Hopper.Dev ").unwrap();
        assert_eq!(email.as_str(), "grace@hopper.dev");
    }

    #[test]
    fn rejects_bad_formats() {
        for bad in ["plain", "a@b", "a b@c.de", "@c.de", "a@.c", "a@@b.com"] {
            let err = Email::new(bad).unwrap_err();
            assert!(
                matches!(err, ValidationError::InvalidFormat { .. }),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_empty_and_long() {
        assert_eq!(
            Email::new("  ").unwrap_err(),
            ValidationError::Empty { field: "email" }
        );

        let long = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(
            Email::new(&long).unwrap_err(),
            ValidationError::TooLong { max: 254, .. }
        ));
    }
}
