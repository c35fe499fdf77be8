//! Monetary amounts in minor units (cents)

use super::ValidationError;

/// Upper bound for any single amount (10^12 minor units)
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Validated positive amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(i64);

impl Amount {
    /// Create an amount in `1..=MAX_AMOUNT`.
    ///
    /// # Example
    /// ```
    /// use pitchhub_server::models::Amount;
    ///
    /// assert!(Amount::new("amount", 2_500_00).is_ok());
    /// assert!(Amount::new("amount", 0).is_err());
    /// ```
    pub fn new(field: &'static str, value: i64) -> Result<Self, ValidationError> {
        if !(1..=MAX_AMOUNT).contains(&value) {
            return Err(ValidationError::OutOfRange {
                field,
                min: 1,
                max: MAX_AMOUNT,
            });
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds() {
        assert!(Amount::new("amount", 1).is_ok());
        assert!(Amount::new("amount", MAX_AMOUNT).is_ok());
        assert!(Amount::new("amount", 0).is_err());
        assert!(Amount::new("amount", -5).is_err());
        assert!(Amount::new("amount", MAX_AMOUNT + 1).is_err());
    }

    #[test]
    fn error_names_field() {
        let err = Amount::new("funding_goal", 0).unwrap_err();
        assert_eq!(err.field(), "funding_goal");
    }
}
