//! Argon2 password hashing

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::models::Password;

#[derive(Debug, thiserror::Error)]
#[error("failed to hash password: {0}")]
pub struct PasswordError(String);

/// Hash a validated password into a PHC string with a random salt.
pub fn hash_password(password: &Password) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_str().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError(e.to_string()))
}

/// Uses argon2 to verify the password against a stored PHC hash.
///
/// A malformed stored hash is logged and treated as a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let hash = match PasswordHash::new(stored_hash) {
        Ok(hash) => hash,
        Err(err) => {
            tracing::error!("failed to parse password hash: {}", err);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let password = Password::new("correct-horse-9").unwrap();
        let hash = hash_password(&password).unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct-horse-9", &hash));
        assert!(!verify_password("wrong-horse-9", &hash));
    }

    #[test]
    fn salts_differ() {
        let password = Password::new("same-password-1").unwrap();
        let a = hash_password(&password).unwrap();
        let b = hash_password(&password).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_is_mismatch() {
        assert!(!verify_password("anything1", "not-a-phc-string"));
    }
}
