//! Authentication primitives: password hashing and bearer tokens

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password, PasswordError};
pub use token::{IssuedToken, TokenClaims, TokenError, TokenService};
