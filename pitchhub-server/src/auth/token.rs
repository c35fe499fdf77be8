//! HMAC-SHA256 bearer tokens
//!
//! Claims: `iss`, `sub` (user id), `jti` (token id, key of the blacklist),
//! `iat`, `exp`, plus a private `role` claim.

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use jwt::{Claims, RegisteredClaims, SignWithKey, VerifyWithKey};
use sha2::Sha256;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::UserRole;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid signing key")]
    Key,

    #[error("failed to sign token: {0}")]
    Sign(jwt::Error),

    #[error("invalid token")]
    Invalid,

    #[error("token expired")]
    Expired,
}

/// Verified contents of a bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: Uuid,
    pub jti: Uuid,
    pub role: UserRole,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Freshly signed token and the claims it carries
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

/// Signs and verifies bearer tokens with one HMAC key
#[derive(Clone)]
pub struct TokenService {
    key: Hmac<Sha256>,
    issuer: String,
    ttl: chrono::Duration,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Result<Self, TokenError> {
        let key = Hmac::<Sha256>::new_from_slice(config.secret.as_bytes())
            .map_err(|_| TokenError::Key)?;
        let ttl = chrono::Duration::from_std(config.ttl).map_err(|_| TokenError::Key)?;

        Ok(Self {
            key,
            issuer: config.issuer.clone(),
            ttl,
        })
    }

    /// Issue a token for a user, valid from now for the configured TTL.
    pub fn issue(&self, user_id: Uuid, role: UserRole) -> Result<IssuedToken, TokenError> {
        self.issue_at(user_id, role, Utc::now())
    }

    pub fn issue_at(
        &self,
        user_id: Uuid,
        role: UserRole,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let issued_at = timestamp(now.timestamp()).ok_or(TokenError::Invalid)?;
        let expires_at = timestamp((now + self.ttl).timestamp()).ok_or(TokenError::Invalid)?;
        let jti = Uuid::new_v4();

        let mut claims = Claims::new(RegisteredClaims {
            issuer: Some(self.issuer.clone()),
            subject: Some(user_id.to_string()),
            audience: None,
            expiration: Some(expires_at.timestamp() as u64),
            not_before: None,
            issued_at: Some(issued_at.timestamp() as u64),
            json_web_token_id: Some(jti.to_string()),
        });
        claims
            .private
            .insert("role".to_string(), role.as_str().into());

        let token = claims.sign_with_key(&self.key).map_err(TokenError::Sign)?;

        Ok(IssuedToken {
            token,
            claims: TokenClaims {
                user_id,
                jti,
                role,
                issued_at,
                expires_at,
            },
        })
    }

    /// Verify signature, issuer and time claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let claims: Claims = token
            .verify_with_key(&self.key)
            .map_err(|_| TokenError::Invalid)?;
        let registered = &claims.registered;

        if registered.issuer.as_deref() != Some(self.issuer.as_str()) {
            return Err(TokenError::Invalid);
        }

        let issued_at = registered
            .issued_at
            .and_then(|x| timestamp(x as i64))
            .ok_or(TokenError::Invalid)?;
        if issued_at > now {
            return Err(TokenError::Invalid);
        }

        let expires_at = registered
            .expiration
            .and_then(|x| timestamp(x as i64))
            .ok_or(TokenError::Invalid)?;
        if expires_at <= now {
            return Err(TokenError::Expired);
        }

        let user_id = registered
            .subject
            .as_deref()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or(TokenError::Invalid)?;
        let jti = registered
            .json_web_token_id
            .as_deref()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or(TokenError::Invalid)?;
        let role = claims
            .private
            .get("role")
            .and_then(|v| v.as_str())
            .and_then(|s| UserRole::parse(s).ok())
            .ok_or(TokenError::Invalid)?;

        Ok(TokenClaims {
            user_id,
            jti,
            role,
            issued_at,
            expires_at,
        })
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn service(secret: &str, issuer: &str) -> TokenService {
        TokenService::new(&JwtConfig {
            secret: secret.to_string(),
            issuer: issuer.to_string(),
            ttl: Duration::from_secs(3600),
        })
        .unwrap()
    }

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn issue_then_verify() {
        let tokens = service(SECRET, "pitchhub");
        let user_id = Uuid::new_v4();

        let issued = tokens.issue(user_id, UserRole::Entrepreneur).unwrap();
        let claims = tokens.verify(&issued.token).unwrap();

        assert_eq!(claims, issued.claims);
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.role, UserRole::Entrepreneur);
        assert_eq!(claims.expires_at - claims.issued_at, chrono::Duration::hours(1));
    }

    #[test]
    fn every_token_gets_its_own_jti() {
        let tokens = service(SECRET, "pitchhub");
        let user_id = Uuid::new_v4();
        let a = tokens.issue(user_id, UserRole::Investor).unwrap();
        let b = tokens.issue(user_id, UserRole::Investor).unwrap();
        assert_ne!(a.claims.jti, b.claims.jti);
    }

    #[test]
    fn expired_token_rejected() {
        let tokens = service(SECRET, "pitchhub");
        let two_hours_ago = Utc::now() - chrono::Duration::hours(2);

        let issued = tokens
            .issue_at(Uuid::new_v4(), UserRole::Investor, two_hours_ago)
            .unwrap();

        assert!(matches!(tokens.verify(&issued.token), Err(TokenError::Expired)));
    }

    #[test]
    fn future_issued_at_rejected() {
        let tokens = service(SECRET, "pitchhub");
        let later = Utc::now() + chrono::Duration::minutes(10);

        let issued = tokens
            .issue_at(Uuid::new_v4(), UserRole::Investor, later)
            .unwrap();

        assert!(matches!(tokens.verify(&issued.token), Err(TokenError::Invalid)));
    }

    #[test]
    fn wrong_secret_rejected() {
        let issued = service(SECRET, "pitchhub")
            .issue(Uuid::new_v4(), UserRole::Investor)
            .unwrap();
        let other = service("fedcba9876543210fedcba9876543210", "pitchhub");

        assert!(matches!(other.verify(&issued.token), Err(TokenError::Invalid)));
    }

    #[test]
    fn wrong_issuer_rejected() {
        let issued = service(SECRET, "someone-else")
            .issue(Uuid::new_v4(), UserRole::Investor)
            .unwrap();

        assert!(matches!(
            service(SECRET, "pitchhub").verify(&issued.token),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn garbage_rejected() {
        let tokens = service(SECRET, "pitchhub");
        assert!(matches!(tokens.verify("not.a.token"), Err(TokenError::Invalid)));
        assert!(matches!(tokens.verify(""), Err(TokenError::Invalid)));
    }
}
