//! Custom Axum extractors

use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, Json, Path, Query, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::error::ApiError;
use super::server::AppState;
use crate::auth::TokenClaims;
use crate::db::BlacklistRepo;
use crate::models::{UserRole, Validate, ValidationError};

/// JSON body deserialized and validated into its typed form.
///
/// Malformed JSON is a 400 `bad_request`; field errors are a 400
/// `validation_error` listing every offending field.
pub struct ValidJson<T: Validate>(pub T::Valid);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: Validate + DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(raw) = Json::<T>::from_request(req, state).await?;
        Ok(Self(raw.validate()?))
    }
}

/// Path parameters (ids) with a JSON 400 instead of axum's plain-text one.
pub struct ValidPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|_| {
                ApiError::from(ValidationError::InvalidFormat {
                    field: "id",
                    reason: "invalid UUID format",
                })
            })?;
        Ok(Self(value))
    }
}

/// Query string with a 400 on malformed parameters.
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Authenticated caller, from `Authorization: Bearer <token>`.
///
/// The token must verify and its `jti` must not be blacklisted.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: TokenClaims,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.claims.user_id
    }

    pub fn role(&self) -> UserRole {
        self.claims.role
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role() == UserRole::Admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("admin role required"))
        }
    }
}

/// Token part of a `Bearer` authorization header (scheme is case-insensitive).
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?
            .to_str()
            .map_err(|_| ApiError::unauthorized("malformed authorization header"))?;

        let token = bearer_token(header)
            .ok_or_else(|| ApiError::unauthorized("malformed authorization header"))?;
        let claims = state.tokens.verify(token)?;

        if BlacklistRepo::new(&state.pool).is_revoked(claims.jti).await? {
            return Err(ApiError::unauthorized("token has been revoked"));
        }

        Ok(Self { claims })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("BEARER  abc.def "), Some("abc.def"));
    }

    #[test]
    fn other_schemes_rejected() {
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer   "), None);
        assert_eq!(bearer_token(""), None);
    }
}
