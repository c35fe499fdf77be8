//! Registration, login, logout
//!
//! Argon2 hashing and verification run on the blocking pool.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::users::{get_me, UserResponse, BIO_MAX, NAME_MAX};
use crate::auth::{hash_password, verify_password, IssuedToken};
use crate::db::repos::{BlacklistRepo, NewUser, User, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidJson};
use crate::http::server::AppState;
use crate::models::{
    text, Email, Password, UserRole, Validate, ValidationError, ValidationErrors,
};

/// Register request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub role: Option<String>,
}

/// Validated registration, password still in clear
#[derive(Debug)]
pub struct Registration {
    pub email: Email,
    pub password: Password,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub role: UserRole,
}

/// Roles a user may pick at sign-up; admin is granted from the CLI.
fn self_service_role(raw: Option<&str>) -> Result<UserRole, ValidationError> {
    let Some(raw) = raw else {
        return Ok(UserRole::Investor);
    };
    match UserRole::parse(raw)? {
        UserRole::Admin => Err(ValidationError::InvalidVariant {
            field: "role",
            value: raw.to_owned(),
        }),
        role => Ok(role),
    }
}

impl Validate for RegisterRequest {
    type Valid = Registration;

    fn validate(self) -> Result<Registration, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = errors.check(Email::new(&self.email));
        let password = errors.check(Password::new(&self.password));
        let first_name = errors.check(text::required("first_name", &self.first_name, 1, NAME_MAX));
        let last_name = errors.check(text::required("last_name", &self.last_name, 1, NAME_MAX));
        let bio = errors.check(text::optional("bio", self.bio.as_deref(), BIO_MAX));
        let role = errors.check(self_service_role(self.role.as_deref()));

        match (email, password, first_name, last_name, bio, role) {
            (Some(email), Some(password), Some(first_name), Some(last_name), Some(bio), Some(role)) => {
                Ok(Registration {
                    email,
                    password,
                    first_name,
                    last_name,
                    bio,
                    role,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    type Valid = Credentials;

    fn validate(self) -> Result<Credentials, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.email.trim().is_empty() {
            errors.push(ValidationError::Empty { field: "email" });
        }
        if self.password.is_empty() {
            errors.push(ValidationError::Empty { field: "password" });
        }
        errors.finish()?;

        Ok(Credentials {
            email: self.email,
            password: self.password,
        })
    }
}

/// Token response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: String,
    pub user: UserResponse,
}

impl TokenResponse {
    fn new(issued: IssuedToken, user: User) -> Self {
        Self {
            token: issued.token,
            token_type: "Bearer",
            expires_at: issued.claims.expires_at.to_rfc3339(),
            user: UserResponse::private(user),
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal {
            message: format!("blocking task failed: {}", e),
        })
}

/// POST /auth/register
async fn register(
    State(state): State<Arc<AppState>>,
    ValidJson(registration): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let password = registration.password;
    let password_hash = blocking(move || hash_password(&password)).await??;

    let user = UserRepo::new(&state.pool)
        .create(NewUser {
            email: registration.email,
            password_hash,
            first_name: registration.first_name,
            last_name: registration.last_name,
            bio: registration.bio,
            role: registration.role,
        })
        .await?;

    let issued = state.tokens.issue(user.id, user.role())?;
    tracing::info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(TokenResponse::new(issued, user))))
}

/// POST /auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    ValidJson(credentials): ValidJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let rejected = || ApiError::unauthorized("invalid email or password");

    let user = UserRepo::new(&state.pool)
        .find_by_email(&credentials.email)
        .await?
        .ok_or_else(rejected)?;

    let stored_hash = user.password_hash.clone();
    let password = credentials.password;
    let valid = blocking(move || verify_password(&password, &stored_hash)).await?;
    if !valid {
        return Err(rejected());
    }

    let issued = state.tokens.issue(user.id, user.role())?;
    Ok(Json(TokenResponse::new(issued, user)))
}

/// POST /auth/logout - revoke the presented token
async fn logout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<StatusCode, ApiError> {
    BlacklistRepo::new(&state.pool)
        .revoke(auth.claims.jti, auth.id(), auth.claims.expires_at)
        .await?;
    tracing::info!(user_id = %auth.id(), "Token revoked");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(get_me))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            email: "Founder@Example.com".into(),
            password: "hunter2hunter2".into(),
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            bio: None,
            role: None,
        }
    }

    #[test]
    fn valid_registration_defaults_to_investor() {
        let valid = request().validate().unwrap();
        assert_eq!(valid.email.as_str(), "founder@example.com");
        assert_eq!(valid.role, UserRole::Investor);
    }

    #[test]
    fn entrepreneur_role_accepted() {
        let valid = RegisterRequest {
            role: Some("Entrepreneur".into()),
            ..request()
        }
        .validate()
        .unwrap();
        assert_eq!(valid.role, UserRole::Entrepreneur);
    }

    #[test]
    fn admin_role_rejected() {
        let errors = RegisterRequest {
            role: Some("admin".into()),
            ..request()
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.fields()[0].field, "role");
    }

    #[test]
    fn every_bad_field_reported() {
        let errors = RegisterRequest {
            email: "nope".into(),
            password: "short".into(),
            first_name: " ".into(),
            last_name: "Hopper".into(),
            bio: Some("b".repeat(BIO_MAX + 1)),
            role: Some("pirate".into()),
        }
        .validate()
        .unwrap_err();

        let fields: Vec<_> = errors.fields().into_iter().map(|f| f.field).collect();
        assert_eq!(fields, vec!["email", "password", "first_name", "bio", "role"]);
    }

    #[test]
    fn login_requires_both_fields() {
        let errors = LoginRequest {
            email: "  ".into(),
            password: String::new(),
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.fields().len(), 2);
    }
}
