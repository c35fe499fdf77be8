//! User profile endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::optional_field;
use crate::db::repos::{BlacklistRepo, ProfileUpdate, User, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidJson, ValidPath, ValidQuery};
use crate::http::server::AppState;
use crate::models::{text, ListParams, Paginated, Validate, ValidationErrors};

pub const NAME_MAX: usize = 50;
pub const BIO_MAX: usize = 1000;

/// User response. `email` is only present on the caller's own profile.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub role: String,
    pub offers_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl UserResponse {
    /// Own profile, with email.
    pub fn private(user: User) -> Self {
        let email = user.email.clone();
        Self {
            email: Some(email),
            ..Self::public(user)
        }
    }

    /// Someone else's profile.
    pub fn public(user: User) -> Self {
        Self {
            id: user.id,
            email: None,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            role: user.role,
            offers_count: user.offers_count,
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.to_rfc3339(),
        }
    }
}

/// Update profile request; absent fields stay unchanged, a blank bio clears it
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
}

impl Validate for UpdateProfileRequest {
    type Valid = ProfileUpdate;

    fn validate(self) -> Result<ProfileUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let first_name = optional_field(&mut errors, self.first_name, |s| {
            text::required("first_name", &s, 1, NAME_MAX)
        });
        let last_name = optional_field(&mut errors, self.last_name, |s| {
            text::required("last_name", &s, 1, NAME_MAX)
        });
        let bio = optional_field(&mut errors, self.bio, |s| {
            text::optional("bio", Some(&s), BIO_MAX)
        });
        errors.finish()?;

        Ok(ProfileUpdate {
            first_name,
            last_name,
            bio,
        })
    }
}

/// GET /users - public profiles, `?q=` searches names and bio
async fn list_users(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<ListParams>,
) -> Result<Json<Paginated<UserResponse>>, ApiError> {
    let search = params.search();
    let users = UserRepo::new(&state.pool)
        .list(params.pagination(), search.as_deref())
        .await?;
    Ok(Json(users.map(UserResponse::public)))
}

/// GET /users/{id}
async fn get_user(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = UserRepo::new(&state.pool).find(id).await?;
    Ok(Json(UserResponse::public(user)))
}

/// GET /users/me
pub(crate) async fn get_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = UserRepo::new(&state.pool).find(auth.id()).await?;
    Ok(Json(UserResponse::private(user)))
}

/// PATCH /users/me
async fn update_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidJson(update): ValidJson<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = UserRepo::new(&state.pool)
        .update_profile(auth.id(), update)
        .await?;
    Ok(Json(UserResponse::private(user)))
}

/// DELETE /users/me - delete the account, its content and its files
async fn delete_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<StatusCode, ApiError> {
    let removed = UserRepo::new(&state.pool).delete(auth.id()).await?;
    state
        .storage
        .discard(&removed.media_paths, &removed.project_ids)
        .await;

    BlacklistRepo::new(&state.pool)
        .revoke(auth.claims.jti, auth.id(), auth.claims.expires_at)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(get_me).patch(update_me).delete(delete_me))
        .route("/users/{id}", get(get_user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            bio: None,
            role: "investor".into(),
            offers_count: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn public_profile_hides_email_and_hash() {
        let json = serde_json::to_value(UserResponse::public(user())).unwrap();
        assert!(json.get("email").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["offers_count"], 3);
    }

    #[test]
    fn private_profile_has_email() {
        let json = serde_json::to_value(UserResponse::private(user())).unwrap();
        assert_eq!(json["email"], "ada@example.com");
    }

    #[test]
    fn blank_bio_clears() {
        let update = UpdateProfileRequest {
            first_name: None,
            last_name: None,
            bio: Some("   ".into()),
        }
        .validate()
        .unwrap();
        assert_eq!(update.bio, Some(None));
        assert_eq!(update.first_name, None);
    }

    #[test]
    fn name_bounds() {
        let too_long = "x".repeat(NAME_MAX + 1);
        let errors = UpdateProfileRequest {
            first_name: Some(String::new()),
            last_name: Some(too_long),
            bio: None,
        }
        .validate()
        .unwrap_err();

        let fields: Vec<_> = errors.fields().into_iter().map(|f| f.field).collect();
        assert_eq!(fields, vec!["first_name", "last_name"]);

        let ok = UpdateProfileRequest {
            first_name: Some("x".repeat(NAME_MAX)),
            last_name: None,
            bio: None,
        }
        .validate();
        assert!(ok.is_ok());
    }
}
