//! Project team endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::repos::{TeamMember, TeamRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidJson, ValidPath, ValidQuery};
use crate::http::server::AppState;
use crate::models::{Paginated, PaginationParams, TeamRole, Validate, ValidationErrors};

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    /// Defaults to `member`
    pub role: Option<String>,
}

#[derive(Debug)]
pub struct NewMember {
    pub user_id: Uuid,
    pub role: TeamRole,
}

impl Validate for AddMemberRequest {
    type Valid = NewMember;

    fn validate(self) -> Result<NewMember, ValidationErrors> {
        let role = match self.role.as_deref() {
            Some(raw) => TeamRole::parse(raw)?,
            None => TeamRole::Member,
        };
        Ok(NewMember {
            user_id: self.user_id,
            role,
        })
    }
}

/// GET /projects/{id}/team
async fn list_team(
    State(state): State<Arc<AppState>>,
    ValidPath(project_id): ValidPath<Uuid>,
    ValidQuery(params): ValidQuery<PaginationParams>,
) -> Result<Json<Paginated<TeamMember>>, ApiError> {
    let team = TeamRepo::new(&state.pool)
        .list(project_id, params.into())
        .await?;
    Ok(Json(team))
}

/// POST /projects/{id}/team - project owner only
async fn add_member(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(project_id): ValidPath<Uuid>,
    ValidJson(new): ValidJson<AddMemberRequest>,
) -> Result<(StatusCode, Json<TeamMember>), ApiError> {
    let member = TeamRepo::new(&state.pool)
        .add(auth.id(), project_id, new.user_id, new.role)
        .await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// DELETE /projects/{id}/team/{user_id} - owner, or the member leaving
async fn remove_member(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath((project_id, user_id)): ValidPath<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    TeamRepo::new(&state.pool)
        .remove(auth.id(), project_id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/projects/{id}/team", get(list_team).post(add_member))
        .route("/projects/{id}/team/{user_id}", delete(remove_member))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_defaults_to_member() {
        let new = AddMemberRequest {
            user_id: Uuid::new_v4(),
            role: None,
        }
        .validate()
        .unwrap();
        assert_eq!(new.role, TeamRole::Member);
    }

    #[test]
    fn unknown_role_rejected() {
        let errors = AddMemberRequest {
            user_id: Uuid::new_v4(),
            role: Some("cto".into()),
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.fields()[0].field, "role");
    }
}
