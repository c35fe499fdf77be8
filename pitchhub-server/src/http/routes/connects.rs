//! Connection endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::repos::{Connect, ConnectRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidJson, ValidPath, ValidQuery};
use crate::http::server::AppState;
use crate::models::{
    ConnectStatus, Paginated, Pagination, PaginationParams, Validate, ValidationError,
    ValidationErrors,
};

#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateConnectRequest {
    pub receiver_id: Uuid,
}

impl Validate for CreateConnectRequest {
    type Valid = Uuid;

    fn validate(self) -> Result<Uuid, ValidationErrors> {
        Ok(self.receiver_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct RespondConnectRequest {
    pub status: String,
}

impl Validate for RespondConnectRequest {
    type Valid = ConnectStatus;

    fn validate(self) -> Result<ConnectStatus, ValidationErrors> {
        match ConnectStatus::parse(&self.status)? {
            ConnectStatus::Pending => Err(ValidationError::InvalidVariant {
                field: "status",
                value: self.status,
            }
            .into()),
            status => Ok(status),
        }
    }
}

/// GET /connects - connections the caller is part of, `?status=` filters
async fn list_connects(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidQuery(query): ValidQuery<ConnectQuery>,
) -> Result<Json<Paginated<Connect>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(ConnectStatus::parse)
        .transpose()?;
    let page = Pagination::from(PaginationParams {
        page: query.page,
        per_page: query.per_page,
    });

    let connects = ConnectRepo::new(&state.pool)
        .list_mine(auth.id(), status, page)
        .await?;
    Ok(Json(connects))
}

/// POST /connects
async fn request_connect(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidJson(receiver_id): ValidJson<CreateConnectRequest>,
) -> Result<(StatusCode, Json<Connect>), ApiError> {
    if receiver_id == auth.id() {
        return Err(ApiError::bad_request("cannot connect with yourself"));
    }
    let connect = ConnectRepo::new(&state.pool)
        .request(auth.id(), receiver_id)
        .await?;
    Ok((StatusCode::CREATED, Json(connect)))
}

/// PATCH /connects/{id} - receiver accepts or rejects
async fn respond_connect(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(status): ValidJson<RespondConnectRequest>,
) -> Result<Json<Connect>, ApiError> {
    let connect = ConnectRepo::new(&state.pool)
        .respond(auth.id(), id, status)
        .await?;
    Ok(Json(connect))
}

/// DELETE /connects/{id} - either side
async fn delete_connect(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    ConnectRepo::new(&state.pool).delete(auth.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/connects", get(list_connects).post(request_connect))
        .route("/connects/{id}", patch(respond_connect).delete(delete_connect))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respond_requires_a_decision() {
        let status = RespondConnectRequest {
            status: "accepted".into(),
        }
        .validate()
        .unwrap();
        assert_eq!(status, ConnectStatus::Accepted);

        assert!(RespondConnectRequest {
            status: "pending".into()
        }
        .validate()
        .is_err());
    }
}
