//! The caller's notifications

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repos::{Notification, NotificationRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidPath, ValidQuery};
use crate::http::server::AppState;
use crate::models::{Paginated, Pagination, PaginationParams};

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Serialize)]
pub struct MarkedResponse {
    pub marked: u64,
}

/// GET /notifications - newest first, `?unread=true` for unread only
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidQuery(query): ValidQuery<NotificationQuery>,
) -> Result<Json<Paginated<Notification>>, ApiError> {
    let page = Pagination::from(PaginationParams {
        page: query.page,
        per_page: query.per_page,
    });
    let notifications = NotificationRepo::new(&state.pool)
        .list(auth.id(), query.unread, page)
        .await?;
    Ok(Json(notifications))
}

/// POST /notifications/{id}/read
async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    let notification = NotificationRepo::new(&state.pool)
        .mark_read(auth.id(), id)
        .await?;
    Ok(Json(notification))
}

/// POST /notifications/read-all
async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<MarkedResponse>, ApiError> {
    let marked = NotificationRepo::new(&state.pool)
        .mark_all_read(auth.id())
        .await?;
    Ok(Json(MarkedResponse { marked }))
}

/// DELETE /notifications/{id}
async fn delete_notification(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    NotificationRepo::new(&state.pool)
        .delete(auth.id(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/{id}/read", post(mark_read))
        .route("/notifications/{id}", delete(delete_notification))
}
