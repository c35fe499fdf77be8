//! Like endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use crate::db::repos::{Like, LikeRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidPath, ValidQuery};
use crate::http::server::AppState;
use crate::models::{Paginated, PaginationParams};

/// GET /posts/{id}/likes
async fn list_likes(
    State(state): State<Arc<AppState>>,
    ValidPath(post_id): ValidPath<Uuid>,
    ValidQuery(params): ValidQuery<PaginationParams>,
) -> Result<Json<Paginated<Like>>, ApiError> {
    let likes = LikeRepo::new(&state.pool).list(post_id, params.into()).await?;
    Ok(Json(likes))
}

/// POST /posts/{id}/likes - 409 if already liked
async fn like_post(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(post_id): ValidPath<Uuid>,
) -> Result<(StatusCode, Json<Like>), ApiError> {
    let like = LikeRepo::new(&state.pool).like(auth.id(), post_id).await?;
    Ok((StatusCode::CREATED, Json(like)))
}

/// DELETE /posts/{id}/likes
async fn unlike_post(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(post_id): ValidPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    LikeRepo::new(&state.pool).unlike(auth.id(), post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/posts/{id}/likes",
        get(list_likes).post(like_post).delete(unlike_post),
    )
}
