//! Comment endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::repos::{Comment, CommentRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidJson, ValidPath, ValidQuery};
use crate::http::server::AppState;
use crate::models::{text, Paginated, PaginationParams, Validate, ValidationErrors};

const CONTENT_MAX: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

impl Validate for CommentRequest {
    type Valid = String;

    fn validate(self) -> Result<String, ValidationErrors> {
        Ok(text::required("content", &self.content, 1, CONTENT_MAX)?)
    }
}

/// GET /posts/{id}/comments - oldest first
async fn list_comments(
    State(state): State<Arc<AppState>>,
    ValidPath(post_id): ValidPath<Uuid>,
    ValidQuery(params): ValidQuery<PaginationParams>,
) -> Result<Json<Paginated<Comment>>, ApiError> {
    let comments = CommentRepo::new(&state.pool)
        .list(post_id, params.into())
        .await?;
    Ok(Json(comments))
}

/// POST /posts/{id}/comments
async fn create_comment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(post_id): ValidPath<Uuid>,
    ValidJson(content): ValidJson<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = CommentRepo::new(&state.pool)
        .create(auth.id(), post_id, &content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// PATCH /comments/{id} - comment author only
async fn update_comment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(content): ValidJson<CommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    let comment = CommentRepo::new(&state.pool)
        .update(auth.id(), id, &content)
        .await?;
    Ok(Json(comment))
}

/// DELETE /comments/{id} - comment author or post author
async fn delete_comment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    CommentRepo::new(&state.pool).delete(auth.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts/{id}/comments", get(list_comments).post(create_comment))
        .route("/comments/{id}", patch(update_comment).delete(delete_comment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_length() {
        assert!(CommentRequest { content: "Nice".into() }.validate().is_ok());
        let errors = CommentRequest {
            content: "x".repeat(CONTENT_MAX + 1),
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.fields()[0].field, "content");
    }
}
