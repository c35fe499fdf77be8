//! Post endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::repos::{Post, PostRepo, PostWithCounts};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidJson, ValidPath, ValidQuery};
use crate::http::server::AppState;
use crate::models::{text, ListParams, Paginated, Validate, ValidationErrors};

pub const CONTENT_MAX: usize = 5000;

#[derive(Debug, Default, Deserialize)]
pub struct PostQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub q: Option<String>,
    pub author_id: Option<Uuid>,
}

/// Body of a post; used for both create and edit
#[derive(Debug, Deserialize)]
pub struct PostRequest {
    pub content: String,
}

impl Validate for PostRequest {
    type Valid = String;

    fn validate(self) -> Result<String, ValidationErrors> {
        Ok(text::required("content", &self.content, 1, CONTENT_MAX)?)
    }
}

/// GET /posts - newest first, `?author_id=&q=`
async fn list_posts(
    State(state): State<Arc<AppState>>,
    ValidQuery(query): ValidQuery<PostQuery>,
) -> Result<Json<Paginated<PostWithCounts>>, ApiError> {
    let params = ListParams {
        page: query.page,
        per_page: query.per_page,
        q: query.q,
    };
    let search = params.search();
    let posts = PostRepo::new(&state.pool)
        .list(query.author_id, search.as_deref(), params.pagination())
        .await?;
    Ok(Json(posts))
}

/// GET /posts/{id}
async fn get_post(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<PostWithCounts>, ApiError> {
    Ok(Json(PostRepo::new(&state.pool).find(id).await?))
}

/// POST /posts
async fn create_post(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidJson(content): ValidJson<PostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let post = PostRepo::new(&state.pool).create(auth.id(), &content).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// PATCH /posts/{id} - author only
async fn update_post(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(content): ValidJson<PostRequest>,
) -> Result<Json<Post>, ApiError> {
    let post = PostRepo::new(&state.pool)
        .update(auth.id(), id, &content)
        .await?;
    Ok(Json(post))
}

/// DELETE /posts/{id} - author only; attached media files are removed
async fn delete_post(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    let media_paths = PostRepo::new(&state.pool).delete(auth.id(), id).await?;
    state.storage.discard(&media_paths, &[]).await;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(get_post).patch(update_post).delete(delete_post),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_trimmed() {
        let content = PostRequest {
            content: "  We just closed our seed round!\n".into(),
        }
        .validate()
        .unwrap();
        assert_eq!(content, "We just closed our seed round!");
    }

    #[test]
    fn content_bounds() {
        assert!(PostRequest { content: "  ".into() }.validate().is_err());
        assert!(PostRequest {
            content: "x".repeat(CONTENT_MAX + 1)
        }
        .validate()
        .is_err());
    }
}
