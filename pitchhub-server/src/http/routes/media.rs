//! Post media and project file uploads
//!
//! Uploads are `multipart/form-data` with the file in a field named `file`.
//! Ownership is checked before the body is read. The file is written first
//! and the row inserted second; if the insert fails the file is removed.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::db::repos::{MediaRepo, PostMedia, ProjectFile};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidPath, ValidQuery};
use crate::http::server::AppState;
use crate::models::{Paginated, PaginationParams};
use crate::storage::{media_kind_for, public_url, StorageError, UploadTarget};

const FILE_FIELD: &str = "file";
const ORIGINAL_NAME_MAX: usize = 255;

/// A stored row plus the URL its file is served under
#[derive(Debug, Serialize)]
pub struct WithUrl<T> {
    #[serde(flatten)]
    pub item: T,
    pub url: String,
}

impl From<PostMedia> for WithUrl<PostMedia> {
    fn from(item: PostMedia) -> Self {
        let url = public_url(&item.path);
        Self { item, url }
    }
}

impl From<ProjectFile> for WithUrl<ProjectFile> {
    fn from(item: ProjectFile) -> Self {
        let url = public_url(&item.path);
        Self { item, url }
    }
}

/// The `file` part of a multipart body
#[derive(Debug)]
struct Upload {
    content_type: String,
    original_name: Option<String>,
    bytes: Vec<u8>,
}

/// Client file names are kept for display only; path components are dropped.
fn display_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if name.is_empty() {
        None
    } else {
        Some(name.chars().take(ORIGINAL_NAME_MAX).collect())
    }
}

async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Upload, ApiError> {
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field
            .content_type()
            .map(str::to_owned)
            .ok_or_else(|| ApiError::bad_request("file part has no content type"))?;
        let original_name = field.file_name().and_then(display_name);
        let bytes = field.bytes().await?.to_vec();

        return Ok(Upload {
            content_type,
            original_name,
            bytes,
        });
    }

    Err(ApiError::bad_request("multipart field `file` is required"))
}

/// GET /posts/{id}/media
async fn list_post_media(
    State(state): State<Arc<AppState>>,
    ValidPath(post_id): ValidPath<Uuid>,
    ValidQuery(params): ValidQuery<PaginationParams>,
) -> Result<Json<Paginated<WithUrl<PostMedia>>>, ApiError> {
    let media = MediaRepo::new(&state.pool)
        .list_post_media(post_id, params.into())
        .await?;
    Ok(Json(media.map(WithUrl::from)))
}

/// POST /posts/{id}/media - post author only; images and videos
async fn upload_post_media(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(post_id): ValidPath<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<WithUrl<PostMedia>>), ApiError> {
    let repo = MediaRepo::new(&state.pool);
    repo.ensure_post_author(auth.id(), post_id).await?;

    let upload = read_upload(multipart).await?;
    let kind = media_kind_for(&upload.content_type)
        .ok_or_else(|| StorageError::UnsupportedType(upload.content_type.clone()))?;

    let stored = state
        .storage
        .save(UploadTarget::PostMedia(kind), &upload.content_type, &upload.bytes)
        .await?;

    let media = match repo
        .insert_post_media(post_id, kind, &stored, upload.original_name.as_deref())
        .await
    {
        Ok(media) => media,
        Err(e) => {
            state.storage.discard(&[stored.relative_path], &[]).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        media_id = %media.id,
        post_id = %post_id,
        kind = %kind,
        size_bytes = media.size_bytes,
        "Post media uploaded"
    );
    Ok((StatusCode::CREATED, Json(media.into())))
}

/// DELETE /media/{id} - post author only
async fn delete_post_media(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    let path = MediaRepo::new(&state.pool)
        .delete_post_media(auth.id(), id)
        .await?;
    state.storage.discard(&[path], &[]).await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /projects/{id}/files
async fn list_project_files(
    State(state): State<Arc<AppState>>,
    ValidPath(project_id): ValidPath<Uuid>,
    ValidQuery(params): ValidQuery<PaginationParams>,
) -> Result<Json<Paginated<WithUrl<ProjectFile>>>, ApiError> {
    let files = MediaRepo::new(&state.pool)
        .list_project_files(project_id, params.into())
        .await?;
    Ok(Json(files.map(WithUrl::from)))
}

/// POST /projects/{id}/files - project owner only
async fn upload_project_file(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(project_id): ValidPath<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<WithUrl<ProjectFile>>), ApiError> {
    let repo = MediaRepo::new(&state.pool);
    repo.ensure_project_owner(auth.id(), project_id).await?;

    let upload = read_upload(multipart).await?;
    let stored = state
        .storage
        .save(UploadTarget::Project(project_id), &upload.content_type, &upload.bytes)
        .await?;

    let file = match repo
        .insert_project_file(project_id, &stored, upload.original_name.as_deref())
        .await
    {
        Ok(file) => file,
        Err(e) => {
            state.storage.discard(&[stored.relative_path], &[]).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        file_id = %file.id,
        project_id = %project_id,
        size_bytes = file.size_bytes,
        "Project file uploaded"
    );
    Ok((StatusCode::CREATED, Json(file.into())))
}

/// DELETE /project-files/{id} - project owner only
async fn delete_project_file(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    let path = MediaRepo::new(&state.pool)
        .delete_project_file(auth.id(), id)
        .await?;
    state.storage.discard(&[path], &[]).await;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts/{id}/media", get(list_post_media).post(upload_post_media))
        .route("/media/{id}", delete(delete_post_media))
        .route(
            "/projects/{id}/files",
            get(list_project_files).post(upload_project_file),
        )
        .route("/project-files/{id}", delete(delete_project_file))
}
