//! Post media and project file rows
//!
//! The file is written before its row is inserted, so ownership is checked
//! first (`ensure_*`) to avoid writing uploads nobody may attach. Deletes
//! return the stored path; the caller removes the file after commit.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::base::{BaseRepo, DbError, Table};
use crate::models::{MediaKind, Paginated, Pagination};
use crate::storage::StoredFile;

/// Image or video attached to a post
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PostMedia {
    pub id: Uuid,
    pub post_id: Uuid,
    pub kind: String,
    pub path: String,
    pub original_name: Option<String>,
    pub content_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

impl Table for PostMedia {
    const TABLE: &'static str = "post_media";
    const RESOURCE: &'static str = "media";
    const COLUMNS: &'static str =
        "id, post_id, kind, path, original_name, content_type, size_bytes, created_at";
    const ORDER_BY: &'static str = "created_at ASC";
}

/// Document attached to a project
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectFile {
    pub id: Uuid,
    pub project_id: Uuid,
    pub path: String,
    pub original_name: Option<String>,
    pub content_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

impl Table for ProjectFile {
    const TABLE: &'static str = "project_files";
    const RESOURCE: &'static str = "project file";
    const COLUMNS: &'static str =
        "id, project_id, path, original_name, content_type, size_bytes, created_at";
    const ORDER_BY: &'static str = "created_at ASC";
}

/// Media repository
pub struct MediaRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> MediaRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// 404 if the post is missing, 403 if `caller` did not write it.
    pub async fn ensure_post_author(&self, caller: Uuid, post_id: Uuid) -> Result<(), DbError> {
        let author: Option<Uuid> = sqlx::query_scalar("SELECT author_id FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_optional(self.pool)
            .await?;
        match author {
            None => Err(DbError::not_found("post", post_id)),
            Some(author) if author != caller => Err(DbError::Forbidden(
                "only the author may attach media to a post".into(),
            )),
            Some(_) => Ok(()),
        }
    }

    /// 404 if the project is missing, 403 if `caller` does not own it.
    pub async fn ensure_project_owner(&self, caller: Uuid, project_id: Uuid) -> Result<(), DbError> {
        let owner: Option<Uuid> = sqlx::query_scalar("SELECT owner_id FROM projects WHERE id = $1")
            .bind(project_id)
            .fetch_optional(self.pool)
            .await?;
        match owner {
            None => Err(DbError::not_found("project", project_id)),
            Some(owner) if owner != caller => Err(DbError::Forbidden(
                "only the owner may attach files to a project".into(),
            )),
            Some(_) => Ok(()),
        }
    }

    pub async fn insert_post_media(
        &self,
        post_id: Uuid,
        kind: MediaKind,
        file: &StoredFile,
        original_name: Option<&str>,
    ) -> Result<PostMedia, DbError> {
        let media = sqlx::query_as::<_, PostMedia>(&format!(
            r#"
            INSERT INTO post_media (post_id, kind, path, original_name, content_type, size_bytes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            PostMedia::COLUMNS
        ))
        .bind(post_id)
        .bind(kind.as_str())
        .bind(&file.relative_path)
        .bind(original_name)
        .bind(&file.content_type)
        .bind(file.size_bytes)
        .fetch_one(self.pool)
        .await?;
        Ok(media)
    }

    pub async fn insert_project_file(
        &self,
        project_id: Uuid,
        file: &StoredFile,
        original_name: Option<&str>,
    ) -> Result<ProjectFile, DbError> {
        let row = sqlx::query_as::<_, ProjectFile>(&format!(
            r#"
            INSERT INTO project_files (project_id, path, original_name, content_type, size_bytes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            ProjectFile::COLUMNS
        ))
        .bind(project_id)
        .bind(&file.relative_path)
        .bind(original_name)
        .bind(&file.content_type)
        .bind(file.size_bytes)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_post_media(
        &self,
        post_id: Uuid,
        page: Pagination,
    ) -> Result<Paginated<PostMedia>, DbError> {
        BaseRepo::<PostMedia>::new(self.pool)
            .list_by("post_id", post_id, page)
            .await
    }

    pub async fn list_project_files(
        &self,
        project_id: Uuid,
        page: Pagination,
    ) -> Result<Paginated<ProjectFile>, DbError> {
        BaseRepo::<ProjectFile>::new(self.pool)
            .list_by("project_id", project_id, page)
            .await
    }

    /// Delete a post media row (post author only), returning its path.
    pub async fn delete_post_media(&self, caller: Uuid, id: Uuid) -> Result<String, DbError> {
        let path: Option<String> = sqlx::query_scalar(
            r#"
            DELETE FROM post_media m
            USING posts p
            WHERE m.id = $1 AND p.id = m.post_id AND p.author_id = $2
            RETURNING m.path
            "#,
        )
        .bind(id)
        .bind(caller)
        .fetch_optional(self.pool)
        .await?;

        match path {
            Some(path) => Ok(path),
            None => Err(BaseRepo::<PostMedia>::new(self.pool)
                .deny(id, "only the post author may remove its media")
                .await),
        }
    }

    /// Delete a project file row (project owner only), returning its path.
    pub async fn delete_project_file(&self, caller: Uuid, id: Uuid) -> Result<String, DbError> {
        let path: Option<String> = sqlx::query_scalar(
            r#"
            DELETE FROM project_files f
            USING projects p
            WHERE f.id = $1 AND p.id = f.project_id AND p.owner_id = $2
            RETURNING f.path
            "#,
        )
        .bind(id)
        .bind(caller)
        .fetch_optional(self.pool)
        .await?;

        match path {
            Some(path) => Ok(path),
            None => Err(BaseRepo::<ProjectFile>::new(self.pool)
                .deny(id, "only the project owner may remove its files")
                .await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::{test_support, PostRepo};

    fn stored(path: &str) -> StoredFile {
        StoredFile {
            relative_path: path.to_owned(),
            content_type: "image/png".into(),
            size_bytes: 42,
        }
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn media_rows_follow_post_ownership() {
        let pool = test_support::pool().await;
        let author = test_support::user(&pool).await;
        let other = test_support::user(&pool).await;
        let post = PostRepo::new(&pool).create(author.id, "Prototype pics").await.unwrap();
        let repo = MediaRepo::new(&pool);

        assert!(matches!(
            repo.ensure_post_author(other.id, post.id).await,
            Err(DbError::Forbidden(_))
        ));
        repo.ensure_post_author(author.id, post.id).await.unwrap();

        let path = format!("postMedia/images/{}.png", Uuid::new_v4());
        let media = repo
            .insert_post_media(post.id, MediaKind::Image, &stored(&path), Some("proto.png"))
            .await
            .unwrap();

        let err = repo.delete_post_media(other.id, media.id).await.unwrap_err();
        assert!(matches!(err, DbError::Forbidden(_)));
        assert_eq!(repo.delete_post_media(author.id, media.id).await.unwrap(), path);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn deleting_post_reports_media_paths() {
        let pool = test_support::pool().await;
        let author = test_support::user(&pool).await;
        let posts = PostRepo::new(&pool);
        let post = posts.create(author.id, "Launch video").await.unwrap();

        let path = format!("postMedia/videos/{}.mp4", Uuid::new_v4());
        MediaRepo::new(&pool)
            .insert_post_media(post.id, MediaKind::Video, &stored(&path), None)
            .await
            .unwrap();

        assert_eq!(posts.delete(author.id, post.id).await.unwrap(), vec![path]);
    }
}
