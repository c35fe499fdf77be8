//! Post repository
//!
//! Reads carry like and comment counts from correlated subqueries, one
//! query per page (no N+1).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::base::{page_from_rows, BaseRepo, DbError, Table};
use crate::models::{like_pattern, Paginated, Pagination};

/// Post record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Table for Post {
    const TABLE: &'static str = "posts";
    const RESOURCE: &'static str = "post";
    const COLUMNS: &'static str = "id, author_id, content, created_at, updated_at";
    const SEARCH_COLUMNS: &'static [&'static str] = &["content"];
}

/// Post with engagement counts for display
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PostWithCounts {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub like_count: i64,
    pub comment_count: i64,
}

const WITH_COUNTS: &str = r#"
    SELECT
        p.id, p.author_id, p.content, p.created_at, p.updated_at,
        (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS like_count,
        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
"#;

/// Post repository
pub struct PostRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> PostRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    fn base(&self) -> BaseRepo<'a, Post> {
        BaseRepo::new(self.pool)
    }

    pub async fn create(&self, author_id: Uuid, content: &str) -> Result<Post, DbError> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "INSERT INTO posts (author_id, content) VALUES ($1, $2) RETURNING {}",
            Post::COLUMNS
        ))
        .bind(author_id)
        .bind(content)
        .fetch_one(self.pool)
        .await?;
        Ok(post)
    }

    pub async fn find(&self, id: Uuid) -> Result<PostWithCounts, DbError> {
        sqlx::query_as::<_, PostWithCounts>(&format!("{} FROM posts p WHERE p.id = $1", WITH_COUNTS))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found(Post::RESOURCE, id))
    }

    /// Author of a post, or 404.
    pub async fn author_id(&self, id: Uuid) -> Result<Uuid, DbError> {
        sqlx::query_scalar("SELECT author_id FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found(Post::RESOURCE, id))
    }

    /// Newest posts first, optionally by one author and/or matching a term.
    pub async fn list(
        &self,
        author_id: Option<Uuid>,
        search: Option<&str>,
        page: Pagination,
    ) -> Result<Paginated<PostWithCounts>, DbError> {
        let rows = sqlx::query(&format!(
            r#"
            {}, COUNT(*) OVER() AS total
            FROM posts p
            WHERE ($1::uuid IS NULL OR p.author_id = $1)
              AND ($2::text IS NULL OR p.content ILIKE $2)
            ORDER BY p.created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            WITH_COUNTS
        ))
        .bind(author_id)
        .bind(search.map(like_pattern))
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool)
        .await?;

        page_from_rows(rows, page)
    }

    pub async fn update(&self, caller: Uuid, id: Uuid, content: &str) -> Result<Post, DbError> {
        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts SET content = $3, updated_at = NOW()
            WHERE id = $1 AND author_id = $2
            RETURNING {}
            "#,
            Post::COLUMNS
        ))
        .bind(id)
        .bind(caller)
        .bind(content)
        .fetch_optional(self.pool)
        .await?;

        match post {
            Some(post) => Ok(post),
            None => Err(self.base().deny(id, "only the author may edit a post").await),
        }
    }

    /// Delete a post (author only), returning the media paths to remove.
    pub async fn delete(&self, caller: Uuid, id: Uuid) -> Result<Vec<String>, DbError> {
        let mut tx = self.pool.begin().await?;

        let author: Option<Uuid> =
            sqlx::query_scalar("SELECT author_id FROM posts WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        match author {
            None => return Err(DbError::not_found(Post::RESOURCE, id)),
            Some(author) if author != caller => {
                return Err(DbError::Forbidden("only the author may delete a post".into()))
            }
            Some(_) => {}
        }

        let paths: Vec<String> = sqlx::query_scalar("SELECT path FROM post_media WHERE post_id = $1")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(paths)
    }
}
