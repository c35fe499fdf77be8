//! Comment repository

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::base::{BaseRepo, DbError, Table};
use super::notifications::{notify, NewNotification};
use crate::models::{NotificationKind, Paginated, Pagination};

/// Comment record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Table for Comment {
    const TABLE: &'static str = "comments";
    const RESOURCE: &'static str = "comment";
    const COLUMNS: &'static str = "id, post_id, author_id, content, created_at, updated_at";
    const ORDER_BY: &'static str = "created_at ASC";
}

/// Comment repository
pub struct CommentRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> CommentRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    fn base(&self) -> BaseRepo<'a, Comment> {
        BaseRepo::new(self.pool)
    }

    /// Comment on a post. The post author is notified unless commenting on
    /// their own post.
    pub async fn create(&self, author_id: Uuid, post_id: Uuid, content: &str) -> Result<Comment, DbError> {
        let mut tx = self.pool.begin().await?;

        let post_author: Uuid = sqlx::query_scalar("SELECT author_id FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("post", post_id))?;

        let comment = sqlx::query_as::<_, Comment>(&format!(
            "INSERT INTO comments (post_id, author_id, content) VALUES ($1, $2, $3) RETURNING {}",
            Comment::COLUMNS
        ))
        .bind(post_id)
        .bind(author_id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        if post_author != author_id {
            notify(
                &mut *tx,
                NewNotification::new(
                    post_author,
                    NotificationKind::Comment,
                    "New comment on your post",
                )
                .about(post_id),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(comment)
    }

    /// Comments on a post, oldest first.
    pub async fn list(&self, post_id: Uuid, page: Pagination) -> Result<Paginated<Comment>, DbError> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(self.pool)
            .await?;
        if !exists {
            return Err(DbError::not_found("post", post_id));
        }
        self.base().list_by("post_id", post_id, page).await
    }

    pub async fn update(&self, caller: Uuid, id: Uuid, content: &str) -> Result<Comment, DbError> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            r#"
            UPDATE comments SET content = $3, updated_at = NOW()
            WHERE id = $1 AND author_id = $2
            RETURNING {}
            "#,
            Comment::COLUMNS
        ))
        .bind(id)
        .bind(caller)
        .bind(content)
        .fetch_optional(self.pool)
        .await?;

        match comment {
            Some(comment) => Ok(comment),
            None => Err(self.base().deny(id, "only the author may edit a comment").await),
        }
    }

    /// Delete a comment. Its author or the post's author may.
    pub async fn delete(&self, caller: Uuid, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            DELETE FROM comments c
            USING posts p
            WHERE c.id = $1 AND p.id = c.post_id
              AND (c.author_id = $2 OR p.author_id = $2)
            "#,
        )
        .bind(id)
        .bind(caller)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self
                .base()
                .deny(id, "only the comment or post author may delete a comment")
                .await);
        }
        Ok(())
    }
}
