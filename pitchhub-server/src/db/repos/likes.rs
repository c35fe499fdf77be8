//! Like repository

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::base::{BaseRepo, DbError, Table};
use super::notifications::{notify, NewNotification};
use crate::models::{NotificationKind, Paginated, Pagination};

/// Like record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Like {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Table for Like {
    const TABLE: &'static str = "likes";
    const RESOURCE: &'static str = "like";
    const COLUMNS: &'static str = "id, post_id, user_id, created_at";
}

/// Like repository
pub struct LikeRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> LikeRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Like a post once; a second like is a 409.
    pub async fn like(&self, user_id: Uuid, post_id: Uuid) -> Result<Like, DbError> {
        let mut tx = self.pool.begin().await?;

        let post_author: Uuid = sqlx::query_scalar("SELECT author_id FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("post", post_id))?;

        let like = sqlx::query_as::<_, Like>(&format!(
            "INSERT INTO likes (post_id, user_id) VALUES ($1, $2) RETURNING {}",
            Like::COLUMNS
        ))
        .bind(post_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).on_conflict("post is already liked"))?;

        if post_author != user_id {
            notify(
                &mut *tx,
                NewNotification::new(post_author, NotificationKind::Like, "Someone liked your post")
                    .about(post_id),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(like)
    }

    pub async fn unlike(&self, user_id: Uuid, post_id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found(Like::RESOURCE, post_id));
        }
        Ok(())
    }

    pub async fn list(&self, post_id: Uuid, page: Pagination) -> Result<Paginated<Like>, DbError> {
        BaseRepo::<Like>::new(self.pool)
            .list_by("post_id", post_id, page)
            .await
    }
}
