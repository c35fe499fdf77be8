//! Message repository
//!
//! Every operation checks that the caller takes part in the discussion.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::base::{BaseRepo, DbError, Table};
use super::discussions::{lock_participant, DiscussionRepo};
use super::notifications::{notify, NewNotification};
use crate::models::{NotificationKind, Paginated, Pagination};

/// Message record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub discussion_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Table for Message {
    const TABLE: &'static str = "messages";
    const RESOURCE: &'static str = "message";
    const COLUMNS: &'static str = "id, discussion_id, sender_id, content, read_at, created_at";
    const ORDER_BY: &'static str = "created_at ASC";
}

/// Message repository
pub struct MessageRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> MessageRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Post a message and bump the discussion (atomic).
    pub async fn send(
        &self,
        sender_id: Uuid,
        discussion_id: Uuid,
        content: &str,
    ) -> Result<Message, DbError> {
        let mut tx = self.pool.begin().await?;
        let recipient = lock_participant(&mut tx, discussion_id, sender_id).await?;

        let message = sqlx::query_as::<_, Message>(&format!(
            "INSERT INTO messages (discussion_id, sender_id, content) VALUES ($1, $2, $3) RETURNING {}",
            Message::COLUMNS
        ))
        .bind(discussion_id)
        .bind(sender_id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE discussions SET updated_at = NOW() WHERE id = $1")
            .bind(discussion_id)
            .execute(&mut *tx)
            .await?;

        notify(
            &mut *tx,
            NewNotification::new(recipient, NotificationKind::Message, "You have a new message")
                .about(discussion_id),
        )
        .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// Messages in a discussion, oldest first.
    pub async fn list(
        &self,
        caller: Uuid,
        discussion_id: Uuid,
        page: Pagination,
    ) -> Result<Paginated<Message>, DbError> {
        DiscussionRepo::new(self.pool)
            .find_for(caller, discussion_id)
            .await?;

        BaseRepo::<Message>::new(self.pool)
            .list_by("discussion_id", discussion_id, page)
            .await
    }

    /// Mark the other participant's messages read, returning how many changed.
    pub async fn mark_read(&self, caller: Uuid, discussion_id: Uuid) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        lock_participant(&mut tx, discussion_id, caller).await?;

        let result = sqlx::query(
            r#"
            UPDATE messages SET read_at = NOW()
            WHERE discussion_id = $1 AND sender_id <> $2 AND read_at IS NULL
            "#,
        )
        .bind(discussion_id)
        .bind(caller)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::test_support;

    #[tokio::test]
    #[ignore = "requires database"]
    async fn outsiders_cannot_read_or_write() {
        let pool = test_support::pool().await;
        let alice = test_support::user(&pool).await;
        let bob = test_support::user(&pool).await;
        let eve = test_support::user(&pool).await;
        let discussion = DiscussionRepo::new(&pool).open(alice.id, bob.id).await.unwrap();
        let repo = MessageRepo::new(&pool);

        let err = repo.send(eve.id, discussion.id, "hi").await.unwrap_err();
        assert!(matches!(err, DbError::Forbidden(_)));
        let err = repo
            .list(eve.id, discussion.id, Pagination::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Forbidden(_)));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn mark_read_only_touches_incoming() {
        let pool = test_support::pool().await;
        let alice = test_support::user(&pool).await;
        let bob = test_support::user(&pool).await;
        let discussion = DiscussionRepo::new(&pool).open(alice.id, bob.id).await.unwrap();
        let repo = MessageRepo::new(&pool);

        repo.send(alice.id, discussion.id, "term sheet attached").await.unwrap();
        repo.send(bob.id, discussion.id, "thanks").await.unwrap();

        assert_eq!(repo.mark_read(bob.id, discussion.id).await.unwrap(), 1);
        assert_eq!(repo.mark_read(bob.id, discussion.id).await.unwrap(), 0);

        let page = repo
            .list(alice.id, discussion.id, Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.items[0].content, "term sheet attached");
        assert!(page.items[0].read_at.is_some());
        assert!(page.items[1].read_at.is_none());
    }
}
