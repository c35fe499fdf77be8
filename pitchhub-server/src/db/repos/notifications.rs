//! Notification repository
//!
//! Other repositories call [`notify`] inside their own transaction so the
//! notification commits (or rolls back) with the change that caused it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use super::base::{BaseRepo, DbError, Filter, Table};
use crate::models::{NotificationKind, Paginated, Pagination};

/// Notification record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: String,
    pub content: String,
    pub reference_id: Option<Uuid>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Table for Notification {
    const TABLE: &'static str = "notifications";
    const RESOURCE: &'static str = "notification";
    const COLUMNS: &'static str =
        "id, recipient_id, kind, content, reference_id, read_at, created_at";
}

/// A notification to create
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub content: String,
    pub reference_id: Option<Uuid>,
}

impl NewNotification {
    pub fn new(recipient_id: Uuid, kind: NotificationKind, content: impl Into<String>) -> Self {
        Self {
            recipient_id,
            kind,
            content: content.into(),
            reference_id: None,
        }
    }

    pub fn about(mut self, reference_id: Uuid) -> Self {
        self.reference_id = Some(reference_id);
        self
    }
}

/// Insert a notification using any executor (pool or open transaction).
pub async fn notify<'e, E>(executor: E, new: NewNotification) -> Result<(), DbError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO notifications (recipient_id, kind, content, reference_id)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(new.recipient_id)
    .bind(new.kind.as_str())
    .bind(&new.content)
    .bind(new.reference_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Notification repository, always scoped to a recipient
pub struct NotificationRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
        page: Pagination,
    ) -> Result<Paginated<Notification>, DbError> {
        let mut filters = vec![Filter::Eq("recipient_id", recipient_id)];
        if unread_only {
            filters.push(Filter::IsNull("read_at"));
        }
        BaseRepo::<Notification>::new(self.pool)
            .list_filtered(&filters, page)
            .await
    }

    /// Mark one notification read. Already-read notifications keep their
    /// original `read_at`.
    pub async fn mark_read(&self, recipient_id: Uuid, id: Uuid) -> Result<Notification, DbError> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications SET read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND recipient_id = $2
            RETURNING {}
            "#,
            Notification::COLUMNS
        ))
        .bind(id)
        .bind(recipient_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found(Notification::RESOURCE, id))
    }

    /// Mark every unread notification read, returning how many changed.
    pub async fn mark_all_read(&self, recipient_id: Uuid) -> Result<u64, DbError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = NOW() WHERE recipient_id = $1 AND read_at IS NULL",
        )
        .bind(recipient_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, recipient_id: Uuid, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
            .bind(id)
            .bind(recipient_id)
            .execute(self.pool)
            .await?;

        // other users' notifications look missing, not forbidden
        if result.rows_affected() == 0 {
            return Err(DbError::not_found(Notification::RESOURCE, id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_reference() {
        let recipient = Uuid::new_v4();
        let target = Uuid::new_v4();
        let n = NewNotification::new(recipient, NotificationKind::Like, "someone liked your post")
            .about(target);

        assert_eq!(n.recipient_id, recipient);
        assert_eq!(n.reference_id, Some(target));
        assert_eq!(n.kind.as_str(), "like");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn notifications_are_recipient_scoped() {
        let pool = crate::db::repos::test_support::pool().await;
        let alice = crate::db::repos::test_support::user(&pool).await;
        let bob = crate::db::repos::test_support::user(&pool).await;

        notify(
            &pool,
            NewNotification::new(alice.id, NotificationKind::Message, "hello"),
        )
        .await
        .unwrap();

        let repo = NotificationRepo::new(&pool);
        let mine = repo.list(alice.id, true, Pagination::default()).await.unwrap();
        assert_eq!(mine.total, 1);

        let id = mine.items[0].id;
        assert!(matches!(
            repo.mark_read(bob.id, id).await,
            Err(DbError::NotFound { .. })
        ));
        repo.mark_read(alice.id, id).await.unwrap();

        let unread = repo.list(alice.id, true, Pagination::default()).await.unwrap();
        assert_eq!(unread.total, 0);
        assert_eq!(repo.mark_all_read(alice.id).await.unwrap(), 0);
    }
}
