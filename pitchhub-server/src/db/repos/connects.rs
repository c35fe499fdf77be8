//! Connection repository
//!
//! A pair of users has at most one connection, whichever side asked first.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::base::{BaseRepo, DbError, Filter, Table};
use super::notifications::{notify, NewNotification};
use crate::models::{ConnectStatus, NotificationKind, Paginated, Pagination};

const PAIR_EXISTS: &str = "a connection between these users already exists";

/// Connection record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Connect {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub receiver_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Table for Connect {
    const TABLE: &'static str = "connects";
    const RESOURCE: &'static str = "connect";
    const COLUMNS: &'static str =
        "id, requester_id, receiver_id, status, created_at, updated_at";
}

/// Connection repository
pub struct ConnectRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ConnectRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    fn base(&self) -> BaseRepo<'a, Connect> {
        BaseRepo::new(self.pool)
    }

    /// Ask another user to connect. The receiver is notified.
    pub async fn request(&self, requester_id: Uuid, receiver_id: Uuid) -> Result<Connect, DbError> {
        let mut tx = self.pool.begin().await?;

        let receiver: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
            .bind(receiver_id)
            .fetch_optional(&mut *tx)
            .await?;
        if receiver.is_none() {
            return Err(DbError::not_found("user", receiver_id));
        }

        let (reverse,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM connects WHERE requester_id = $1 AND receiver_id = $2)",
        )
        .bind(receiver_id)
        .bind(requester_id)
        .fetch_one(&mut *tx)
        .await?;
        if reverse {
            return Err(DbError::Conflict(PAIR_EXISTS.into()));
        }

        let connect = sqlx::query_as::<_, Connect>(&format!(
            "INSERT INTO connects (requester_id, receiver_id) VALUES ($1, $2) RETURNING {}",
            Connect::COLUMNS
        ))
        .bind(requester_id)
        .bind(receiver_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).on_conflict(PAIR_EXISTS))?;

        notify(
            &mut *tx,
            NewNotification::new(
                receiver_id,
                NotificationKind::ConnectRequest,
                "You have a new connection request",
            )
            .about(connect.id),
        )
        .await?;

        tx.commit().await?;
        Ok(connect)
    }

    /// Accept or reject a pending request. Receiver only.
    pub async fn respond(
        &self,
        caller: Uuid,
        id: Uuid,
        status: ConnectStatus,
    ) -> Result<Connect, DbError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(Uuid, String)> =
            sqlx::query_as("SELECT receiver_id, status FROM connects WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let (receiver_id, current_status) =
            current.ok_or_else(|| DbError::not_found(Connect::RESOURCE, id))?;

        if receiver_id != caller {
            return Err(DbError::Forbidden(
                "only the receiver may answer a connection request".into(),
            ));
        }
        if current_status != ConnectStatus::Pending.as_str() {
            return Err(DbError::Conflict(format!(
                "connection request is already {}",
                current_status
            )));
        }

        let connect = sqlx::query_as::<_, Connect>(&format!(
            "UPDATE connects SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            Connect::COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        if status == ConnectStatus::Accepted {
            notify(
                &mut *tx,
                NewNotification::new(
                    connect.requester_id,
                    NotificationKind::ConnectAccepted,
                    "Your connection request was accepted",
                )
                .about(connect.id),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(connect)
    }

    /// Remove a connection. Either party may.
    pub async fn delete(&self, caller: Uuid, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query(
            "DELETE FROM connects WHERE id = $1 AND (requester_id = $2 OR receiver_id = $2)",
        )
        .bind(id)
        .bind(caller)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.base().deny(id, "not a party to this connection").await);
        }
        Ok(())
    }

    /// Connections the caller is part of, either direction.
    pub async fn list_mine(
        &self,
        caller: Uuid,
        status: Option<ConnectStatus>,
        page: Pagination,
    ) -> Result<Paginated<Connect>, DbError> {
        let mut filters = vec![Filter::Either("requester_id", "receiver_id", caller)];
        if let Some(status) = status {
            filters.push(Filter::Text("status", status.as_str()));
        }
        self.base().list_filtered(&filters, page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::test_support;

    #[tokio::test]
    #[ignore = "requires database"]
    async fn reverse_request_conflicts() {
        let pool = test_support::pool().await;
        let alice = test_support::user(&pool).await;
        let bob = test_support::user(&pool).await;
        let repo = ConnectRepo::new(&pool);

        repo.request(alice.id, bob.id).await.unwrap();
        let err = repo.request(bob.id, alice.id).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(ref m) if m == PAIR_EXISTS));
        let err = repo.request(alice.id, bob.id).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn crossed_requests_leave_one_connection() {
        let pool = test_support::pool().await;
        let repo = ConnectRepo::new(&pool);

        for _ in 0..20 {
            let alice = test_support::user(&pool).await;
            let bob = test_support::user(&pool).await;

            let (forward, backward) =
                tokio::join!(repo.request(alice.id, bob.id), repo.request(bob.id, alice.id));
            assert!(
                forward.is_ok() != backward.is_ok(),
                "exactly one crossed request should win"
            );
            for result in [forward, backward] {
                if let Err(err) = result {
                    assert!(matches!(err, DbError::Conflict(ref m) if m == PAIR_EXISTS));
                }
            }

            let (rows,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM connects \
                 WHERE (requester_id = $1 AND receiver_id = $2) \
                    OR (requester_id = $2 AND receiver_id = $1)",
            )
            .bind(alice.id)
            .bind(bob.id)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert_eq!(rows, 1);
        }
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn only_receiver_responds_once() {
        let pool = test_support::pool().await;
        let alice = test_support::user(&pool).await;
        let bob = test_support::user(&pool).await;
        let repo = ConnectRepo::new(&pool);
        let connect = repo.request(alice.id, bob.id).await.unwrap();

        let err = repo
            .respond(alice.id, connect.id, ConnectStatus::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Forbidden(_)));

        let accepted = repo
            .respond(bob.id, connect.id, ConnectStatus::Accepted)
            .await
            .unwrap();
        assert_eq!(accepted.status, "accepted");

        let err = repo
            .respond(bob.id, connect.id, ConnectStatus::Rejected)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        let mine = repo
            .list_mine(alice.id, Some(ConnectStatus::Accepted), Pagination::default())
            .await
            .unwrap();
        assert_eq!(mine.total, 1);
    }
}
