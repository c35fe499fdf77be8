//! Discussion repository - one private thread per pair of users
//!
//! Pairs are stored canonically (`user_a < user_b`) so "alice with bob" and
//! "bob with alice" resolve to the same row.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::base::{BaseRepo, DbError, Filter, Table};
use crate::models::{Paginated, Pagination};

/// Discussion record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Discussion {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Discussion {
    /// The participant that isn't `me`.
    pub fn other(&self, me: Uuid) -> Uuid {
        if self.user_a == me {
            self.user_b
        } else {
            self.user_a
        }
    }
}

impl Table for Discussion {
    const TABLE: &'static str = "discussions";
    const RESOURCE: &'static str = "discussion";
    const COLUMNS: &'static str = "id, user_a, user_b, created_at, updated_at";
    const ORDER_BY: &'static str = "updated_at DESC";
}

/// Canonical ordering of a pair.
pub fn ordered(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Lock a discussion and return the other participant.
///
/// 404 if the discussion does not exist, 403 if `caller` is not in it.
pub(crate) async fn lock_participant(
    conn: &mut PgConnection,
    discussion_id: Uuid,
    caller: Uuid,
) -> Result<Uuid, DbError> {
    let pair: Option<(Uuid, Uuid)> =
        sqlx::query_as("SELECT user_a, user_b FROM discussions WHERE id = $1 FOR UPDATE")
            .bind(discussion_id)
            .fetch_optional(conn)
            .await?;

    match pair {
        None => Err(DbError::not_found(Discussion::RESOURCE, discussion_id)),
        Some((a, b)) if a == caller => Ok(b),
        Some((a, b)) if b == caller => Ok(a),
        Some(_) => Err(DbError::Forbidden(
            "not a participant in this discussion".into(),
        )),
    }
}

/// Discussion repository
pub struct DiscussionRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> DiscussionRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get or create the discussion between two users (idempotent).
    pub async fn open(&self, caller: Uuid, participant: Uuid) -> Result<Discussion, DbError> {
        let (user_a, user_b) = ordered(caller, participant);

        // the upsert also turns a missing participant into an FK error, but
        // that reads as 409; check first so it is a 404
        let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
            .bind(participant)
            .fetch_optional(self.pool)
            .await?;
        if found.is_none() {
            return Err(DbError::not_found("user", participant));
        }

        let discussion = sqlx::query_as::<_, Discussion>(&format!(
            r#"
            INSERT INTO discussions (user_a, user_b) VALUES ($1, $2)
            ON CONFLICT (user_a, user_b) DO UPDATE SET user_a = EXCLUDED.user_a
            RETURNING {}
            "#,
            Discussion::COLUMNS
        ))
        .bind(user_a)
        .bind(user_b)
        .fetch_one(self.pool)
        .await?;
        Ok(discussion)
    }

    /// Fetch a discussion the caller takes part in.
    pub async fn find_for(&self, caller: Uuid, id: Uuid) -> Result<Discussion, DbError> {
        let discussion = BaseRepo::<Discussion>::new(self.pool).find(id).await?;
        if discussion.user_a != caller && discussion.user_b != caller {
            return Err(DbError::Forbidden(
                "not a participant in this discussion".into(),
            ));
        }
        Ok(discussion)
    }

    /// The caller's discussions, most recently active first.
    pub async fn list_mine(
        &self,
        caller: Uuid,
        page: Pagination,
    ) -> Result<Paginated<Discussion>, DbError> {
        BaseRepo::<Discussion>::new(self.pool)
            .list_filtered(&[Filter::Either("user_a", "user_b", caller)], page)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::test_support;

    #[test]
    fn pair_order_is_canonical() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        assert_eq!(ordered(low, high), (low, high));
        assert_eq!(ordered(high, low), (low, high));
    }

    #[test]
    fn other_participant() {
        let d = Discussion {
            id: Uuid::nil(),
            user_a: Uuid::from_u128(1),
            user_b: Uuid::from_u128(2),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(d.other(Uuid::from_u128(1)), Uuid::from_u128(2));
        assert_eq!(d.other(Uuid::from_u128(2)), Uuid::from_u128(1));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn open_is_idempotent_in_both_directions() {
        let pool = test_support::pool().await;
        let alice = test_support::user(&pool).await;
        let bob = test_support::user(&pool).await;
        let repo = DiscussionRepo::new(&pool);

        let first = repo.open(alice.id, bob.id).await.unwrap();
        let second = repo.open(bob.id, alice.id).await.unwrap();
        assert_eq!(first.id, second.id);

        let err = repo.open(alice.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { resource: "user", .. }));
    }
}
