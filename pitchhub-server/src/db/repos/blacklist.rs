//! Revoked bearer tokens, keyed by `jti`
//!
//! Rows only need to outlive the token they block; [`BlacklistRepo::sweep_expired`]
//! drops them once `expires_at` has passed.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::base::DbError;

/// Token blacklist repository
pub struct BlacklistRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> BlacklistRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Revoke a token. Revoking twice is a no-op.
    pub async fn revoke(
        &self,
        jti: Uuid,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO token_blacklist (jti, user_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(jti)
        .bind(user_id)
        .bind(expires_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn is_revoked(&self, jti: Uuid) -> Result<bool, DbError> {
        let (revoked,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM token_blacklist WHERE jti = $1)")
                .bind(jti)
                .fetch_one(self.pool)
                .await?;
        Ok(revoked)
    }

    /// Delete entries whose token expired before `now`, returning the count.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM token_blacklist WHERE expires_at < $1")
            .bind(now)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    #[ignore = "requires database"]
    async fn sweep_removes_only_expired() {
        let pool = crate::db::repos::test_support::pool().await;
        let repo = BlacklistRepo::new(&pool);
        let now = Utc::now();

        let expired = Uuid::new_v4();
        let live = Uuid::new_v4();
        repo.revoke(expired, Uuid::new_v4(), now - Duration::minutes(5))
            .await
            .unwrap();
        repo.revoke(live, Uuid::new_v4(), now + Duration::hours(1))
            .await
            .unwrap();
        // idempotent
        repo.revoke(live, Uuid::new_v4(), now + Duration::hours(1))
            .await
            .unwrap();

        assert!(repo.sweep_expired(now).await.unwrap() >= 1);
        assert!(!repo.is_revoked(expired).await.unwrap());
        assert!(repo.is_revoked(live).await.unwrap());
    }
}
