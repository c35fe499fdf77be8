//! User repository
//!
//! Deleting a user cascades through offers on both sides, so the delete runs
//! in one transaction that first walks the counters back down.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::base::{BaseRepo, DbError, Table};
use crate::models::{Email, Paginated, Pagination, UserRole};

/// User record from database
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub role: String,
    pub offers_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Parsed role; unknown values (not writable through the API) read as investor.
    pub fn role(&self) -> UserRole {
        UserRole::parse(&self.role).unwrap_or(UserRole::Investor)
    }
}

impl Table for User {
    const TABLE: &'static str = "users";
    const RESOURCE: &'static str = "user";
    const COLUMNS: &'static str = "id, email, password_hash, first_name, last_name, bio, role, \
                                   offers_count, created_at, updated_at";
    const SEARCH_COLUMNS: &'static [&'static str] = &["first_name", "last_name", "bio"];
}

/// Validated registration data
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub role: UserRole,
}

/// Validated profile edit; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// `Some(None)` clears the bio
    pub bio: Option<Option<String>>,
}

/// Files orphaned by an account deletion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovedFiles {
    pub media_paths: Vec<String>,
    pub project_ids: Vec<Uuid>,
}

/// User repository
pub struct UserRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    fn base(&self) -> BaseRepo<'a, User> {
        BaseRepo::new(self.pool)
    }

    pub async fn create(&self, new: NewUser) -> Result<User, DbError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, bio, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            User::COLUMNS
        ))
        .bind(new.email.as_str())
        .bind(&new.password_hash)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(new.bio.as_deref())
        .bind(new.role.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(|e| DbError::from(e).on_conflict("email is already registered"))
    }

    pub async fn find(&self, id: Uuid) -> Result<User, DbError> {
        self.base().find(id).await
    }

    /// Look up by normalized email. `None` rather than 404 so login can
    /// answer the same way for unknown emails and wrong passwords.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            User::COLUMNS
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    pub async fn list(
        &self,
        page: Pagination,
        search: Option<&str>,
    ) -> Result<Paginated<User>, DbError> {
        self.base().list(page, search).await
    }

    pub async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<User, DbError> {
        let (set_bio, bio) = match update.bio {
            Some(bio) => (true, bio),
            None => (false, None),
        };

        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                bio = CASE WHEN $4 THEN $5 ELSE bio END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            User::COLUMNS
        ))
        .bind(id)
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(set_bio)
        .bind(bio.as_deref())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found(User::RESOURCE, id))
    }

    /// Change a user's role (CLI `promote`).
    pub async fn set_role(&self, email: &str, role: UserRole) -> Result<User, DbError> {
        let email = email.trim().to_lowercase();
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE email = $1 RETURNING {}",
            User::COLUMNS
        ))
        .bind(&email)
        .bind(role.as_str())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found(User::RESOURCE, email))
    }

    /// Delete an account and everything it owns (atomic).
    ///
    /// The cascade drops the user's offers and every offer on the user's
    /// projects, so counters on the other side of those offers are
    /// decremented first. Returns the files the caller must remove from disk.
    pub async fn delete(&self, id: Uuid) -> Result<RemovedFiles, DbError> {
        let mut tx = self.pool.begin().await?;

        // Offer writers lock the project before any user row, so do the same:
        // every project whose counters or rows this delete touches, in id order.
        let projects: Vec<(Uuid, bool)> = sqlx::query_as(
            r#"
            SELECT id, owner_id = $1 FROM projects
            WHERE owner_id = $1
               OR id IN (SELECT project_id FROM offers WHERE investor_id = $1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        let project_ids: Vec<Uuid> = projects
            .into_iter()
            .filter_map(|(project_id, owned)| owned.then_some(project_id))
            .collect();

        let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(DbError::not_found(User::RESOURCE, id));
        }

        let media_paths: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT pm.path FROM post_media pm
            JOIN posts p ON p.id = pm.post_id
            WHERE p.author_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        // projects that received this user's offers
        sqlx::query(
            r#"
            UPDATE projects p SET offers_count = p.offers_count - c.n::int
            FROM (
                SELECT project_id, COUNT(*) AS n FROM offers
                WHERE investor_id = $1
                GROUP BY project_id
            ) c
            WHERE p.id = c.project_id
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        // investors who made offers on this user's projects
        sqlx::query(
            r#"
            UPDATE users u SET offers_count = u.offers_count - c.n::int
            FROM (
                SELECT o.investor_id, COUNT(*) AS n FROM offers o
                JOIN projects p ON p.id = o.project_id
                WHERE p.owner_id = $1
                GROUP BY o.investor_id
            ) c
            WHERE u.id = c.investor_id
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %id,
            media = media_paths.len(),
            projects = project_ids.len(),
            "Deleted user"
        );
        Ok(RemovedFiles {
            media_paths,
            project_ids,
        })
    }
}
