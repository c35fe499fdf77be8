//! Project team repository

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::base::{BaseRepo, DbError, Table};
use super::notifications::{notify, NewNotification};
use super::projects::lock_owner;
use crate::models::{NotificationKind, Paginated, Pagination, TeamRole};

/// Team membership record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TeamMember {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl Table for TeamMember {
    const TABLE: &'static str = "teams";
    const RESOURCE: &'static str = "team member";
    const COLUMNS: &'static str = "id, project_id, user_id, role, created_at";
    const ORDER_BY: &'static str = "created_at ASC";
}

/// Team repository
pub struct TeamRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> TeamRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Add a user to a project's team. Project owner only.
    pub async fn add(
        &self,
        caller: Uuid,
        project_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<TeamMember, DbError> {
        let mut tx = self.pool.begin().await?;

        if lock_owner(&mut tx, project_id).await? != caller {
            return Err(DbError::Forbidden(
                "only the project owner may manage its team".into(),
            ));
        }

        let user: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if user.is_none() {
            return Err(DbError::not_found("user", user_id));
        }

        let member = sqlx::query_as::<_, TeamMember>(&format!(
            "INSERT INTO teams (project_id, user_id, role) VALUES ($1, $2, $3) RETURNING {}",
            TeamMember::COLUMNS
        ))
        .bind(project_id)
        .bind(user_id)
        .bind(role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).on_conflict("user is already on this team"))?;

        if user_id != caller {
            notify(
                &mut *tx,
                NewNotification::new(
                    user_id,
                    NotificationKind::TeamAdded,
                    format!("You were added to a project team as {}", role),
                )
                .about(project_id),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(member)
    }

    /// Remove a member. The project owner or the member themself may.
    pub async fn remove(&self, caller: Uuid, project_id: Uuid, user_id: Uuid) -> Result<(), DbError> {
        let owner_id: Uuid = sqlx::query_scalar("SELECT owner_id FROM projects WHERE id = $1")
            .bind(project_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("project", project_id))?;

        if caller != owner_id && caller != user_id {
            return Err(DbError::Forbidden(
                "only the project owner or the member may remove a membership".into(),
            ));
        }

        let result = sqlx::query("DELETE FROM teams WHERE project_id = $1 AND user_id = $2")
            .bind(project_id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found(TeamMember::RESOURCE, user_id));
        }
        Ok(())
    }

    pub async fn list(
        &self,
        project_id: Uuid,
        page: Pagination,
    ) -> Result<Paginated<TeamMember>, DbError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
                .bind(project_id)
                .fetch_one(self.pool)
                .await?;
        if !exists {
            return Err(DbError::not_found("project", project_id));
        }
        BaseRepo::<TeamMember>::new(self.pool)
            .list_by("project_id", project_id, page)
            .await
    }
}
