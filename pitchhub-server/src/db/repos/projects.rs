//! Project repository
//!
//! Writes lock the project row (`FOR UPDATE`) and check ownership inside the
//! transaction. Delete walks investor counters down before the cascade drops
//! the project's offers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::base::{BaseRepo, DbError, Filter, Table};
use crate::models::{Amount, Paginated, Pagination};

/// Project record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub sector_id: Uuid,
    pub title: String,
    pub description: String,
    pub funding_goal: i64,
    pub offers_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Table for Project {
    const TABLE: &'static str = "projects";
    const RESOURCE: &'static str = "project";
    const COLUMNS: &'static str = "id, owner_id, sector_id, title, description, funding_goal, \
                                   offers_count, created_at, updated_at";
    const SEARCH_COLUMNS: &'static [&'static str] = &["title", "description"];
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub sector_id: Uuid,
    pub title: String,
    pub description: String,
    pub funding_goal: Amount,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub sector_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub funding_goal: Option<Amount>,
}

/// Lock a project row and return its owner, or 404.
pub(crate) async fn lock_owner(conn: &mut PgConnection, project_id: Uuid) -> Result<Uuid, DbError> {
    sqlx::query_scalar("SELECT owner_id FROM projects WHERE id = $1 FOR UPDATE")
        .bind(project_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found(Project::RESOURCE, project_id))
}

async fn ensure_sector(conn: &mut PgConnection, sector_id: Uuid) -> Result<(), DbError> {
    // FOR SHARE keeps the sector from being deleted until commit
    let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM sectors WHERE id = $1 FOR SHARE")
        .bind(sector_id)
        .fetch_optional(conn)
        .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(DbError::not_found("sector", sector_id)),
    }
}

/// Listing filter; absent fields match every project.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjectFilter<'a> {
    pub owner_id: Option<Uuid>,
    pub sector_id: Option<Uuid>,
    pub search: Option<&'a str>,
}

impl<'a> ProjectFilter<'a> {
    fn conditions(&self) -> Vec<Filter<'a>> {
        let mut filters = Vec::new();
        if let Some(owner_id) = self.owner_id {
            filters.push(Filter::Eq("owner_id", owner_id));
        }
        if let Some(sector_id) = self.sector_id {
            filters.push(Filter::Eq("sector_id", sector_id));
        }
        if let Some(term) = self.search {
            filters.push(Filter::Search(term));
        }
        filters
    }
}

/// Project repository
pub struct ProjectRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ProjectRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    fn base(&self) -> BaseRepo<'a, Project> {
        BaseRepo::new(self.pool)
    }

    pub async fn create(&self, owner_id: Uuid, new: NewProject) -> Result<Project, DbError> {
        let mut tx = self.pool.begin().await?;

        ensure_sector(&mut tx, new.sector_id).await?;

        let project = sqlx::query_as::<_, Project>(&format!(
            r#"
            INSERT INTO projects (owner_id, sector_id, title, description, funding_goal)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            Project::COLUMNS
        ))
        .bind(owner_id)
        .bind(new.sector_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.funding_goal.get())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(project)
    }

    pub async fn find(&self, id: Uuid) -> Result<Project, DbError> {
        self.base().find(id).await
    }

    /// List projects narrowed by any combination of owner, sector and search term.
    pub async fn list(
        &self,
        filter: ProjectFilter<'_>,
        page: Pagination,
    ) -> Result<Paginated<Project>, DbError> {
        self.base().list_filtered(&filter.conditions(), page).await
    }

    pub async fn update(
        &self,
        owner_id: Uuid,
        id: Uuid,
        update: ProjectUpdate,
    ) -> Result<Project, DbError> {
        let mut tx = self.pool.begin().await?;

        if lock_owner(&mut tx, id).await? != owner_id {
            return Err(DbError::Forbidden("only the owner may edit a project".into()));
        }
        if let Some(sector_id) = update.sector_id {
            ensure_sector(&mut tx, sector_id).await?;
        }

        let project = sqlx::query_as::<_, Project>(&format!(
            r#"
            UPDATE projects SET
                sector_id = COALESCE($2, sector_id),
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                funding_goal = COALESCE($5, funding_goal),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            Project::COLUMNS
        ))
        .bind(id)
        .bind(update.sector_id)
        .bind(update.title.as_deref())
        .bind(update.description.as_deref())
        .bind(update.funding_goal.map(Amount::get))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(project)
    }

    /// Delete a project (atomic), returning its id for directory removal.
    pub async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<Uuid, DbError> {
        let mut tx = self.pool.begin().await?;

        if lock_owner(&mut tx, id).await? != owner_id {
            return Err(DbError::Forbidden("only the owner may delete a project".into()));
        }

        let touched = sqlx::query(
            r#"
            UPDATE users u SET offers_count = u.offers_count - c.n::int
            FROM (
                SELECT investor_id, COUNT(*) AS n FROM offers
                WHERE project_id = $1
                GROUP BY investor_id
            ) c
            WHERE u.id = c.investor_id
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(project_id = %id, investors = touched.rows_affected(), "Deleted project");
        Ok(id)
    }
}
