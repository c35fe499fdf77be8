//! Sector repository
//!
//! Listings carry a project count via LEFT JOIN (no N+1).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::base::{page_from_rows, BaseRepo, DbError, Table};
use crate::models::{like_pattern, Paginated, Pagination};

/// Sector record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Sector {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Table for Sector {
    const TABLE: &'static str = "sectors";
    const RESOURCE: &'static str = "sector";
    const COLUMNS: &'static str = "id, name, description, created_at, updated_at";
    const ORDER_BY: &'static str = "name ASC";
    const SEARCH_COLUMNS: &'static [&'static str] = &["name", "description"];
}

/// Sector with the number of projects filed under it
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SectorWithCount {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub project_count: i64,
}

#[derive(Debug, Clone)]
pub struct NewSector {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SectorUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

/// Sector repository
pub struct SectorRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> SectorRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewSector) -> Result<Sector, DbError> {
        sqlx::query_as::<_, Sector>(&format!(
            "INSERT INTO sectors (name, description) VALUES ($1, $2) RETURNING {}",
            Sector::COLUMNS
        ))
        .bind(&new.name)
        .bind(new.description.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| DbError::from(e).on_conflict("a sector with this name already exists"))
    }

    pub async fn find(&self, id: Uuid) -> Result<Sector, DbError> {
        BaseRepo::<Sector>::new(self.pool).find(id).await
    }

    /// List sectors with project counts, optionally filtered by name/description.
    pub async fn list(
        &self,
        page: Pagination,
        search: Option<&str>,
    ) -> Result<Paginated<SectorWithCount>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT
                s.id, s.name, s.description, s.created_at, s.updated_at,
                COUNT(p.id) AS project_count,
                COUNT(*) OVER() AS total
            FROM sectors s
            LEFT JOIN projects p ON p.sector_id = s.id
            WHERE $1::text IS NULL OR s.name ILIKE $1 OR s.description ILIKE $1
            GROUP BY s.id
            ORDER BY s.name ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(search.map(like_pattern))
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool)
        .await?;

        page_from_rows(rows, page)
    }

    pub async fn update(&self, id: Uuid, update: SectorUpdate) -> Result<Sector, DbError> {
        let (set_description, description) = match update.description {
            Some(d) => (true, d),
            None => (false, None),
        };

        sqlx::query_as::<_, Sector>(&format!(
            r#"
            UPDATE sectors SET
                name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            Sector::COLUMNS
        ))
        .bind(id)
        .bind(update.name.as_deref())
        .bind(set_description)
        .bind(description.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DbError::from(e).on_conflict("a sector with this name already exists"))?
        .ok_or_else(|| DbError::not_found(Sector::RESOURCE, id))
    }

    /// Delete a sector. Sectors still referenced by projects are kept (409).
    pub async fn delete(&self, id: Uuid) -> Result<Sector, DbError> {
        BaseRepo::<Sector>::new(self.pool)
            .delete(id)
            .await
            .map_err(|e| e.on_conflict("sector still has projects"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::test_support;

    #[tokio::test]
    #[ignore = "requires database"]
    async fn referenced_sector_cannot_be_deleted() {
        let pool = test_support::pool().await;
        let owner = test_support::user(&pool).await;
        let project = test_support::project(&pool, owner.id).await;

        let err = SectorRepo::new(&pool).delete(project.sector_id).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(ref m) if m == "sector still has projects"));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn duplicate_name_conflicts() {
        let pool = test_support::pool().await;
        let sector = test_support::sector(&pool).await;

        let err = SectorRepo::new(&pool)
            .create(NewSector {
                name: sector.name.clone(),
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }
}
