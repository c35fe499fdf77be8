//! Generic single-table CRUD shared by every repository
//!
//! Entity repositories describe their table with [`Table`] and get
//! `find`/`list`/`delete` from [`BaseRepo`]; they add create/update and any
//! multi-row transaction themselves.

use std::marker::PhantomData;

use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::models::{like_pattern, Paginated, Pagination};

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl DbError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Replace the generic conflict message with a domain one.
    pub fn on_conflict(self, message: &str) -> Self {
        match self {
            Self::Conflict(_) => Self::Conflict(message.to_owned()),
            other => other,
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error() {
            let constraint = db.constraint().unwrap_or("constraint").to_owned();
            if db.is_unique_violation() {
                return Self::Conflict(format!("duplicate value violates {}", constraint));
            }
            if db.is_foreign_key_violation() {
                return Self::Conflict(format!(
                    "referenced record is missing or still in use ({})",
                    constraint
                ));
            }
        }
        Self::Sqlx(e)
    }
}

/// A table managed through [`BaseRepo`]
pub trait Table: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static {
    /// Table name
    const TABLE: &'static str;
    /// Resource name used in 404 messages
    const RESOURCE: &'static str;
    /// Comma-separated column list matching the `FromRow` impl
    const COLUMNS: &'static str;
    /// ORDER BY clause for listings
    const ORDER_BY: &'static str = "created_at DESC";
    /// Columns matched by free-text search
    const SEARCH_COLUMNS: &'static [&'static str] = &[];
}

/// A WHERE condition for [`BaseRepo::list_filtered`].
///
/// Column names are `'static` so they can only come from code, never from
/// request input.
#[derive(Debug, Clone)]
pub enum Filter<'a> {
    /// `column = id`
    Eq(&'static str, Uuid),
    /// `column = text`
    Text(&'static str, &'a str),
    /// `a = id OR b = id`
    Either(&'static str, &'static str, Uuid),
    /// `column IS NULL`
    IsNull(&'static str),
    /// ILIKE over the table's search columns
    Search(&'a str),
}

/// Generic CRUD over one table
pub struct BaseRepo<'a, T> {
    pool: &'a PgPool,
    _table: PhantomData<fn() -> T>,
}

impl<'a, T: Table> BaseRepo<'a, T> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            _table: PhantomData,
        }
    }

    /// Fetch one row by id.
    pub async fn find(&self, id: Uuid) -> Result<T, DbError> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", T::COLUMNS, T::TABLE);
        sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found(T::RESOURCE, id))
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool, DbError> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", T::TABLE);
        let (exists,): (bool,) = sqlx::query_as(&sql).bind(id).fetch_one(self.pool).await?;
        Ok(exists)
    }

    /// Error for a guarded write that matched no row: 403 if the row exists
    /// (caller lacks rights), 404 otherwise.
    pub async fn deny(&self, id: Uuid, reason: &str) -> DbError {
        match self.exists(id).await {
            Ok(true) => DbError::Forbidden(reason.to_owned()),
            Ok(false) => DbError::not_found(T::RESOURCE, id),
            Err(e) => e,
        }
    }

    /// List all rows, optionally filtered by a search term.
    pub async fn list(
        &self,
        page: Pagination,
        search: Option<&str>,
    ) -> Result<Paginated<T>, DbError> {
        match search {
            Some(term) => self.list_filtered(&[Filter::Search(term)], page).await,
            None => self.list_filtered(&[], page).await,
        }
    }

    /// List rows where `column = value`.
    pub async fn list_by(
        &self,
        column: &'static str,
        value: Uuid,
        page: Pagination,
    ) -> Result<Paginated<T>, DbError> {
        self.list_filtered(&[Filter::Eq(column, value)], page).await
    }

    /// List rows matching every filter, with the total count in one query.
    pub async fn list_filtered(
        &self,
        filters: &[Filter<'_>],
        page: Pagination,
    ) -> Result<Paginated<T>, DbError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {}, COUNT(*) OVER() AS total FROM {}",
            T::COLUMNS,
            T::TABLE
        ));
        push_filters::<T>(&mut qb, filters);
        qb.push(format!(" ORDER BY {}", T::ORDER_BY));
        qb.push(" LIMIT ")
            .push_bind(page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows = qb.build().fetch_all(self.pool).await?;
        page_from_rows(rows, page)
    }

    /// Delete a row by id, returning it.
    pub async fn delete(&self, id: Uuid) -> Result<T, DbError> {
        let sql = format!(
            "DELETE FROM {} WHERE id = $1 RETURNING {}",
            T::TABLE,
            T::COLUMNS
        );
        sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found(T::RESOURCE, id))
    }
}

fn push_filters<T: Table>(qb: &mut QueryBuilder<'_, Postgres>, filters: &[Filter<'_>]) {
    let mut first = true;
    for filter in filters {
        // a search over a table without search columns matches everything
        if matches!(filter, Filter::Search(_)) && T::SEARCH_COLUMNS.is_empty() {
            continue;
        }

        qb.push(if first { " WHERE " } else { " AND " });
        first = false;

        match filter {
            Filter::Eq(column, value) => {
                qb.push(*column).push(" = ").push_bind(*value);
            }
            Filter::Text(column, value) => {
                qb.push(*column).push(" = ").push_bind(value.to_string());
            }
            Filter::Either(a, b, value) => {
                qb.push("(")
                    .push(*a)
                    .push(" = ")
                    .push_bind(*value)
                    .push(" OR ")
                    .push(*b)
                    .push(" = ")
                    .push_bind(*value)
                    .push(")");
            }
            Filter::IsNull(column) => {
                qb.push(*column).push(" IS NULL");
            }
            Filter::Search(term) => {
                let pattern = like_pattern(term);
                qb.push("(");
                for (i, column) in T::SEARCH_COLUMNS.iter().enumerate() {
                    if i > 0 {
                        qb.push(" OR ");
                    }
                    qb.push(*column).push(" ILIKE ").push_bind(pattern.clone());
                }
                qb.push(")");
            }
        }
    }
}

/// Build a page from rows carrying a `total` window column.
pub fn page_from_rows<T>(rows: Vec<PgRow>, page: Pagination) -> Result<Paginated<T>, DbError>
where
    T: for<'r> FromRow<'r, PgRow>,
{
    let total = match rows.first() {
        Some(row) => row.try_get::<i64, _>("total")?,
        None => 0,
    };
    let items = rows
        .iter()
        .map(T::from_row)
        .collect::<Result<Vec<T>, sqlx::Error>>()?;

    Ok(Paginated {
        items,
        total,
        page: page.page,
        per_page: page.per_page,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    #[derive(Debug, FromRow)]
    #[allow(dead_code)]
    struct Widget {
        id: Uuid,
        name: String,
        created_at: DateTime<Utc>,
    }

    impl Table for Widget {
        const TABLE: &'static str = "widgets";
        const RESOURCE: &'static str = "widget";
        const COLUMNS: &'static str = "id, name, created_at";
        const SEARCH_COLUMNS: &'static [&'static str] = &["name", "notes"];
    }

    #[derive(Debug, FromRow)]
    #[allow(dead_code)]
    struct Plain {
        id: Uuid,
    }

    impl Table for Plain {
        const TABLE: &'static str = "plain";
        const RESOURCE: &'static str = "plain";
        const COLUMNS: &'static str = "id";
    }

    fn sql_for<T: Table>(filters: &[Filter<'_>]) -> String {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT 1");
        push_filters::<T>(&mut qb, filters);
        qb.sql().to_string()
    }

    #[test]
    fn no_filters_no_where() {
        assert_eq!(sql_for::<Widget>(&[]), "SELECT 1");
    }

    #[test]
    fn filters_are_anded_with_numbered_binds() {
        let id = Uuid::new_v4();
        let sql = sql_for::<Widget>(&[
            Filter::Eq("owner_id", id),
            Filter::Text("status", "open"),
            Filter::IsNull("read_at"),
        ]);
        assert_eq!(
            sql,
            "SELECT 1 WHERE owner_id = $1 AND status = $2 AND read_at IS NULL"
        );
    }

    #[test]
    fn either_filter_binds_twice() {
        let sql = sql_for::<Widget>(&[Filter::Either("a", "b", Uuid::nil())]);
        assert_eq!(sql, "SELECT 1 WHERE (a = $1 OR b = $2)");
    }

    #[test]
    fn search_spans_search_columns() {
        let sql = sql_for::<Widget>(&[Filter::Search("solar")]);
        assert_eq!(sql, "SELECT 1 WHERE (name ILIKE $1 OR notes ILIKE $2)");
    }

    #[test]
    fn search_without_columns_is_skipped() {
        let sql = sql_for::<Plain>(&[Filter::Search("x"), Filter::Eq("id", Uuid::nil())]);
        assert_eq!(sql, "SELECT 1 WHERE id = $1");
    }

    #[test]
    fn on_conflict_rewrites_only_conflicts() {
        let err = DbError::Conflict("duplicate value violates x".into()).on_conflict("taken");
        assert!(matches!(err, DbError::Conflict(ref m) if m == "taken"));

        let err = DbError::not_found("user", "1").on_conflict("taken");
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
