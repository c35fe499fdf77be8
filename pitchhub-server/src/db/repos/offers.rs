//! Offer repository
//!
//! Offers drive the denormalized `offers_count` columns on `users` (the
//! investor) and `projects` (the target). Create and delete run in one
//! transaction each, so either the offer row and both counters change
//! together or nothing does.
//!
//! Lock order is project row, then offer row, then counters. Every writer
//! follows it, so concurrent offers on one project serialize instead of
//! deadlocking.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::base::{BaseRepo, DbError, Table};
use super::notifications::{notify, NewNotification};
use super::projects::lock_owner;
use crate::models::{Amount, NotificationKind, OfferStatus, Paginated, Pagination};

/// Offer record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Offer {
    pub id: Uuid,
    pub investor_id: Uuid,
    pub project_id: Uuid,
    pub amount: i64,
    pub message: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    pub fn status(&self) -> OfferStatus {
        OfferStatus::parse(&self.status).unwrap_or(OfferStatus::Pending)
    }
}

impl Table for Offer {
    const TABLE: &'static str = "offers";
    const RESOURCE: &'static str = "offer";
    const COLUMNS: &'static str =
        "id, investor_id, project_id, amount, message, status, created_at, updated_at";
}

#[derive(Debug, Clone)]
pub struct NewOffer {
    pub project_id: Uuid,
    pub amount: Amount,
    pub message: Option<String>,
}

/// Offer edit. The investor may change `amount`/`message`; the project owner
/// may change `status`. Mixing both in one request is rejected.
#[derive(Debug, Clone, Default)]
pub struct OfferUpdate {
    pub amount: Option<Amount>,
    /// `Some(None)` clears the message
    pub message: Option<Option<String>>,
    pub status: Option<OfferStatus>,
}

impl OfferUpdate {
    fn edits_terms(&self) -> bool {
        self.amount.is_some() || self.message.is_some()
    }
}

/// Who is acting on an offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Party {
    Investor,
    Owner,
}

struct OfferLock {
    investor_id: Uuid,
    project_id: Uuid,
    owner_id: Uuid,
    status: OfferStatus,
}

impl OfferLock {
    fn party(&self, caller: Uuid) -> Option<Party> {
        if caller == self.investor_id {
            Some(Party::Investor)
        } else if caller == self.owner_id {
            Some(Party::Owner)
        } else {
            None
        }
    }
}

/// Lock an offer (after its project) and return who may act on it.
async fn lock_offer(conn: &mut PgConnection, id: Uuid) -> Result<OfferLock, DbError> {
    let project_id: Uuid = sqlx::query_scalar("SELECT project_id FROM offers WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found(Offer::RESOURCE, id))?;

    let owner_id = lock_owner(&mut *conn, project_id).await?;

    let row: Option<(Uuid, String)> =
        sqlx::query_as("SELECT investor_id, status FROM offers WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    // deleted between the first read and the lock
    let (investor_id, status) = row.ok_or_else(|| DbError::not_found(Offer::RESOURCE, id))?;

    Ok(OfferLock {
        investor_id,
        project_id,
        owner_id,
        status: OfferStatus::parse(&status).unwrap_or(OfferStatus::Pending),
    })
}

async fn adjust_counters(
    conn: &mut PgConnection,
    investor_id: Uuid,
    project_id: Uuid,
    delta: i32,
) -> Result<(), DbError> {
    let investor = sqlx::query(
        "UPDATE users SET offers_count = offers_count + $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(investor_id)
    .bind(delta)
    .execute(&mut *conn)
    .await?;
    if investor.rows_affected() == 0 {
        return Err(DbError::not_found("user", investor_id));
    }

    sqlx::query("UPDATE projects SET offers_count = offers_count + $2 WHERE id = $1")
        .bind(project_id)
        .bind(delta)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Offer repository
pub struct OfferRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> OfferRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    fn base(&self) -> BaseRepo<'a, Offer> {
        BaseRepo::new(self.pool)
    }

    /// Make an offer and bump both counters (atomic).
    ///
    /// - 404 if the project does not exist
    /// - 409 on the investor's own project or a second offer on the same project
    pub async fn create(&self, investor_id: Uuid, new: NewOffer) -> Result<Offer, DbError> {
        let mut tx = self.pool.begin().await?;

        let owner_id = lock_owner(&mut tx, new.project_id).await?;
        if owner_id == investor_id {
            return Err(DbError::Conflict(
                "cannot make an offer on your own project".into(),
            ));
        }

        let offer = sqlx::query_as::<_, Offer>(&format!(
            r#"
            INSERT INTO offers (investor_id, project_id, amount, message)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            Offer::COLUMNS
        ))
        .bind(investor_id)
        .bind(new.project_id)
        .bind(new.amount.get())
        .bind(new.message.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).on_conflict("you already made an offer on this project"))?;

        adjust_counters(&mut tx, investor_id, new.project_id, 1).await?;

        notify(
            &mut *tx,
            NewNotification::new(
                owner_id,
                NotificationKind::OfferReceived,
                format!("New offer of {} on your project", offer.amount),
            )
            .about(offer.id),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            offer_id = %offer.id,
            project_id = %offer.project_id,
            investor_id = %offer.investor_id,
            "Offer created"
        );
        Ok(offer)
    }

    /// Fetch an offer visible to the caller (its investor or the project owner).
    pub async fn find_visible(&self, caller: Uuid, id: Uuid) -> Result<Offer, DbError> {
        let offer = sqlx::query_as::<_, Offer>(
            r#"
            SELECT o.id, o.investor_id, o.project_id, o.amount, o.message, o.status,
                   o.created_at, o.updated_at
            FROM offers o
            JOIN projects p ON p.id = o.project_id
            WHERE o.id = $1 AND (o.investor_id = $2 OR p.owner_id = $2)
            "#,
        )
        .bind(id)
        .bind(caller)
        .fetch_optional(self.pool)
        .await?;

        match offer {
            Some(offer) => Ok(offer),
            None => Err(self.base().deny(id, "not a party to this offer").await),
        }
    }

    /// Offers made by an investor.
    pub async fn list_mine(
        &self,
        investor_id: Uuid,
        page: Pagination,
    ) -> Result<Paginated<Offer>, DbError> {
        self.base().list_by("investor_id", investor_id, page).await
    }

    /// Offers on a project; only its owner may list them.
    pub async fn list_for_project(
        &self,
        caller: Uuid,
        project_id: Uuid,
        page: Pagination,
    ) -> Result<Paginated<Offer>, DbError> {
        let owner_id: Uuid = sqlx::query_scalar("SELECT owner_id FROM projects WHERE id = $1")
            .bind(project_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("project", project_id))?;
        if owner_id != caller {
            return Err(DbError::Forbidden(
                "only the project owner may list its offers".into(),
            ));
        }
        self.base().list_by("project_id", project_id, page).await
    }

    /// Edit an offer.
    ///
    /// - investor: amount/message while pending
    /// - project owner: status while pending (investor is notified)
    /// - anyone else: 403
    pub async fn update(
        &self,
        caller: Uuid,
        id: Uuid,
        update: OfferUpdate,
    ) -> Result<Offer, DbError> {
        let mut tx = self.pool.begin().await?;
        let lock = lock_offer(&mut tx, id).await?;

        let party = lock
            .party(caller)
            .ok_or_else(|| DbError::Forbidden("not a party to this offer".into()))?;
        match party {
            Party::Investor if update.status.is_some() => {
                return Err(DbError::Forbidden(
                    "only the project owner may set an offer's status".into(),
                ));
            }
            Party::Owner if update.edits_terms() => {
                return Err(DbError::Forbidden(
                    "only the investor may change amount or message".into(),
                ));
            }
            _ => {}
        }
        if lock.status != OfferStatus::Pending {
            return Err(DbError::Conflict(format!(
                "offer is already {}",
                lock.status
            )));
        }

        let (set_message, message) = match update.message {
            Some(m) => (true, m),
            None => (false, None),
        };

        let offer = sqlx::query_as::<_, Offer>(&format!(
            r#"
            UPDATE offers SET
                amount = COALESCE($2, amount),
                message = CASE WHEN $3 THEN $4 ELSE message END,
                status = COALESCE($5, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            Offer::COLUMNS
        ))
        .bind(id)
        .bind(update.amount.map(Amount::get))
        .bind(set_message)
        .bind(message.as_deref())
        .bind(update.status.map(|s| s.as_str()))
        .fetch_one(&mut *tx)
        .await?;

        if party == Party::Owner {
            if let Some(status) = update.status.filter(|s| *s != OfferStatus::Pending) {
                notify(
                    &mut *tx,
                    NewNotification::new(
                        lock.investor_id,
                        NotificationKind::OfferStatus,
                        format!("Your offer was {}", status),
                    )
                    .about(id),
                )
                .await?;
            }
        }

        tx.commit().await?;
        Ok(offer)
    }

    /// Withdraw an offer and decrement both counters (atomic). Investor only.
    pub async fn delete(&self, caller: Uuid, id: Uuid) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        let lock = lock_offer(&mut tx, id).await?;

        if lock.party(caller) != Some(Party::Investor) {
            return Err(DbError::Forbidden(
                "only the investor may withdraw an offer".into(),
            ));
        }

        sqlx::query("DELETE FROM offers WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        adjust_counters(&mut tx, lock.investor_id, lock.project_id, -1).await?;

        tx.commit().await?;

        tracing::info!(offer_id = %id, "Offer withdrawn");
        Ok(())
    }
}
