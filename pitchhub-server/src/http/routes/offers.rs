//! Offer endpoints
//!
//! Investors make and edit offers; project owners accept or reject them.
//! Counter bookkeeping lives in the repository transaction.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::optional_field;
use crate::db::repos::{NewOffer, Offer, OfferRepo, OfferUpdate};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidJson, ValidPath, ValidQuery};
use crate::http::server::AppState;
use crate::models::{
    text, Amount, OfferStatus, Paginated, PaginationParams, Validate, ValidationError,
    ValidationErrors,
};

const MESSAGE_MAX: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct CreateOfferRequest {
    pub project_id: Uuid,
    pub amount: i64,
    pub message: Option<String>,
}

impl Validate for CreateOfferRequest {
    type Valid = NewOffer;

    fn validate(self) -> Result<NewOffer, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let amount = errors.check(Amount::new("amount", self.amount));
        let message = errors.check(text::optional("message", self.message.as_deref(), MESSAGE_MAX));

        match (amount, message) {
            (Some(amount), Some(message)) => Ok(NewOffer {
                project_id: self.project_id,
                amount,
                message,
            }),
            _ => Err(errors),
        }
    }
}

/// Offer edit; `status` must be a decision, not `pending`
#[derive(Debug, Deserialize)]
pub struct UpdateOfferRequest {
    pub amount: Option<i64>,
    pub message: Option<String>,
    pub status: Option<String>,
}

fn decision(raw: String) -> Result<OfferStatus, ValidationError> {
    match OfferStatus::parse(&raw)? {
        OfferStatus::Pending => Err(ValidationError::InvalidVariant {
            field: "status",
            value: raw,
        }),
        status => Ok(status),
    }
}

impl Validate for UpdateOfferRequest {
    type Valid = OfferUpdate;

    fn validate(self) -> Result<OfferUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let amount = optional_field(&mut errors, self.amount, |v| Amount::new("amount", v));
        let message = optional_field(&mut errors, self.message, |s| {
            text::optional("message", Some(&s), MESSAGE_MAX)
        });
        let status = optional_field(&mut errors, self.status, decision);
        errors.finish()?;

        Ok(OfferUpdate {
            amount,
            message,
            status,
        })
    }
}

/// GET /offers - the caller's own offers
async fn list_my_offers(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidQuery(params): ValidQuery<PaginationParams>,
) -> Result<Json<Paginated<Offer>>, ApiError> {
    let offers = OfferRepo::new(&state.pool)
        .list_mine(auth.id(), params.into())
        .await?;
    Ok(Json(offers))
}

/// GET /projects/{id}/offers - project owner only
async fn list_project_offers(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(project_id): ValidPath<Uuid>,
    ValidQuery(params): ValidQuery<PaginationParams>,
) -> Result<Json<Paginated<Offer>>, ApiError> {
    let offers = OfferRepo::new(&state.pool)
        .list_for_project(auth.id(), project_id, params.into())
        .await?;
    Ok(Json(offers))
}

/// GET /offers/{id} - investor or project owner
async fn get_offer(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<Offer>, ApiError> {
    Ok(Json(OfferRepo::new(&state.pool).find_visible(auth.id(), id).await?))
}

/// POST /offers
async fn create_offer(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidJson(new): ValidJson<CreateOfferRequest>,
) -> Result<(StatusCode, Json<Offer>), ApiError> {
    let offer = OfferRepo::new(&state.pool).create(auth.id(), new).await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

/// PATCH /offers/{id}
async fn update_offer(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(update): ValidJson<UpdateOfferRequest>,
) -> Result<Json<Offer>, ApiError> {
    let offer = OfferRepo::new(&state.pool)
        .update(auth.id(), id, update)
        .await?;
    Ok(Json(offer))
}

/// DELETE /offers/{id} - investor withdraws
async fn delete_offer(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    OfferRepo::new(&state.pool).delete(auth.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/offers", get(list_my_offers).post(create_offer))
        .route(
            "/offers/{id}",
            get(get_offer).patch(update_offer).delete(delete_offer),
        )
        .route("/projects/{id}/offers", get(list_project_offers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_amount_must_be_positive() {
        let errors = CreateOfferRequest {
            project_id: Uuid::new_v4(),
            amount: 0,
            message: None,
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.fields()[0].field, "amount");
    }

    #[test]
    fn status_accepts_decisions_only() {
        let update = UpdateOfferRequest {
            amount: None,
            message: None,
            status: Some("Accepted".into()),
        }
        .validate()
        .unwrap();
        assert_eq!(update.status, Some(OfferStatus::Accepted));

        for bad in ["pending", "maybe"] {
            let errors = UpdateOfferRequest {
                amount: None,
                message: None,
                status: Some(bad.into()),
            }
            .validate()
            .unwrap_err();
            assert_eq!(errors.fields()[0].field, "status");
        }
    }

    #[test]
    fn blank_message_clears() {
        let update = UpdateOfferRequest {
            amount: None,
            message: Some(String::new()),
            status: None,
        }
        .validate()
        .unwrap();
        assert_eq!(update.message, Some(None));
    }
}
