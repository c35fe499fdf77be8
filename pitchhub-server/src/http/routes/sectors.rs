//! Sector endpoints; reads are public, mutations need the admin role

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::optional_field;
use crate::db::repos::{NewSector, Sector, SectorRepo, SectorUpdate, SectorWithCount};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidJson, ValidPath, ValidQuery};
use crate::http::server::AppState;
use crate::models::{text, ListParams, Paginated, Validate, ValidationErrors};

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 500;

#[derive(Debug, Deserialize)]
pub struct CreateSectorRequest {
    pub name: String,
    pub description: Option<String>,
}

impl Validate for CreateSectorRequest {
    type Valid = NewSector;

    fn validate(self) -> Result<NewSector, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = errors.check(text::required("name", &self.name, NAME_MIN, NAME_MAX));
        let description = errors.check(text::optional(
            "description",
            self.description.as_deref(),
            DESCRIPTION_MAX,
        ));

        match (name, description) {
            (Some(name), Some(description)) => Ok(NewSector { name, description }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateSectorRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Validate for UpdateSectorRequest {
    type Valid = SectorUpdate;

    fn validate(self) -> Result<SectorUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = optional_field(&mut errors, self.name, |s| {
            text::required("name", &s, NAME_MIN, NAME_MAX)
        });
        let description = optional_field(&mut errors, self.description, |s| {
            text::optional("description", Some(&s), DESCRIPTION_MAX)
        });
        errors.finish()?;

        Ok(SectorUpdate { name, description })
    }
}

/// GET /sectors - with project counts
async fn list_sectors(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<ListParams>,
) -> Result<Json<Paginated<SectorWithCount>>, ApiError> {
    let search = params.search();
    let sectors = SectorRepo::new(&state.pool)
        .list(params.pagination(), search.as_deref())
        .await?;
    Ok(Json(sectors))
}

/// GET /sectors/{id}
async fn get_sector(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<Sector>, ApiError> {
    Ok(Json(SectorRepo::new(&state.pool).find(id).await?))
}

/// POST /sectors
async fn create_sector(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidJson(new): ValidJson<CreateSectorRequest>,
) -> Result<(StatusCode, Json<Sector>), ApiError> {
    auth.require_admin()?;
    let sector = SectorRepo::new(&state.pool).create(new).await?;
    tracing::info!(sector_id = %sector.id, name = %sector.name, "Sector created");
    Ok((StatusCode::CREATED, Json(sector)))
}

/// PATCH /sectors/{id}
async fn update_sector(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(update): ValidJson<UpdateSectorRequest>,
) -> Result<Json<Sector>, ApiError> {
    auth.require_admin()?;
    Ok(Json(SectorRepo::new(&state.pool).update(id, update).await?))
}

/// DELETE /sectors/{id} - 409 while projects reference it
async fn delete_sector(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.require_admin()?;
    let sector = SectorRepo::new(&state.pool).delete(id).await?;
    tracing::info!(sector_id = %sector.id, "Sector deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sectors", get(list_sectors).post(create_sector))
        .route(
            "/sectors/{id}",
            get(get_sector).patch(update_sector).delete(delete_sector),
        )
}
