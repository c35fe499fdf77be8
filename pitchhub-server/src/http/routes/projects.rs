//! Project endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::optional_field;
use crate::db::repos::{NewProject, Project, ProjectFilter, ProjectRepo, ProjectUpdate};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidJson, ValidPath, ValidQuery};
use crate::http::server::AppState;
use crate::models::{text, Amount, ListParams, Paginated, Validate, ValidationErrors};

const TITLE_MIN: usize = 3;
const TITLE_MAX: usize = 150;
const DESCRIPTION_MIN: usize = 10;
const DESCRIPTION_MAX: usize = 5000;

/// `GET /projects` filters
#[derive(Debug, Default, Deserialize)]
pub struct ProjectQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub q: Option<String>,
    pub sector_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
}

impl ProjectQuery {
    fn list_params(&self) -> ListParams {
        ListParams {
            page: self.page,
            per_page: self.per_page,
            q: self.q.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub sector_id: Uuid,
    pub title: String,
    pub description: String,
    pub funding_goal: i64,
}

impl Validate for CreateProjectRequest {
    type Valid = NewProject;

    fn validate(self) -> Result<NewProject, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let title = errors.check(text::required("title", &self.title, TITLE_MIN, TITLE_MAX));
        let description = errors.check(text::required(
            "description",
            &self.description,
            DESCRIPTION_MIN,
            DESCRIPTION_MAX,
        ));
        let funding_goal = errors.check(Amount::new("funding_goal", self.funding_goal));

        match (title, description, funding_goal) {
            (Some(title), Some(description), Some(funding_goal)) => Ok(NewProject {
                sector_id: self.sector_id,
                title,
                description,
                funding_goal,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub sector_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub funding_goal: Option<i64>,
}

impl Validate for UpdateProjectRequest {
    type Valid = ProjectUpdate;

    fn validate(self) -> Result<ProjectUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let title = optional_field(&mut errors, self.title, |s| {
            text::required("title", &s, TITLE_MIN, TITLE_MAX)
        });
        let description = optional_field(&mut errors, self.description, |s| {
            text::required("description", &s, DESCRIPTION_MIN, DESCRIPTION_MAX)
        });
        let funding_goal = optional_field(&mut errors, self.funding_goal, |v| {
            Amount::new("funding_goal", v)
        });
        errors.finish()?;

        Ok(ProjectUpdate {
            sector_id: self.sector_id,
            title,
            description,
            funding_goal,
        })
    }
}

/// GET /projects - `?owner_id=&sector_id=&q=`, all optional and combined
async fn list_projects(
    State(state): State<Arc<AppState>>,
    ValidQuery(query): ValidQuery<ProjectQuery>,
) -> Result<Json<Paginated<Project>>, ApiError> {
    let params = query.list_params();
    let search = params.search();
    let filter = ProjectFilter {
        owner_id: query.owner_id,
        sector_id: query.sector_id,
        search: search.as_deref(),
    };
    let projects = ProjectRepo::new(&state.pool)
        .list(filter, params.pagination())
        .await?;
    Ok(Json(projects))
}

/// GET /projects/{id}
async fn get_project(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(ProjectRepo::new(&state.pool).find(id).await?))
}

/// POST /projects
async fn create_project(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidJson(new): ValidJson<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let project = ProjectRepo::new(&state.pool).create(auth.id(), new).await?;
    tracing::info!(project_id = %project.id, owner_id = %project.owner_id, "Project created");
    Ok((StatusCode::CREATED, Json(project)))
}

/// PATCH /projects/{id} - owner only
async fn update_project(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(update): ValidJson<UpdateProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    let project = ProjectRepo::new(&state.pool)
        .update(auth.id(), id, update)
        .await?;
    Ok(Json(project))
}

/// DELETE /projects/{id} - owner only; the project's files go with it
async fn delete_project(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    let id = ProjectRepo::new(&state.pool).delete(auth.id(), id).await?;
    state.storage.discard(&[], &[id]).await;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{id}",
            get(get_project).patch(update_project).delete(delete_project),
        )
}
