//! Direct messaging between two users

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repos::{Discussion, DiscussionRepo, Message, MessageRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidJson, ValidPath, ValidQuery};
use crate::http::server::AppState;
use crate::models::{text, Paginated, PaginationParams, Validate, ValidationErrors};

const MESSAGE_MAX: usize = 5000;

/// Discussion as seen by one participant
#[derive(Debug, Serialize)]
pub struct DiscussionResponse {
    #[serde(flatten)]
    pub discussion: Discussion,
    /// The other participant
    pub participant_id: Uuid,
}

impl DiscussionResponse {
    fn for_caller(discussion: Discussion, caller: Uuid) -> Self {
        let participant_id = discussion.other(caller);
        Self {
            discussion,
            participant_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenDiscussionRequest {
    pub participant_id: Uuid,
}

impl Validate for OpenDiscussionRequest {
    type Valid = Uuid;

    fn validate(self) -> Result<Uuid, ValidationErrors> {
        Ok(self.participant_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub content: String,
}

impl Validate for MessageRequest {
    type Valid = String;

    fn validate(self) -> Result<String, ValidationErrors> {
        Ok(text::required("content", &self.content, 1, MESSAGE_MAX)?)
    }
}

#[derive(Debug, Serialize)]
pub struct ReadResponse {
    pub marked: u64,
}

/// GET /discussions - most recently active first
async fn list_discussions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidQuery(params): ValidQuery<PaginationParams>,
) -> Result<Json<Paginated<DiscussionResponse>>, ApiError> {
    let caller = auth.id();
    let discussions = DiscussionRepo::new(&state.pool)
        .list_mine(caller, params.into())
        .await?;
    Ok(Json(
        discussions.map(|d| DiscussionResponse::for_caller(d, caller)),
    ))
}

/// POST /discussions - returns the existing discussion if the pair has one
async fn open_discussion(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidJson(participant_id): ValidJson<OpenDiscussionRequest>,
) -> Result<(StatusCode, Json<DiscussionResponse>), ApiError> {
    if participant_id == auth.id() {
        return Err(ApiError::bad_request("cannot open a discussion with yourself"));
    }
    let discussion = DiscussionRepo::new(&state.pool)
        .open(auth.id(), participant_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(DiscussionResponse::for_caller(discussion, auth.id())),
    ))
}

/// GET /discussions/{id}
async fn get_discussion(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<DiscussionResponse>, ApiError> {
    let discussion = DiscussionRepo::new(&state.pool)
        .find_for(auth.id(), id)
        .await?;
    Ok(Json(DiscussionResponse::for_caller(discussion, auth.id())))
}

/// GET /discussions/{id}/messages - oldest first
async fn list_messages(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidQuery(params): ValidQuery<PaginationParams>,
) -> Result<Json<Paginated<Message>>, ApiError> {
    let messages = MessageRepo::new(&state.pool)
        .list(auth.id(), id, params.into())
        .await?;
    Ok(Json(messages))
}

/// POST /discussions/{id}/messages
async fn send_message(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(content): ValidJson<MessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let message = MessageRepo::new(&state.pool)
        .send(auth.id(), id, &content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /discussions/{id}/read - mark the other side's messages read
async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<ReadResponse>, ApiError> {
    let marked = MessageRepo::new(&state.pool).mark_read(auth.id(), id).await?;
    Ok(Json(ReadResponse { marked }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/discussions", get(list_discussions).post(open_discussion))
        .route("/discussions/{id}", get(get_discussion))
        .route(
            "/discussions/{id}/messages",
            get(list_messages).post(send_message),
        )
        .route("/discussions/{id}/read", post(mark_read))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn response_names_the_other_participant() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let discussion = Discussion {
            id: Uuid::new_v4(),
            user_a: a,
            user_b: b,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(DiscussionResponse::for_caller(discussion, b)).unwrap();
        assert_eq!(json["participant_id"], a.to_string());
        assert_eq!(json["user_b"], b.to_string());
    }

    #[test]
    fn message_must_have_content() {
        let errors = MessageRequest {
            content: "\n\t".into(),
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.fields()[0].field, "content");
    }
}
