//! Tutor API endpoints
//!
//! Teacher accounts under `/api/v1/tutors`, `/api/v1/admin/tutors` and
//! `/api/v1/tutor/details/top`. Reads are public, writes need the admin guard.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::common::JsonBody;
use crate::api::middleware::{ApiError, AppState};
use crate::models::{ProfileUpdate, User, UserType};
use crate::services::TutorInput;

/// Public tutor fields; the password is write-only
#[derive(Debug, Serialize)]
pub struct TutorResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub address: Option<String>,
    pub is_blocked: bool,
    pub user_type: Option<UserType>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for TutorResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            age: user.age,
            address: user.address,
            is_blocked: user.is_blocked,
            user_type: user.user_type,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Request for creating/updating a tutor. On update an empty password keeps
/// the current one.
#[derive(Debug, Deserialize)]
pub struct TutorRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub address: Option<String>,
    #[serde(default)]
    pub is_blocked: bool,
}

/// Public list/retrieve routes under `prefix`
pub fn read_router(prefix: &str) -> Router<AppState> {
    Router::new()
        .route(prefix, get(list_tutors))
        .route(&format!("{}/{{id}}", prefix), get(get_tutor))
}

/// Write routes under `prefix`; the caller layers the admin guard
pub fn write_router(prefix: &str) -> Router<AppState> {
    Router::new()
        .route(prefix, post(create_tutor))
        .route(
            &format!("{}/{{id}}", prefix),
            put(update_tutor).delete(delete_tutor),
        )
}

async fn find_tutor(state: &AppState, id: i64) -> Result<User, ApiError> {
    state
        .user_service
        .get_of_type(id, UserType::Teacher)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Tutor not found: {}", id)))
}

async fn list_tutors(State(state): State<AppState>) -> Result<Json<Vec<TutorResponse>>, ApiError> {
    let tutors = state.user_service.list_by_type(UserType::Teacher).await?;
    Ok(Json(tutors.into_iter().map(Into::into).collect()))
}

async fn get_tutor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TutorResponse>, ApiError> {
    Ok(Json(find_tutor(&state, id).await?.into()))
}

async fn create_tutor(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<TutorRequest>,
) -> Result<(StatusCode, Json<TutorResponse>), ApiError> {
    let tutor = state
        .user_service
        .create_tutor(TutorInput {
            name: body.name,
            email: body.email,
            password: body.password,
            phone: body.phone,
            age: body.age,
            address: body.address,
            is_blocked: body.is_blocked,
        })
        .await?;
    tracing::info!(user_id = tutor.id, "Created tutor {}", tutor.email);
    Ok((StatusCode::CREATED, Json(tutor.into())))
}

async fn update_tutor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<TutorRequest>,
) -> Result<Json<TutorResponse>, ApiError> {
    let existing = find_tutor(&state, id).await?;

    let profile = ProfileUpdate {
        email: body.email,
        name: body.name,
        phone: body.phone,
        age: body.age,
        address: body.address,
        ..ProfileUpdate::from_user(&existing)
    };
    let tutor = state
        .user_service
        .update_account(id, profile, Some(body.is_blocked))
        .await?;
    if !body.password.is_empty() {
        state
            .user_service
            .change_password(id, &body.password, &body.password)
            .await?;
    }
    Ok(Json(tutor.into()))
}

async fn delete_tutor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    find_tutor(&state, id).await?;
    state.user_service.delete(id).await?;
    tracing::info!(user_id = id, "Deleted tutor account");
    Ok(StatusCode::NO_CONTENT)
}
