//! Lesson API endpoints
//!
//! - /api/v1/lessons, /api/v1/tutor/lessons, /api/v1/user/lessons - lesson CRUD
//! - POST /api/v1/lessons/{id}/like - Toggle the caller's like
//! - GET|POST /api/v1/lessons/{id}/comments - Lesson comments
//! - POST /api/v1/lessons/{id}/reports - Report a lesson
//! - DELETE /api/v1/comments/{id} - Remove a comment

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::JsonBody;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Actor, Comment, LessonDetail, Report};
use crate::services::LessonDraft;

#[derive(Debug, Deserialize)]
pub struct LessonListQuery {
    pub course: Option<i64>,
}

/// Request for creating/updating a lesson
#[derive(Debug, Deserialize)]
pub struct LessonRequest {
    #[serde(default)]
    pub title: String,
    pub course: Option<i64>,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "videoURL", default)]
    pub video_url: String,
    #[serde(default)]
    pub duration: i32,
    pub order: Option<i32>,
}

impl From<LessonRequest> for LessonDraft {
    fn from(req: LessonRequest) -> Self {
        LessonDraft {
            title: req.title,
            course: req.course,
            description: req.description,
            video_url: req.video_url,
            duration: req.duration,
            order: req.order,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub likes: usize,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub reason: String,
}

/// Public list/retrieve routes under `prefix`
pub fn read_router(prefix: &str) -> Router<AppState> {
    Router::new()
        .route(prefix, get(list_lessons))
        .route(&format!("{}/{{id}}", prefix), get(get_lesson))
}

/// Write routes under `prefix`; the caller layers the guard
pub fn write_router(prefix: &str) -> Router<AppState> {
    Router::new()
        .route(prefix, post(create_lesson))
        .route(
            &format!("{}/{{id}}", prefix),
            put(update_lesson).delete(delete_lesson),
        )
}

/// Public feedback routes
pub fn public_router() -> Router<AppState> {
    Router::new().route("/lessons/{id}/comments", get(list_comments))
}

/// Feedback routes that need a signed-in user
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/lessons/{id}/like", post(toggle_like))
        .route("/lessons/{id}/comments", post(add_comment))
        .route("/lessons/{id}/reports", post(add_report))
        .route("/comments/{id}", delete(delete_comment))
}

async fn list_lessons(
    State(state): State<AppState>,
    Query(query): Query<LessonListQuery>,
) -> Result<Json<Vec<LessonDetail>>, ApiError> {
    Ok(Json(state.lesson_service.list(query.course).await?))
}

async fn get_lesson(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<LessonDetail>, ApiError> {
    Ok(Json(state.lesson_service.get(id).await?))
}

async fn create_lesson(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<LessonRequest>,
) -> Result<(StatusCode, Json<LessonDetail>), ApiError> {
    let lesson = state.lesson_service.create(&actor, body.into()).await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

async fn update_lesson(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<LessonRequest>,
) -> Result<Json<LessonDetail>, ApiError> {
    Ok(Json(state.lesson_service.update(&actor, id, body.into()).await?))
}

async fn delete_lesson(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.lesson_service.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/lessons/{id}/like
async fn toggle_like(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<LikeResponse>, ApiError> {
    let like = state.lesson_service.toggle_like(&user.0, id).await?;
    Ok(Json(LikeResponse {
        liked: like.liked,
        likes: like.likes,
    }))
}

/// GET /api/v1/lessons/{id}/comments
async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    Ok(Json(state.feedback_service.list_comments(id).await?))
}

/// POST /api/v1/lessons/{id}/comments
async fn add_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = state
        .feedback_service
        .add_comment(&user.0, id, &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// POST /api/v1/lessons/{id}/reports
async fn add_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<ReportRequest>,
) -> Result<(StatusCode, Json<Report>), ApiError> {
    let report = state
        .feedback_service
        .add_report(&user.0, id, &body.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// DELETE /api/v1/comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.feedback_service.delete_comment(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
