//! Course API endpoints
//!
//! - /api/v1/courses, /api/v1/user/courses, /api/v1/admin/courses - course CRUD
//! - GET /api/v1/courses/enrolled_courses - the caller's enrolled courses
//! - /api/v1/tutor/courses - the caller's own courses
//! - GET /api/v1/user/details/enrolled/{course_id}/check - enrollment check

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::JsonBody;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::models::{Actor, CourseDetail, Difficulty, Price};
use crate::services::CourseDraft;

/// Request for creating/updating a course
#[derive(Debug, Deserialize)]
pub struct CourseRequest {
    #[serde(default)]
    pub title: String,
    pub tutor: Option<i64>,
    #[serde(default)]
    pub about: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub category: String,
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub thumbnail: String,
    pub price: Option<Price>,
    pub is_visible: Option<bool>,
}

impl From<CourseRequest> for CourseDraft {
    fn from(req: CourseRequest) -> Self {
        CourseDraft {
            title: req.title,
            tutor: req.tutor,
            about: req.about,
            tagline: req.tagline,
            category: req.category,
            difficulty: req.difficulty,
            thumbnail: req.thumbnail,
            price: req.price,
            is_visible: req.is_visible,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnrolledResponse {
    pub enrolled: bool,
}

/// Public list/retrieve routes under `prefix`
pub fn read_router(prefix: &str) -> Router<AppState> {
    Router::new()
        .route(prefix, get(list_courses))
        .route(&format!("{}/{{id}}", prefix), get(get_course))
}

/// Write routes under `prefix`; the caller layers the guard
pub fn write_router(prefix: &str) -> Router<AppState> {
    Router::new()
        .route(prefix, post(create_course))
        .route(
            &format!("{}/{{id}}", prefix),
            put(update_course).delete(delete_course),
        )
}

/// Routes that work with or without a signed-in caller
pub fn optional_auth_router() -> Router<AppState> {
    Router::new().route(
        "/user/details/enrolled/{course_id}/check",
        get(check_enrollment),
    )
}

/// Authenticated routes scoped to the caller
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/courses/enrolled_courses", get(enrolled_courses))
        .route("/tutor/courses", get(list_own_courses).post(create_own_course))
        .route(
            "/tutor/courses/{id}",
            get(get_own_course).put(update_course).delete(delete_course),
        )
}

async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<CourseDetail>>, ApiError> {
    Ok(Json(state.course_service.list(None).await?))
}

async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CourseDetail>, ApiError> {
    Ok(Json(state.course_service.get(id).await?))
}

async fn create_course(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<CourseRequest>,
) -> Result<(StatusCode, Json<CourseDetail>), ApiError> {
    let course = state.course_service.create(&actor, body.into()).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn update_course(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<CourseRequest>,
) -> Result<Json<CourseDetail>, ApiError> {
    Ok(Json(state.course_service.update(&actor, id, body.into()).await?))
}

async fn delete_course(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.course_service.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/courses/enrolled_courses
async fn enrolled_courses(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<CourseDetail>>, ApiError> {
    Ok(Json(state.course_service.list_enrolled(&user.0).await?))
}

/// GET /api/v1/tutor/courses
async fn list_own_courses(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<CourseDetail>>, ApiError> {
    Ok(Json(state.course_service.list(Some(user.0.id)).await?))
}

/// GET /api/v1/tutor/courses/{id} - 404 for courses of other tutors
async fn get_own_course(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<CourseDetail>, ApiError> {
    let course = state.course_service.get(id).await?;
    if course.course.tutor_id != user.0.id {
        return Err(ApiError::not_found(format!("Course not found: {}", id)));
    }
    Ok(Json(course))
}

/// POST /api/v1/tutor/courses - the caller becomes the tutor
async fn create_own_course(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonBody(body): JsonBody<CourseRequest>,
) -> Result<(StatusCode, Json<CourseDetail>), ApiError> {
    let mut draft = CourseDraft::from(body);
    draft.tutor = Some(user.0.id);
    let course = state
        .course_service
        .create(&Actor::from(user.0), draft)
        .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// GET /api/v1/user/details/enrolled/{course_id}/check
async fn check_enrollment(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(course_id): Path<i64>,
) -> Result<Json<EnrolledResponse>, ApiError> {
    let enrolled = state
        .course_service
        .is_enrolled(user.0.as_ref(), course_id)
        .await?;
    Ok(Json(EnrolledResponse { enrolled }))
}
