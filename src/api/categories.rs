//! Category API endpoints
//!
//! The same handlers serve `/api/v1/categories` (writes by any signed-in user)
//! and `/api/v1/admin/category` (writes behind the admin guard).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::JsonBody;
use crate::api::middleware::{ApiError, AppState};
use crate::models::{Category, CategoryInput};

/// Request for creating/updating a category
#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl From<CategoryRequest> for CategoryInput {
    fn from(req: CategoryRequest) -> Self {
        CategoryInput::new(req.title, req.description)
    }
}

/// Read-only routes under `prefix`
pub fn read_router(prefix: &str) -> Router<AppState> {
    Router::new()
        .route(prefix, get(list_categories))
        .route(&format!("{}/{{id}}", prefix), get(get_category))
}

/// Write routes under `prefix`; the caller layers the guard
pub fn write_router(prefix: &str) -> Router<AppState> {
    Router::new()
        .route(prefix, post(create_category))
        .route(
            &format!("{}/{{id}}", prefix),
            put(update_category).delete(delete_category),
        )
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.category_service.list().await?))
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.get(id).await?))
}

async fn create_category(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.category_service.create(body.into()).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<CategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.update(id, body.into()).await?))
}

async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.category_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
