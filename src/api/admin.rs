//! Admin API endpoints
//!
//! Handles HTTP requests for the admin panel:
//! - POST /api/v1/admin/signin - Start a cookie session with the configured credentials
//! - POST /api/v1/admin/logout - End the cookie session
//! - /api/v1/admin/users - Student account management and blocking
//! - /api/v1/admin/reports - Lesson report moderation

use axum::{
    extract::{FromRequest, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::auth::{ProfileRequest, ProfileResponse};
use crate::api::common::{expired_cookie, json_rejection_error, token_cookie, JsonBody};
use crate::api::middleware::{cookie_value, ApiError, AppState, ADMIN_COOKIE};
use crate::models::{Report, User, UserType};
use crate::services::token::ADMIN_TOKEN_LIFETIME;

/// Admin sign-in credentials, from a JSON or urlencoded form body
#[derive(Debug, Default, Deserialize)]
pub struct AdminCredentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl<S> FromRequest<S> for AdminCredentials
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(credentials) = Form::<AdminCredentials>::from_request(req, state)
                .await
                .map_err(|e| ApiError::validation_error(e.body_text()))?;
            Ok(credentials)
        } else {
            let Json(credentials) = Json::<AdminCredentials>::from_request(req, state)
                .await
                .map_err(json_rejection_error)?;
            Ok(credentials)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdminSessionResponse {
    pub message: String,
    #[serde(rename = "isAuth", skip_serializing_if = "Option::is_none")]
    pub is_auth: Option<bool>,
}

/// Request body for `PUT /admin/users`
#[derive(Debug, Deserialize)]
pub struct BlockRequest {
    #[serde(rename = "userId")]
    pub user_id: Option<i64>,
    pub is_blocked: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Routes open to everyone: the admin session itself
pub fn session_router() -> Router<AppState> {
    Router::new()
        .route("/admin/signin", post(signin))
        .route("/admin/logout", post(logout))
}

/// Build admin routes (requires the admin guard)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_students).put(set_block_status))
        .route(
            "/admin/users/{id}",
            get(get_student).put(update_student).delete(delete_student),
        )
        .route("/admin/reports", get(list_reports))
        .route("/admin/reports/{id}", delete(delete_report))
}

/// POST /api/v1/admin/signin
async fn signin(
    State(state): State<AppState>,
    credentials: AdminCredentials,
) -> Result<impl IntoResponse, ApiError> {
    let matches = match (&state.auth.admin_email, &state.auth.admin_password) {
        (Some(email), Some(password)) => {
            credentials.email == *email && credentials.password == *password
        }
        _ => false,
    };
    if !matches {
        tracing::warn!(email = %credentials.email, "Rejected admin sign-in");
        return Err(ApiError::validation_error("Invalid email or password"));
    }

    let token = state
        .token_service
        .issue_admin()
        .map_err(|e| ApiError::internal_error(format!("Failed to issue admin token: {}", e)))?;
    let cookie = token_cookie(
        ADMIN_COOKIE,
        &token,
        ADMIN_TOKEN_LIFETIME,
        state.auth.secure_cookies,
    );
    tracing::info!("Admin signed in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(AdminSessionResponse {
            message: "Admin login successful".to_string(),
            is_auth: Some(true),
        }),
    ))
}

/// POST /api/v1/admin/logout
async fn logout(headers: HeaderMap) -> impl IntoResponse {
    if cookie_value(&headers, ADMIN_COOKIE).is_none() {
        tracing::info!("Admin logout without a session cookie");
    }

    (
        [(header::SET_COOKIE, expired_cookie(ADMIN_COOKIE))],
        Json(AdminSessionResponse {
            message: "Admin logout successful".to_string(),
            is_auth: None,
        }),
    )
}

// ============================================================================
// Student accounts
// ============================================================================

async fn find_student(state: &AppState, id: i64) -> Result<User, ApiError> {
    state
        .user_service
        .get_of_type(id, UserType::Student)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User not found: {}", id)))
}

/// GET /api/v1/admin/users
async fn list_students(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProfileResponse>>, ApiError> {
    let users = state.user_service.list_by_type(UserType::Student).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// GET /api/v1/admin/users/{id}
async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProfileResponse>, ApiError> {
    Ok(Json(find_student(&state, id).await?.into()))
}

/// PUT /api/v1/admin/users/{id}
async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<ProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    find_student(&state, id).await?;
    let (profile, is_blocked) = body.into_update();
    let user = state
        .user_service
        .update_account(id, profile, is_blocked)
        .await?;
    Ok(Json(user.into()))
}

/// DELETE /api/v1/admin/users/{id}
async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    find_student(&state, id).await?;
    state.user_service.delete(id).await?;
    tracing::info!(user_id = id, "Deleted student account");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/admin/users - Block or unblock any account
async fn set_block_status(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<BlockRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let (Some(user_id), Some(is_blocked)) = (body.user_id, body.is_blocked) else {
        return Err(ApiError::validation_error("userId and is_blocked are required"));
    };
    state.user_service.set_blocked(user_id, is_blocked).await?;
    Ok(Json(StatusResponse {
        status: "User block status updated".to_string(),
    }))
}

// ============================================================================
// Reports
// ============================================================================

/// GET /api/v1/admin/reports
async fn list_reports(State(state): State<AppState>) -> Result<Json<Vec<Report>>, ApiError> {
    Ok(Json(state.feedback_service.list_reports().await?))
}

/// DELETE /api/v1/admin/reports/{id}
async fn delete_report(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.feedback_service.delete_report(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
