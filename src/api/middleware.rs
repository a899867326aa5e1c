//! API middleware
//!
//! Contains middleware for:
//! - Authentication (JWT access token from the `Authorization` header or the
//!   `access_token` cookie)
//! - Authorization (admin session cookie or an admin account)

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{AuthConfig, Config};
use crate::db::repositories::{
    SqlxCategoryRepository, SqlxCourseRepository, SqlxFeedbackRepository, SqlxLessonRepository,
    SqlxOrderRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{Actor, User};
use crate::services::token::{Role, TokenType, ADMIN_SUBJECT};
use crate::services::{
    CategoryService, CourseService, EmailService, FeedbackService, LessonService,
    LoginRateLimiter, OrderService, ResetTokenGenerator, TokenService, UserService,
};

/// Cookie carrying a user access token
pub const ACCESS_COOKIE: &str = "access_token";

/// Cookie carrying the admin session token
pub const ADMIN_COOKIE: &str = "adminToken";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub category_service: Arc<CategoryService>,
    pub course_service: Arc<CourseService>,
    pub lesson_service: Arc<LessonService>,
    pub feedback_service: Arc<FeedbackService>,
    pub order_service: Arc<OrderService>,
    pub token_service: Arc<TokenService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    /// Wire repositories and services over `pool`
    pub fn new(pool: DynDatabasePool, config: &Config) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let course_repo = SqlxCourseRepository::boxed(pool.clone());
        let lesson_repo = SqlxLessonRepository::boxed(pool.clone());
        let feedback_repo = SqlxFeedbackRepository::boxed(pool.clone());

        let token_service = Arc::new(TokenService::new(&config.auth));
        let user_service = Arc::new(UserService::new(
            user_repo.clone(),
            token_service.clone(),
            ResetTokenGenerator::new(&config.auth.secret_key, config.auth.password_reset_timeout),
            Arc::new(EmailService::new(config.mail.clone())),
        ));
        let lesson_service = Arc::new(LessonService::new(
            lesson_repo.clone(),
            course_repo.clone(),
            feedback_repo.clone(),
        ));
        let course_service = Arc::new(CourseService::new(
            course_repo.clone(),
            user_repo.clone(),
            lesson_service.clone(),
        ));

        Self {
            category_service: Arc::new(CategoryService::new(SqlxCategoryRepository::boxed(pool.clone()))),
            feedback_service: Arc::new(FeedbackService::new(feedback_repo, lesson_repo)),
            order_service: Arc::new(OrderService::new(
                SqlxOrderRepository::boxed(pool.clone()),
                user_repo,
                course_repo,
            )),
            pool,
            user_service,
            course_service,
            lesson_service,
            token_service,
            rate_limiter: Arc::new(LoginRateLimiter::new()),
            auth: Arc::new(config.auth.clone()),
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Authenticated user, if any
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" | "USER_BLOCKED" => StatusCode::FORBIDDEN,
            "NOT_FOUND" | "INVALID_CREDENTIALS" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("{}", self.error.message);
        }

        (status, Json(self)).into_response()
    }
}

/// Value of the named cookie
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix(&prefix))
        .filter(|token| !token.is_empty())
        .map(String::from)
}

/// Extract the access token: bearer header first, then the cookie
fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }
    cookie_value(headers, ACCESS_COOKIE)
}

/// Whether the request carries a valid admin session cookie
fn has_admin_session(state: &AppState, headers: &HeaderMap) -> bool {
    cookie_value(headers, ADMIN_COOKIE)
        .and_then(|token| state.token_service.verify(&token, TokenType::Access).ok())
        .is_some_and(|claims| claims.role == Role::Admin && claims.sub == ADMIN_SUBJECT)
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_access_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided."))?;

    let user = state
        .user_service
        .authenticate(&token)
        .await
        .map_err(ApiError::from)?;

    request.extensions_mut().insert(Actor::User(user.clone()));
    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Optional authentication middleware
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_access_token(request.headers()) {
        if let Ok(user) = state.user_service.authenticate(&token).await {
            request.extensions_mut().insert(Actor::User(user.clone()));
            request.extensions_mut().insert(AuthenticatedUser(user));
        }
    }
    next.run(request).await
}

/// Admin authorization middleware
///
/// Accepts the admin session cookie, or an access token of an admin account.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if has_admin_session(&state, request.headers()) {
        request.extensions_mut().insert(Actor::Admin);
        return Ok(next.run(request).await);
    }

    let token = extract_access_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided."))?;
    let user = state
        .user_service
        .authenticate(&token)
        .await
        .map_err(ApiError::from)?;
    if !user.is_admin {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    request.extensions_mut().insert(Actor::User(user.clone()));
    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided."))
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts.extensions.get::<AuthenticatedUser>().map(|u| u.0.clone()),
        ))
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided."))
    }
}

// ============================================================================
// Tests
// ============================================================================
