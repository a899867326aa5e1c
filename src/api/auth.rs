//! Authentication API endpoints
//!
//! Handles HTTP requests for user authentication:
//! - POST /api/v1/auth/register - Registration, returns a token pair
//! - POST /api/v1/auth/signin - Sign-in (also `/auth/login`)
//! - POST /api/v1/auth/token/refresh - Exchange a refresh token
//! - GET|PUT /api/v1/auth/profile - Own profile (also `/user/details`)
//! - POST /api/v1/auth/change-password - Change own password
//! - POST /api/v1/auth/send-password-reset-email - Mail a reset link
//! - POST /api/v1/auth/password-reset/{uid}/{token} - Reset with link token

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{client_ip, token_cookie, JsonBody, MessageResponse};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, ACCESS_COOKIE};
use crate::models::{ProfileUpdate, User, UserType};
use crate::services::token::TokenPair;
use crate::services::user::{LoginInput, RegisterInput, UserServiceError};

/// Request body for user registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password2: String,
    pub phone: Option<String>,
    pub user_type: Option<UserType>,
}

/// Request body for user sign-in
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// Request body for password change and reset
#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetEmailRequest {
    #[serde(default)]
    pub email: String,
}

/// Response for registration
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub token: TokenPair,
    pub msg: String,
}

/// Response for sign-in
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: TokenPair,
    pub msg: String,
    pub user: LoginUser,
}

/// User summary included in the sign-in response
#[derive(Debug, Serialize)]
pub struct LoginUser {
    pub name: String,
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub email: String,
    pub user_type: Option<UserType>,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
}

impl From<&User> for LoginUser {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            user_id: user.id,
            email: user.email.clone(),
            user_type: user.user_type,
            is_admin: user.is_admin,
        }
    }
}

/// Profile fields shown to the account owner and to admins
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub about: Option<String>,
    pub address: Option<String>,
    pub age: Option<i32>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub is_blocked: bool,
    pub is_admin: bool,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            about: user.about,
            address: user.address,
            age: user.age,
            last_name: user.last_name,
            phone: user.phone,
            is_blocked: user.is_blocked,
            is_admin: user.is_admin,
        }
    }
}

/// Request body for a profile update. `is_blocked` is only honoured on the
/// admin endpoints.
#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub about: Option<String>,
    pub address: Option<String>,
    pub age: Option<i32>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub is_blocked: Option<bool>,
}

impl ProfileRequest {
    pub fn into_update(self) -> (ProfileUpdate, Option<bool>) {
        let update = ProfileUpdate {
            email: self.email,
            name: self.name,
            about: self.about,
            address: self.address,
            age: self.age,
            last_name: self.last_name,
            phone: self.phone,
        };
        (update, self.is_blocked)
    }
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/signin", post(login))
        .route("/login", post(login))
        .route("/token/refresh", post(refresh_token))
        .route("/send-password-reset-email", post(send_reset_email))
        .route("/password-reset/{uid}/{token}", post(reset_password))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/change-password", post(change_password))
}

/// POST /api/v1/auth/register - User registration
async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = RegisterInput {
        email: body.email,
        name: body.name,
        password: body.password,
        password2: body.password2,
        phone: body.phone,
        user_type: body.user_type,
    };
    let (_user, token) = state.user_service.register(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            token,
            msg: "Registration Successful".to_string(),
        }),
    ))
}

/// POST /api/v1/auth/signin - User sign-in
///
/// Rate limited per client address and per account email.
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(ip) = client_ip(&headers) {
        if state.rate_limiter.check_ip(ip).await {
            tracing::warn!(%ip, "Sign-in rate limit exceeded");
            return Err(ApiError::with_details(
                "RATE_LIMIT",
                "Too many requests, please try again later",
                serde_json::json!({"retry_after": 60}),
            ));
        }
    }

    if state.rate_limiter.is_email_limited(&body.email).await {
        tracing::warn!(email = %body.email, "Too many failed sign-ins");
        return Err(ApiError::with_details(
            "RATE_LIMIT",
            "Too many failed sign-in attempts, please try again in 15 minutes",
            serde_json::json!({"retry_after": 900}),
        ));
    }

    let result = state
        .user_service
        .login(LoginInput::new(body.email.clone(), body.password))
        .await;
    let (user, token) = match result {
        Ok(ok) => ok,
        Err(e) => {
            if matches!(e, UserServiceError::InvalidCredentials) {
                state.rate_limiter.record_failure(&body.email).await;
            }
            return Err(e.into());
        }
    };
    state.rate_limiter.clear_failures(&body.email).await;

    let cookie = token_cookie(
        ACCESS_COOKIE,
        &token.access,
        state.auth.access_token_lifetime,
        state.auth.secure_cookies,
    );

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            user: LoginUser::from(&user),
            token,
            msg: "Login Success".to_string(),
        }),
    ))
}

/// POST /api/v1/auth/token/refresh - New access token from a refresh token
async fn refresh_token(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let access = state.user_service.refresh(&body.refresh)?;
    Ok(Json(RefreshResponse { access }))
}

/// GET /api/v1/auth/profile - Current user's profile
pub async fn get_profile(user: AuthenticatedUser) -> Json<ProfileResponse> {
    Json(user.0.into())
}

/// PUT /api/v1/auth/profile - Update the current user's profile
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonBody(body): JsonBody<ProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let (profile, _) = body.into_update();
    let updated = state.user_service.update_profile(user.0.id, profile).await?;
    Ok(Json(updated.into()))
}

/// POST /api/v1/auth/change-password
async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonBody(body): JsonBody<PasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .user_service
        .change_password(user.0.id, &body.password, &body.password2)
        .await?;
    Ok(Json(MessageResponse::new("Password Changed Successfully")))
}

/// POST /api/v1/auth/send-password-reset-email
async fn send_reset_email(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ResetEmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.send_password_reset(&body.email).await?;
    Ok(Json(MessageResponse::new(
        "Password Reset link send. Please check your Email",
    )))
}

/// POST /api/v1/auth/password-reset/{uid}/{token}
async fn reset_password(
    State(state): State<AppState>,
    Path((uid, token)): Path<(String, String)>,
    JsonBody(body): JsonBody<PasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .user_service
        .reset_password(&uid, &token, &body.password, &body.password2)
        .await?;
    Ok(Json(MessageResponse::new("Password Reset Successfully")))
}
