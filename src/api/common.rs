//! Common API utilities and shared types
//!
//! Conversions from service errors to the API error envelope, the JSON body
//! extractor, and small request helpers shared by several endpoint modules.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::HeaderMap,
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use std::net::IpAddr;

use crate::api::middleware::ApiError;
use crate::services::user::{INVALID_LOGIN, NON_FIELD_ERRORS};
use crate::services::{
    CategoryServiceError, CourseServiceError, FeedbackServiceError, FieldErrors,
    LessonServiceError, OrderServiceError, UserServiceError,
};

/// Plain `{"msg": ...}` acknowledgement used by the auth endpoints
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub msg: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// JSON request body whose rejections use the API error envelope
///
/// A body that parses but does not fit the target type (bad enum variant,
/// negative price, wrong number type) becomes a 400 `VALIDATION_ERROR` with
/// the message filed under the offending field.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection_error(rejection)),
        }
    }
}

const JSON_DATA_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

// `<path>: <message>` as produced for errors below the top level
static FIELD_PATH_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_.\[\]]*): (.+)$").ok());
static MISSING_FIELD_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^missing field `([^`]+)`").ok());
static POSITION_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r" at line \d+ column \d+$").ok());

/// Map a JSON extractor rejection onto the API error envelope
pub fn json_rejection_error(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::JsonDataError(e) => data_error_fields(&e.body_text()).into(),
        JsonRejection::JsonSyntaxError(e) => {
            FieldErrors::single(NON_FIELD_ERRORS, strip_position(&e.body_text())).into()
        }
        other => ApiError::validation_error(other.body_text()),
    }
}

/// Field errors for a deserialization failure, keyed by the serde path
fn data_error_fields(text: &str) -> FieldErrors {
    let detail = text.strip_prefix(JSON_DATA_PREFIX).unwrap_or(text);
    let detail = strip_position(detail);

    if let Some(caps) = FIELD_PATH_RE.as_ref().and_then(|re| re.captures(&detail)) {
        return FieldErrors::single(&caps[1], &caps[2]);
    }
    if let Some(caps) = MISSING_FIELD_RE.as_ref().and_then(|re| re.captures(&detail)) {
        return FieldErrors::single(&caps[1], crate::services::validation::REQUIRED);
    }
    FieldErrors::single(NON_FIELD_ERRORS, detail)
}

fn strip_position(text: &str) -> String {
    match POSITION_RE.as_ref() {
        Some(re) => re.replace(text, "").into_owned(),
        None => text.to_string(),
    }
}

/// Client address from proxy headers
pub fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            // Take the first IP in the list
            if let Some(ip) = forwarded_str.split(',').next() {
                return ip.trim().parse().ok();
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .and_then(|ip| ip.trim().parse().ok())
}

/// `Set-Cookie` value for an HttpOnly, SameSite=Strict token cookie
pub fn token_cookie(name: &str, value: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Max-Age={}; Path=/",
        name, value, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that deletes the named cookie
pub fn expired_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Max-Age=0; Path=/", name)
}

// ============================================================================
// Service error conversions
// ============================================================================

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        let details = serde_json::to_value(&errors).unwrap_or_default();
        ApiError::with_details("VALIDATION_ERROR", errors.to_string(), details)
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::ValidationError(errors) => errors.into(),
            UserServiceError::InvalidCredentials => ApiError::with_details(
                "INVALID_CREDENTIALS",
                INVALID_LOGIN,
                serde_json::to_value(FieldErrors::single(NON_FIELD_ERRORS, INVALID_LOGIN))
                    .unwrap_or_default(),
            ),
            UserServiceError::Blocked => ApiError::new("USER_BLOCKED", "User account is blocked"),
            UserServiceError::InvalidToken(msg) => ApiError::unauthorized(msg),
            UserServiceError::NotFound => ApiError::not_found("User not found"),
            UserServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(e: CategoryServiceError) -> Self {
        match e {
            CategoryServiceError::ValidationError(errors) => errors.into(),
            CategoryServiceError::NotFound(id) => ApiError::not_found(format!("Category not found: {}", id)),
            CategoryServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<CourseServiceError> for ApiError {
    fn from(e: CourseServiceError) -> Self {
        match e {
            CourseServiceError::ValidationError(errors) => errors.into(),
            CourseServiceError::NotFound(id) => ApiError::not_found(format!("Course not found: {}", id)),
            CourseServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            CourseServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<LessonServiceError> for ApiError {
    fn from(e: LessonServiceError) -> Self {
        match e {
            LessonServiceError::ValidationError(errors) => errors.into(),
            LessonServiceError::NotFound(id) => ApiError::not_found(format!("Lesson not found: {}", id)),
            LessonServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            LessonServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<FeedbackServiceError> for ApiError {
    fn from(e: FeedbackServiceError) -> Self {
        match e {
            FeedbackServiceError::ValidationError(errors) => errors.into(),
            FeedbackServiceError::LessonNotFound(id) => {
                ApiError::not_found(format!("Lesson not found: {}", id))
            }
            FeedbackServiceError::CommentNotFound(id) => {
                ApiError::not_found(format!("Comment not found: {}", id))
            }
            FeedbackServiceError::ReportNotFound(id) => {
                ApiError::not_found(format!("Report not found: {}", id))
            }
            FeedbackServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            FeedbackServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<OrderServiceError> for ApiError {
    fn from(e: OrderServiceError) -> Self {
        match e {
            OrderServiceError::ValidationError(errors) => errors.into(),
            OrderServiceError::NotFound(id) => ApiError::not_found(format!("Order not found: {}", id)),
            OrderServiceError::CourseNotFound => {
                ApiError::not_found(crate::services::order::COURSE_NOT_FOUND)
            }
            OrderServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum::response::IntoResponse;
    use axum::http::StatusCode;

    #[test]
    fn test_data_error_names_the_field() {
        let errors = data_error_fields(
            "Failed to deserialize the JSON body into the target type: user_type: \
             unknown variant `wizard`, expected `student` or `teacher` at line 1 column 21",
        );
        assert_eq!(
            errors.get("user_type"),
            Some(&["unknown variant `wizard`, expected `student` or `teacher`".to_string()][..])
        );
    }

    #[test]
    fn test_data_error_without_path() {
        let errors = data_error_fields(
            "Failed to deserialize the JSON body into the target type: \
             invalid type: string \"x\", expected struct CourseRequest at line 1 column 3",
        );
        assert!(errors.get(NON_FIELD_ERRORS).is_some());

        let errors = data_error_fields(
            "Failed to deserialize the JSON body into the target type: \
             missing field `courseId` at line 1 column 2",
        );
        assert_eq!(
            errors.get("courseId"),
            Some(&[crate::services::validation::REQUIRED.to_string()][..])
        );
    }

    #[test]
    fn test_client_ip() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers), "10.0.0.2".parse::<IpAddr>().ok());

        headers.insert("x-forwarded-for", HeaderValue::from_static("192.168.1.5, 10.0.0.1"));
        assert_eq!(client_ip(&headers), "192.168.1.5".parse::<IpAddr>().ok());

        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        assert_eq!(client_ip(&headers), None);
    }

    #[test]
    fn test_token_cookie() {
        assert_eq!(
            token_cookie("adminToken", "abc", 86400, false),
            "adminToken=abc; HttpOnly; SameSite=Strict; Max-Age=86400; Path=/"
        );
        assert!(token_cookie("adminToken", "abc", 86400, true).ends_with("; Secure"));
        assert!(expired_cookie("adminToken").contains("Max-Age=0"));
    }

    #[test]
    fn test_field_errors_become_details() {
        let error = ApiError::from(FieldErrors::single("title", "This field may not be blank."));
        assert_eq!(error.error.code, "VALIDATION_ERROR");
        assert_eq!(
            error.error.details,
            Some(serde_json::json!({"title": ["This field may not be blank."]}))
        );
    }

    #[test]
    fn test_user_error_statuses() {
        let status = |e: UserServiceError| ApiError::from(e).into_response().status();
        assert_eq!(status(UserServiceError::InvalidCredentials), StatusCode::NOT_FOUND);
        assert_eq!(status(UserServiceError::Blocked), StatusCode::FORBIDDEN);
        assert_eq!(
            status(UserServiceError::InvalidToken("expired".to_string())),
            StatusCode::UNAUTHORIZED
        );

        let error = ApiError::from(UserServiceError::InvalidCredentials);
        assert_eq!(
            error.error.details,
            Some(serde_json::json!({"non_field_errors": [INVALID_LOGIN]}))
        );
    }

    #[test]
    fn test_order_course_not_found() {
        let error = ApiError::from(OrderServiceError::CourseNotFound);
        assert_eq!(error.error.code, "NOT_FOUND");
        assert_eq!(error.error.message, "Course not found.");
    }
}
