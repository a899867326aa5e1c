//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`. Routes are grouped by the guard they
//! need: public, optional auth, authenticated user, and admin (cookie session
//! or admin account).

pub mod admin;
pub mod auth;
pub mod categories;
pub mod common;
pub mod courses;
pub mod lessons;
pub mod middleware;
pub mod orders;
pub mod tutors;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /api/v1/health
async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state
        .pool
        .ping()
        .await
        .map_err(|e| ApiError::internal_error(format!("Database ping failed: {:#}", e)))?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (admin cookie or admin account)
    let admin_routes = Router::new()
        .merge(admin::router())
        .merge(categories::write_router("/admin/category"))
        .merge(courses::write_router("/admin/courses"))
        .merge(tutors::write_router("/admin/tutors"))
        .merge(tutors::write_router("/tutors"))
        .merge(tutors::write_router("/tutor/details/top"))
        .merge(orders::read_router("/admin/orders"))
        .merge(orders::write_router("/admin/orders"))
        .merge(orders::write_router("/orders"))
        .merge(orders::report_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_admin,
        ));

    // Protected routes (need a signed-in user)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .route("/user/details", get(auth::get_profile).put(auth::update_profile))
        .merge(categories::write_router("/categories"))
        .merge(courses::write_router("/courses"))
        .merge(courses::write_router("/user/courses"))
        .merge(courses::protected_router())
        .merge(lessons::write_router("/lessons"))
        .merge(lessons::write_router("/tutor/lessons"))
        .merge(lessons::write_router("/user/lessons"))
        .merge(lessons::protected_router())
        .merge(orders::read_router("/orders"))
        .merge(orders::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Identity is attached when present but never required
    let optional_routes = courses::optional_auth_router().route_layer(
        axum_middleware::from_fn_with_state(state.clone(), middleware::optional_auth),
    );

    // Public routes
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::public_router())
        .merge(admin::session_router())
        .merge(categories::read_router("/categories"))
        .merge(categories::read_router("/admin/category"))
        .merge(courses::read_router("/courses"))
        .merge(courses::read_router("/user/courses"))
        .merge(courses::read_router("/admin/courses"))
        .merge(lessons::read_router("/lessons"))
        .merge(lessons::read_router("/tutor/lessons"))
        .merge(lessons::read_router("/user/lessons"))
        .merge(lessons::public_router())
        .merge(tutors::read_router("/tutors"))
        .merge(tutors::read_router("/admin/tutors"))
        .merge(tutors::read_router("/tutor/details/top"))
        .merge(optional_routes)
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    // Credentials require an explicit origin
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => tracing::warn!("Ignoring invalid CORS origin: {}", cors_origin),
    }

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{create_test_pool, migrations};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn test_router() -> Router {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        build_router(AppState::new(pool, &Config::default()), "http://localhost:3000")
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_credentials() {
        let response = test_router()
            .await
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/v1/courses")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = test_router()
            .await
            .oneshot(Request::builder().uri("/api/v1/no-such-route").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_routes_reject_anonymous() {
        for uri in ["/api/v1/admin/users", "/api/v1/admin/reports", "/api/v1/admin/orders"] {
            let response = test_router()
                .await
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }
}
