//! Order API endpoints
//!
//! - GET /api/v1/orders, /api/v1/admin/orders - Orders visible to the caller
//! - POST|PUT|DELETE on the same prefixes - Admin order management
//! - GET /api/v1/orders/sum_prices - Revenue total
//! - GET /api/v1/orders/course_prices?filter= - Revenue per course
//! - POST /api/v1/user/orders/create - Buy a course

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::JsonBody;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Actor, CoursePriceSeries, Order, OrderStatus, Price, PriceWindow};
use crate::services::OrderDraft;

/// Request for creating/updating an order
#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    pub user: Option<i64>,
    pub course: Option<i64>,
    pub status: Option<OrderStatus>,
    pub price: Option<Price>,
}

impl From<OrderRequest> for OrderDraft {
    fn from(req: OrderRequest) -> Self {
        OrderDraft {
            user: req.user,
            course: req.course,
            status: req.status,
            price: req.price,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(rename = "courseId")]
    pub course_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CoursePricesQuery {
    pub filter: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TotalPriceResponse {
    pub total_price: Price,
}

#[derive(Debug, Serialize)]
pub struct CoursePricesResponse {
    #[serde(rename = "courseList")]
    pub course_list: Vec<CoursePriceSeries>,
}

/// List/retrieve routes under `prefix`; needs a signed-in caller or admin session
pub fn read_router(prefix: &str) -> Router<AppState> {
    Router::new()
        .route(prefix, get(list_orders))
        .route(&format!("{}/{{id}}", prefix), get(get_order))
}

/// Order management under `prefix`; the caller layers the admin guard
pub fn write_router(prefix: &str) -> Router<AppState> {
    Router::new()
        .route(prefix, post(create_order))
        .route(
            &format!("{}/{{id}}", prefix),
            put(update_order).delete(delete_order),
        )
}

/// Revenue reports (admin)
pub fn report_router() -> Router<AppState> {
    Router::new()
        .route("/orders/sum_prices", get(sum_prices))
        .route("/orders/course_prices", get(course_prices))
}

/// Checkout for signed-in users
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/user/orders/create", post(place_order))
}

/// Admins see every order, everyone else only their own
fn owner_filter(actor: &Actor) -> Option<i64> {
    if actor.is_admin() {
        None
    } else {
        actor.user().map(|user| user.id)
    }
}

async fn list_orders(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.order_service.list(owner_filter(&actor)).await?))
}

async fn get_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.order_service.get(owner_filter(&actor), id).await?))
}

async fn create_order(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<OrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state.order_service.create(body.into()).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<OrderRequest>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.order_service.update(id, body.into()).await?))
}

async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.order_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/orders/sum_prices
async fn sum_prices(State(state): State<AppState>) -> Result<Json<TotalPriceResponse>, ApiError> {
    let total_price = state.order_service.total_price().await?;
    Ok(Json(TotalPriceResponse { total_price }))
}

/// GET /api/v1/orders/course_prices?filter=day|week|month|all
async fn course_prices(
    State(state): State<AppState>,
    Query(query): Query<CoursePricesQuery>,
) -> Result<Json<CoursePricesResponse>, ApiError> {
    let window = PriceWindow::from_filter(query.filter.as_deref());
    let course_list = state.order_service.course_prices(window).await?;
    Ok(Json(CoursePricesResponse { course_list }))
}

/// POST /api/v1/user/orders/create
async fn place_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonBody(body): JsonBody<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let course_id = body
        .course_id
        .ok_or_else(|| ApiError::validation_error("courseId is required"))?;
    let order = state.order_service.place_order(&user.0, course_id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}
