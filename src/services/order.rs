//! Order service
//!
//! Orders tie a user to a purchased course. Every write keeps the user's
//! enrollment in step with the order status, and every create or update is
//! logged.

use crate::db::repositories::{CourseRepository, OrderRepository, UserRepository};
use crate::models::{
    group_prices_by_course, Course, CoursePriceSeries, Order, OrderInput, OrderStatus, Price,
    PriceWindow, User,
};
use crate::services::validation::{FieldErrors, REQUIRED};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

pub const COURSE_NOT_FOUND: &str = "Course not found.";

/// Error types for order service operations
#[derive(Debug, thiserror::Error)]
pub enum OrderServiceError {
    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    #[error("Order not found: {0}")]
    NotFound(i64),

    #[error("Course not found.")]
    CourseNotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Order fields as submitted by an administrator
#[derive(Debug, Clone, Default)]
pub struct OrderDraft {
    pub user: Option<i64>,
    pub course: Option<i64>,
    pub status: Option<OrderStatus>,
    pub price: Option<Price>,
}

impl OrderDraft {
    pub fn from_order(order: &Order) -> Self {
        let input = OrderInput::from_order(order);
        Self {
            user: Some(input.user_id),
            course: Some(input.course_id),
            status: Some(input.status),
            price: Some(input.price),
        }
    }
}

/// Order service
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    users: Arc<dyn UserRepository>,
    courses: Arc<dyn CourseRepository>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        users: Arc<dyn UserRepository>,
        courses: Arc<dyn CourseRepository>,
    ) -> Self {
        Self {
            orders,
            users,
            courses,
        }
    }

    /// Orders of one user, or every order when `owner` is `None`
    pub async fn list(&self, owner: Option<i64>) -> Result<Vec<Order>, OrderServiceError> {
        Ok(self.orders.list(owner).await.context("Failed to list orders")?)
    }

    /// An order restricted to `owner`; other users' orders are reported as missing
    pub async fn get(&self, owner: Option<i64>, id: i64) -> Result<Order, OrderServiceError> {
        let order = self.find(id).await?;
        if owner.is_some_and(|owner| owner != order.user_id) {
            return Err(OrderServiceError::NotFound(id));
        }
        Ok(order)
    }

    pub async fn create(&self, draft: OrderDraft) -> Result<Order, OrderServiceError> {
        let (input, user, course) = self.validate(draft).await?;
        let order = self
            .orders
            .create(&input)
            .await
            .context("Failed to create order")?;
        tracing::info!("New order created: {}", describe(&order, &user, &course));
        self.sync_enrollment(&order).await?;
        Ok(order)
    }

    pub async fn update(&self, id: i64, draft: OrderDraft) -> Result<Order, OrderServiceError> {
        let previous = self.find(id).await?;
        let (input, user, course) = self.validate(draft).await?;
        let order = self
            .orders
            .update(id, &input)
            .await
            .context("Failed to update order")?
            .ok_or(OrderServiceError::NotFound(id))?;
        tracing::info!("Order updated: {}", describe(&order, &user, &course));
        if (previous.user_id, previous.course_id) != (order.user_id, order.course_id) {
            self.release_enrollment(previous.user_id, previous.course_id).await?;
        }
        self.sync_enrollment(&order).await?;
        Ok(order)
    }

    pub async fn delete(&self, id: i64) -> Result<(), OrderServiceError> {
        if !self.orders.delete(id).await.context("Failed to delete order")? {
            return Err(OrderServiceError::NotFound(id));
        }
        Ok(())
    }

    /// Buy a course at its current price. The order starts pending and the
    /// buyer is enrolled straight away.
    pub async fn place_order(&self, buyer: &User, course_id: i64) -> Result<Order, OrderServiceError> {
        let course = self
            .courses
            .get_by_id(course_id)
            .await
            .context("Failed to get course")?
            .ok_or(OrderServiceError::CourseNotFound)?;

        let input = OrderInput {
            user_id: buyer.id,
            course_id: course.id,
            status: OrderStatus::Pending,
            price: course.price,
        };
        let order = self
            .orders
            .create(&input)
            .await
            .context("Failed to create order")?;
        tracing::info!("New order created: {}", describe(&order, buyer, &course));
        self.sync_enrollment(&order).await?;
        Ok(order)
    }

    /// Sum of all order prices
    pub async fn total_price(&self) -> Result<Price, OrderServiceError> {
        Ok(self
            .orders
            .total_price()
            .await
            .context("Failed to sum order prices")?)
    }

    /// Order prices grouped by course title for the given window
    pub async fn course_prices(&self, window: PriceWindow) -> Result<Vec<CoursePriceSeries>, OrderServiceError> {
        let rows = self
            .orders
            .course_prices(window.since(Utc::now()))
            .await
            .context("Failed to load course prices")?;
        Ok(group_prices_by_course(rows))
    }

    async fn find(&self, id: i64) -> Result<Order, OrderServiceError> {
        self.orders
            .get_by_id(id)
            .await
            .context("Failed to get order")?
            .ok_or(OrderServiceError::NotFound(id))
    }

    async fn sync_enrollment(&self, order: &Order) -> Result<(), OrderServiceError> {
        if order.status.grants_enrollment() {
            self.users
                .enroll(order.user_id, order.course_id)
                .await
                .context("Failed to enroll user")?;
        } else {
            self.release_enrollment(order.user_id, order.course_id).await?;
        }
        Ok(())
    }

    /// Unenroll unless another order for the same user and course still grants access
    async fn release_enrollment(&self, user_id: i64, course_id: i64) -> Result<(), OrderServiceError> {
        let still_granted = self
            .orders
            .list(Some(user_id))
            .await
            .context("Failed to list orders")?
            .iter()
            .any(|o| o.course_id == course_id && o.status.grants_enrollment());
        if !still_granted {
            self.users
                .unenroll(user_id, course_id)
                .await
                .context("Failed to unenroll user")?;
        }
        Ok(())
    }

    async fn validate(&self, draft: OrderDraft) -> Result<(OrderInput, User, Course), OrderServiceError> {
        let mut errors = FieldErrors::new();

        let user = match draft.user {
            None => {
                errors.add("user", REQUIRED);
                None
            }
            Some(id) => {
                let user = self.users.get_by_id(id).await.context("Failed to get user")?;
                if user.is_none() {
                    errors.add("user", invalid_pk(id));
                }
                user
            }
        };
        let course = match draft.course {
            None => {
                errors.add("course", REQUIRED);
                None
            }
            Some(id) => {
                let course = self.courses.get_by_id(id).await.context("Failed to get course")?;
                if course.is_none() {
                    errors.add("course", invalid_pk(id));
                }
                course
            }
        };
        if draft.price.is_none() {
            errors.add("price", REQUIRED);
        }

        match (user, course, draft.price) {
            (Some(user), Some(course), Some(price)) if errors.is_empty() => {
                let input = OrderInput {
                    user_id: user.id,
                    course_id: course.id,
                    status: draft.status.unwrap_or_default(),
                    price,
                };
                Ok((input, user, course))
            }
            _ => Err(OrderServiceError::ValidationError(errors)),
        }
    }
}

fn invalid_pk(id: i64) -> String {
    format!("Invalid pk \"{}\" - object does not exist.", id)
}

fn describe(order: &Order, user: &User, course: &Course) -> String {
    format!("Order {} - {} - {}", order.id, user.email, course.title)
}
