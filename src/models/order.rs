//! Order model
//!
//! An order records a user's purchase of a course at the price current when it
//! was placed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::price::Price;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: i64,
    #[serde(rename = "user")]
    pub user_id: i64,
    #[serde(rename = "course")]
    pub course_id: i64,
    pub status: OrderStatus,
    pub price: Price,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Whether an order in this state grants access to the course
    pub fn grants_enrollment(self) -> bool {
        !matches!(self, OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid order status: {}", s)),
        }
    }
}

/// Writable order fields
#[derive(Debug, Clone)]
pub struct OrderInput {
    pub user_id: i64,
    pub course_id: i64,
    pub status: OrderStatus,
    pub price: Price,
}

impl OrderInput {
    pub fn from_order(order: &Order) -> Self {
        Self {
            user_id: order.user_id,
            course_id: order.course_id,
            status: order.status,
            price: order.price,
        }
    }
}

/// Time range for the per-course revenue report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceWindow {
    Day,
    Week,
    Month,
    All,
}

impl PriceWindow {
    /// Map the `filter` query value; anything unrecognised means all time.
    pub fn from_filter(filter: Option<&str>) -> Self {
        match filter {
            Some("day") => PriceWindow::Day,
            Some("week") => PriceWindow::Week,
            Some("month") => PriceWindow::Month,
            _ => PriceWindow::All,
        }
    }

    /// Earliest creation time included, or `None` for no bound
    pub fn since(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            PriceWindow::Day => Some(now - Duration::days(1)),
            PriceWindow::Week => Some(now - Duration::days(7)),
            PriceWindow::Month => Some(now - Duration::days(30)),
            PriceWindow::All => None,
        }
    }
}

/// Prices of one course's orders, for charting.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CoursePriceSeries {
    /// Course title
    pub name: String,
    pub data: Vec<Price>,
}

/// Group `(course title, price)` pairs by title, keeping first-seen order.
pub fn group_prices_by_course(rows: impl IntoIterator<Item = (String, Price)>) -> Vec<CoursePriceSeries> {
    let mut series: Vec<CoursePriceSeries> = Vec::new();
    for (name, price) in rows {
        match series.iter_mut().find(|s| s.name == name) {
            Some(entry) => entry.data.push(price),
            None => series.push(CoursePriceSeries {
                name,
                data: vec![price],
            }),
        }
    }
    series
}
