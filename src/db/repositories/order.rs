//! Order repository
//!
//! Database operations for course orders, including the revenue aggregates.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Order, OrderInput, OrderStatus, Price};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const ORDER_COLUMNS: &str = "id, user_id, course_id, status, price_cents, created_at, updated_at";

/// Order repository trait
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, input: &OrderInput) -> Result<Order>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Order>>;

    /// All orders, or only those placed by `user_id`, ordered by id
    async fn list(&self, user_id: Option<i64>) -> Result<Vec<Order>>;

    /// Returns `None` if the order does not exist
    async fn update(&self, id: i64, input: &OrderInput) -> Result<Option<Order>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Sum of every order's price
    async fn total_price(&self) -> Result<Price>;

    /// `(course title, order price)` for orders created at or after `since`,
    /// in order id sequence
    async fn course_prices(&self, since: Option<DateTime<Utc>>) -> Result<Vec<(String, Price)>>;
}

/// SQLx-based order repository implementation
pub struct SqlxOrderRepository {
    pool: DynDatabasePool,
}

impl SqlxOrderRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn OrderRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl OrderRepository for SqlxOrderRepository {
    async fn create(&self, input: &OrderInput) -> Result<Order> {
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => create_order_sqlite(pool, input).await?,
            Backend::Mysql(pool) => create_order_mysql(pool, input).await?,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Order not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get order by ID")?;
                row.as_ref().map(row_to_order_sqlite).transpose()
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get order by ID")?;
                row.as_ref().map(row_to_order_mysql).transpose()
            }
        }
    }

    async fn list(&self, user_id: Option<i64>) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE (? IS NULL OR user_id = ?) ORDER BY id",
            ORDER_COLUMNS
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .bind(user_id)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list orders")?;
                rows.iter().map(row_to_order_sqlite).collect()
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .bind(user_id)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list orders")?;
                rows.iter().map(row_to_order_mysql).collect()
            }
        }
    }

    async fn update(&self, id: i64, input: &OrderInput) -> Result<Option<Order>> {
        if self.get_by_id(id).await?.is_none() {
            return Ok(None);
        }
        let sql = "UPDATE orders SET user_id = ?, course_id = ?, status = ?, price_cents = ?, \
                   updated_at = ? WHERE id = ?";
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sql)
                    .bind(input.user_id)
                    .bind(input.course_id)
                    .bind(input.status.to_string())
                    .bind(input.price.cents())
                    .bind(now)
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to update order")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql)
                    .bind(input.user_id)
                    .bind(input.course_id)
                    .bind(input.status.to_string())
                    .bind(input.price.cents())
                    .bind(now)
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to update order")?;
            }
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query("DELETE FROM orders WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete order")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query("DELETE FROM orders WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete order")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn total_price(&self) -> Result<Price> {
        let cents: i64 = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query_scalar("SELECT CAST(COALESCE(SUM(price_cents), 0) AS INTEGER) FROM orders")
                    .fetch_one(pool)
                    .await
                    .context("Failed to sum order prices")?
            }
            Backend::Mysql(pool) => {
                sqlx::query_scalar("SELECT CAST(COALESCE(SUM(price_cents), 0) AS SIGNED) FROM orders")
                    .fetch_one(pool)
                    .await
                    .context("Failed to sum order prices")?
            }
        };
        Ok(Price::from_cents(cents))
    }

    async fn course_prices(&self, since: Option<DateTime<Utc>>) -> Result<Vec<(String, Price)>> {
        let sql = "SELECT c.title, o.price_cents FROM orders o \
                   INNER JOIN courses c ON c.id = o.course_id \
                   WHERE (? IS NULL OR o.created_at >= ?) ORDER BY o.id";
        let rows: Vec<(String, i64)> = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query_as(sql)
                .bind(since)
                .bind(since)
                .fetch_all(pool)
                .await
                .context("Failed to load course prices")?,
            Backend::Mysql(pool) => sqlx::query_as(sql)
                .bind(since)
                .bind(since)
                .fetch_all(pool)
                .await
                .context("Failed to load course prices")?,
        };
        Ok(rows
            .into_iter()
            .map(|(title, cents)| (title, Price::from_cents(cents)))
            .collect())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_order_sqlite(pool: &SqlitePool, input: &OrderInput) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO orders (user_id, course_id, status, price_cents, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(input.user_id)
    .bind(input.course_id)
    .bind(input.status.to_string())
    .bind(input.price.cents())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create order")?;

    Ok(result.last_insert_rowid())
}

fn row_to_order_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Order> {
    let status: String = row.get("status");
    Ok(Order {
        id: row.get("id"),
        user_id: row.get("user_id"),
        course_id: row.get("course_id"),
        status: OrderStatus::from_str(&status)?,
        price: Price::from_cents(row.get("price_cents")),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_order_mysql(pool: &MySqlPool, input: &OrderInput) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO orders (user_id, course_id, status, price_cents, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(input.user_id)
    .bind(input.course_id)
    .bind(input.status.to_string())
    .bind(input.price.cents())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create order")?;

    Ok(result.last_insert_id() as i64)
}

fn row_to_order_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Order> {
    let status: String = row.get("status");
    Ok(Order {
        id: row.get("id"),
        user_id: row.get("user_id"),
        course_id: row.get("course_id"),
        status: OrderStatus::from_str(&status)?,
        price: Price::from_cents(row.get("price_cents")),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::course::sample_course_input;
    use crate::db::repositories::{
        CourseRepository, SqlxCourseRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{NewUser, UserType};

    struct Fixture {
        repo: SqlxOrderRepository,
        courses: SqlxCourseRepository,
        student: i64,
        rust: i64,
        go: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let users = SqlxUserRepository::new(pool.clone());
        let tutor = users
            .create(&NewUser::new("tutor@x.com", "T", UserType::Teacher, "h"))
            .await
            .unwrap();
        let student = users
            .create(&NewUser::new("s@x.com", "S", UserType::Student, "h"))
            .await
            .unwrap();
        let courses = SqlxCourseRepository::new(pool.clone());
        let rust = courses.create(&sample_course_input("Rust", tutor.id)).await.unwrap();
        let go = courses.create(&sample_course_input("Go", tutor.id)).await.unwrap();
        Fixture {
            repo: SqlxOrderRepository::new(pool),
            courses,
            student: student.id,
            rust: rust.id,
            go: go.id,
        }
    }

    fn input(user_id: i64, course_id: i64, cents: i64) -> OrderInput {
        OrderInput {
            user_id,
            course_id,
            status: OrderStatus::Pending,
            price: Price::from_cents(cents),
        }
    }

    #[tokio::test]
    async fn test_create_get_list() {
        let f = setup().await;
        let order = f.repo.create(&input(f.student, f.rust, 1999)).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.price, Price::from_cents(1999));
        assert_eq!(f.repo.get_by_id(order.id).await.unwrap(), Some(order.clone()));

        assert_eq!(f.repo.list(None).await.unwrap().len(), 1);
        assert_eq!(f.repo.list(Some(f.student)).await.unwrap().len(), 1);
        assert!(f.repo.list(Some(f.student + 100)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let f = setup().await;
        let order = f.repo.create(&input(f.student, f.rust, 500)).await.unwrap();

        let mut change = OrderInput::from_order(&order);
        change.status = OrderStatus::Cancelled;
        let updated = f.repo.update(order.id, &change).await.unwrap().unwrap();
        assert_eq!(updated.status, OrderStatus::Cancelled);
        assert!(f.repo.update(999, &change).await.unwrap().is_none());

        assert!(f.repo.delete(order.id).await.unwrap());
        assert!(!f.repo.delete(order.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_total_price() {
        let f = setup().await;
        assert_eq!(f.repo.total_price().await.unwrap(), Price::ZERO);

        f.repo.create(&input(f.student, f.rust, 1050)).await.unwrap();
        f.repo.create(&input(f.student, f.go, 2025)).await.unwrap();
        assert_eq!(f.repo.total_price().await.unwrap(), Price::from_cents(3075));
    }

    #[tokio::test]
    async fn test_course_prices_window() {
        let f = setup().await;
        f.repo.create(&input(f.student, f.rust, 100)).await.unwrap();
        f.repo.create(&input(f.student, f.go, 200)).await.unwrap();
        f.repo.create(&input(f.student, f.rust, 300)).await.unwrap();

        let all = f.repo.course_prices(None).await.unwrap();
        assert_eq!(
            all,
            vec![
                ("Rust".to_string(), Price::from_cents(100)),
                ("Go".to_string(), Price::from_cents(200)),
                ("Rust".to_string(), Price::from_cents(300)),
            ]
        );

        let recent = f.repo.course_prices(Some(Utc::now() - chrono::Duration::days(1))).await.unwrap();
        assert_eq!(recent.len(), 3);

        let future = f.repo.course_prices(Some(Utc::now() + chrono::Duration::days(1))).await.unwrap();
        assert!(future.is_empty());
    }

    #[tokio::test]
    async fn test_orders_removed_with_course() {
        let f = setup().await;
        f.repo.create(&input(f.student, f.rust, 100)).await.unwrap();
        f.courses.delete(f.rust).await.unwrap();
        assert!(f.repo.list(None).await.unwrap().is_empty());
    }
}
