//! Category repository
//!
//! Database operations for course categories.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Category, CategoryInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, input: &CategoryInput) -> Result<Category>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    async fn get_by_title(&self, title: &str) -> Result<Option<Category>>;

    /// All categories ordered by id
    async fn list(&self) -> Result<Vec<Category>>;

    /// Returns `None` if the category does not exist
    async fn update(&self, id: i64, input: &CategoryInput) -> Result<Option<Category>>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, input: &CategoryInput) -> Result<Category> {
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => create_category_sqlite(pool, input).await?,
            Backend::Mysql(pool) => create_category_mysql(pool, input).await?,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Category not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let sql = "SELECT id, title, description, created_at, updated_at FROM categories WHERE id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get category by ID")?;
                Ok(row.as_ref().map(row_to_category_sqlite))
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get category by ID")?;
                Ok(row.as_ref().map(row_to_category_mysql))
            }
        }
    }

    async fn get_by_title(&self, title: &str) -> Result<Option<Category>> {
        let sql = "SELECT id, title, description, created_at, updated_at FROM categories WHERE title = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(sql)
                    .bind(title)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get category by title")?;
                Ok(row.as_ref().map(row_to_category_sqlite))
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(sql)
                    .bind(title)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get category by title")?;
                Ok(row.as_ref().map(row_to_category_mysql))
            }
        }
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let sql = "SELECT id, title, description, created_at, updated_at FROM categories ORDER BY id";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(sql)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list categories")?;
                Ok(rows.iter().map(row_to_category_sqlite).collect())
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(sql)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list categories")?;
                Ok(rows.iter().map(row_to_category_mysql).collect())
            }
        }
    }

    async fn update(&self, id: i64, input: &CategoryInput) -> Result<Option<Category>> {
        if self.get_by_id(id).await?.is_none() {
            return Ok(None);
        }
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_category_sqlite(pool, id, input).await?,
            Backend::Mysql(pool) => update_category_mysql(pool, id, input).await?,
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query("DELETE FROM categories WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete category")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query("DELETE FROM categories WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete category")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_category_sqlite(pool: &SqlitePool, input: &CategoryInput) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO categories (title, description, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&input.title)
    .bind(&input.description)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create category")?;

    Ok(result.last_insert_rowid())
}

async fn update_category_sqlite(pool: &SqlitePool, id: i64, input: &CategoryInput) -> Result<()> {
    sqlx::query("UPDATE categories SET title = ?, description = ?, updated_at = ? WHERE id = ?")
        .bind(&input.title)
        .bind(&input.description)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update category")?;
    Ok(())
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_category_mysql(pool: &MySqlPool, input: &CategoryInput) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO categories (title, description, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&input.title)
    .bind(&input.description)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create category")?;

    Ok(result.last_insert_id() as i64)
}

async fn update_category_mysql(pool: &MySqlPool, id: i64, input: &CategoryInput) -> Result<()> {
    sqlx::query("UPDATE categories SET title = ?, description = ?, updated_at = ? WHERE id = ?")
        .bind(&input.title)
        .bind(&input.description)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update category")?;
    Ok(())
}

fn row_to_category_mysql(row: &sqlx::mysql::MySqlRow) -> Category {
    Category {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxCategoryRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxCategoryRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = setup_test_repo().await;
        let created = repo
            .create(&CategoryInput::new("Programming", "Code things"))
            .await
            .unwrap();

        assert!(created.id > 0);
        assert_eq!(created.title, "Programming");
        assert_eq!(created.created_at, created.updated_at);

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(repo.get_by_title("Programming").await.unwrap().is_some());
        assert!(repo.get_by_title("Cooking").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_title_fails() {
        let repo = setup_test_repo().await;
        repo.create(&CategoryInput::new("Design", "a")).await.unwrap();
        assert!(repo.create(&CategoryInput::new("Design", "b")).await.is_err());
    }

    #[tokio::test]
    async fn test_list_update_delete() {
        let repo = setup_test_repo().await;
        let a = repo.create(&CategoryInput::new("A", "first")).await.unwrap();
        repo.create(&CategoryInput::new("B", "second")).await.unwrap();

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "A");

        let updated = repo
            .update(a.id, &CategoryInput::new("A2", "changed"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "A2");
        assert_eq!(updated.description, "changed");
        assert!(updated.updated_at >= updated.created_at);

        assert!(repo.update(999, &CategoryInput::new("X", "y")).await.unwrap().is_none());

        assert!(repo.delete(a.id).await.unwrap());
        assert!(!repo.delete(a.id).await.unwrap());
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }
}
