//! Lesson repository
//!
//! Database operations for lessons and lesson likes.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Lesson, LessonInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const LESSON_COLUMNS: &str =
    "id, title, course_id, description, video_url, duration, sort_order, created_at, updated_at";

// Explicit positions first, then unordered lessons, ties broken by id.
const LESSON_ORDER: &str = "ORDER BY course_id, (sort_order IS NULL), sort_order, id";

/// Lesson repository trait
#[async_trait]
pub trait LessonRepository: Send + Sync {
    async fn create(&self, input: &LessonInput) -> Result<Lesson>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Lesson>>;

    /// Lessons of one course, or all lessons when `course_id` is `None`
    async fn list(&self, course_id: Option<i64>) -> Result<Vec<Lesson>>;

    /// Returns `None` if the lesson does not exist
    async fn update(&self, id: i64, input: &LessonInput) -> Result<Option<Lesson>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Flip the user's like on a lesson and return whether it is now liked
    async fn toggle_like(&self, lesson_id: i64, user_id: i64) -> Result<bool>;

    /// Ids of the users who liked the lesson
    async fn like_user_ids(&self, lesson_id: i64) -> Result<Vec<i64>>;
}

/// SQLx-based lesson repository implementation
pub struct SqlxLessonRepository {
    pool: DynDatabasePool,
}

impl SqlxLessonRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LessonRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LessonRepository for SqlxLessonRepository {
    async fn create(&self, input: &LessonInput) -> Result<Lesson> {
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => create_lesson_sqlite(pool, input).await?,
            Backend::Mysql(pool) => create_lesson_mysql(pool, input).await?,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Lesson not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Lesson>> {
        let sql = format!("SELECT {} FROM lessons WHERE id = ?", LESSON_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get lesson by ID")?;
                Ok(row.as_ref().map(row_to_lesson_sqlite))
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get lesson by ID")?;
                Ok(row.as_ref().map(row_to_lesson_mysql))
            }
        }
    }

    async fn list(&self, course_id: Option<i64>) -> Result<Vec<Lesson>> {
        let sql = format!(
            "SELECT {} FROM lessons WHERE (? IS NULL OR course_id = ?) {}",
            LESSON_COLUMNS, LESSON_ORDER
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(course_id)
                    .bind(course_id)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list lessons")?;
                Ok(rows.iter().map(row_to_lesson_sqlite).collect())
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(course_id)
                    .bind(course_id)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list lessons")?;
                Ok(rows.iter().map(row_to_lesson_mysql).collect())
            }
        }
    }

    async fn update(&self, id: i64, input: &LessonInput) -> Result<Option<Lesson>> {
        if self.get_by_id(id).await?.is_none() {
            return Ok(None);
        }
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_lesson_sqlite(pool, id, input).await?,
            Backend::Mysql(pool) => update_lesson_mysql(pool, id, input).await?,
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query("DELETE FROM lessons WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete lesson")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query("DELETE FROM lessons WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete lesson")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn toggle_like(&self, lesson_id: i64, user_id: i64) -> Result<bool> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => toggle_like_sqlite(pool, lesson_id, user_id).await,
            Backend::Mysql(pool) => toggle_like_mysql(pool, lesson_id, user_id).await,
        }
    }

    async fn like_user_ids(&self, lesson_id: i64) -> Result<Vec<i64>> {
        let sql = "SELECT user_id FROM lesson_likes WHERE lesson_id = ? ORDER BY user_id";
        let ids = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(lesson_id)
                .fetch_all(pool)
                .await
                .context("Failed to list likes")?
                .iter()
                .map(|row| row.get("user_id"))
                .collect(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(lesson_id)
                .fetch_all(pool)
                .await
                .context("Failed to list likes")?
                .iter()
                .map(|row| row.get("user_id"))
                .collect(),
        };
        Ok(ids)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_lesson_sqlite(pool: &SqlitePool, input: &LessonInput) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO lessons (title, course_id, description, video_url, duration, sort_order, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(input.course_id)
    .bind(&input.description)
    .bind(&input.video_url)
    .bind(input.duration)
    .bind(input.order)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create lesson")?;

    Ok(result.last_insert_rowid())
}

async fn update_lesson_sqlite(pool: &SqlitePool, id: i64, input: &LessonInput) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE lessons
        SET title = ?, course_id = ?, description = ?, video_url = ?, duration = ?, sort_order = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.title)
    .bind(input.course_id)
    .bind(&input.description)
    .bind(&input.video_url)
    .bind(input.duration)
    .bind(input.order)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update lesson")?;
    Ok(())
}

async fn toggle_like_sqlite(pool: &SqlitePool, lesson_id: i64, user_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM lesson_likes WHERE lesson_id = ? AND user_id = ?")
        .bind(lesson_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to remove like")?
        .rows_affected();

    if removed == 0 {
        sqlx::query("INSERT INTO lesson_likes (lesson_id, user_id) VALUES (?, ?)")
            .bind(lesson_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("Failed to add like")?;
    }

    tx.commit().await?;
    Ok(removed == 0)
}

fn row_to_lesson_sqlite(row: &sqlx::sqlite::SqliteRow) -> Lesson {
    Lesson {
        id: row.get("id"),
        title: row.get("title"),
        course_id: row.get("course_id"),
        description: row.get("description"),
        video_url: row.get("video_url"),
        duration: row.get("duration"),
        order: row.get("sort_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_lesson_mysql(pool: &MySqlPool, input: &LessonInput) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO lessons (title, course_id, description, video_url, duration, sort_order, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(input.course_id)
    .bind(&input.description)
    .bind(&input.video_url)
    .bind(input.duration)
    .bind(input.order)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create lesson")?;

    Ok(result.last_insert_id() as i64)
}

async fn update_lesson_mysql(pool: &MySqlPool, id: i64, input: &LessonInput) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE lessons
        SET title = ?, course_id = ?, description = ?, video_url = ?, duration = ?, sort_order = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.title)
    .bind(input.course_id)
    .bind(&input.description)
    .bind(&input.video_url)
    .bind(input.duration)
    .bind(input.order)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update lesson")?;
    Ok(())
}

async fn toggle_like_mysql(pool: &MySqlPool, lesson_id: i64, user_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM lesson_likes WHERE lesson_id = ? AND user_id = ?")
        .bind(lesson_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to remove like")?
        .rows_affected();

    if removed == 0 {
        sqlx::query("INSERT INTO lesson_likes (lesson_id, user_id) VALUES (?, ?)")
            .bind(lesson_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("Failed to add like")?;
    }

    tx.commit().await?;
    Ok(removed == 0)
}

fn row_to_lesson_mysql(row: &sqlx::mysql::MySqlRow) -> Lesson {
    Lesson {
        id: row.get("id"),
        title: row.get("title"),
        course_id: row.get("course_id"),
        description: row.get("description"),
        video_url: row.get("video_url"),
        duration: row.get("duration"),
        order: row.get("sort_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
pub(crate) fn sample_lesson_input(course_id: i64, title: &str, order: Option<i32>) -> LessonInput {
    LessonInput {
        title: title.to_string(),
        course_id,
        description: "Lesson description".to_string(),
        video_url: "https://videos.example.com/1.mp4".to_string(),
        duration: 15,
        order,
    }
}
