//! Feedback repository
//!
//! Database operations for lesson comments and reports.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Comment, Report};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Feedback repository trait
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn create_comment(&self, lesson_id: i64, user_id: i64, content: &str) -> Result<Comment>;

    async fn get_comment(&self, id: i64) -> Result<Option<Comment>>;

    /// Comments on a lesson, oldest first
    async fn list_comments(&self, lesson_id: i64) -> Result<Vec<Comment>>;

    async fn delete_comment(&self, id: i64) -> Result<bool>;

    async fn create_report(&self, lesson_id: i64, user_id: i64, reason: &str) -> Result<Report>;

    /// Reports on one lesson, or every report when `lesson_id` is `None`
    async fn list_reports(&self, lesson_id: Option<i64>) -> Result<Vec<Report>>;

    async fn delete_report(&self, id: i64) -> Result<bool>;
}

/// SQLx-based feedback repository implementation
pub struct SqlxFeedbackRepository {
    pool: DynDatabasePool,
}

impl SqlxFeedbackRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FeedbackRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl FeedbackRepository for SqlxFeedbackRepository {
    async fn create_comment(&self, lesson_id: i64, user_id: i64, content: &str) -> Result<Comment> {
        let now = Utc::now();
        let sql = "INSERT INTO comments (lesson_id, user_id, content, created_at) VALUES (?, ?, ?, ?)";
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(lesson_id)
                .bind(user_id)
                .bind(content)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create comment")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(lesson_id)
                .bind(user_id)
                .bind(content)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create comment")?
                .last_insert_id() as i64,
        };
        self.get_comment(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Comment not found after insert"))
    }

    async fn get_comment(&self, id: i64) -> Result<Option<Comment>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_comment_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_comment_mysql(pool, id).await,
        }
    }

    async fn list_comments(&self, lesson_id: i64) -> Result<Vec<Comment>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_comments_sqlite(pool, lesson_id).await,
            Backend::Mysql(pool) => list_comments_mysql(pool, lesson_id).await,
        }
    }

    async fn delete_comment(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn create_report(&self, lesson_id: i64, user_id: i64, reason: &str) -> Result<Report> {
        let now = Utc::now();
        let sql = "INSERT INTO reports (lesson_id, user_id, reason, created_at) VALUES (?, ?, ?, ?)";
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(lesson_id)
                .bind(user_id)
                .bind(reason)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create report")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(lesson_id)
                .bind(user_id)
                .bind(reason)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create report")?
                .last_insert_id() as i64,
        };
        Ok(Report {
            id,
            lesson_id,
            user_id,
            reason: reason.to_string(),
            created_at: now,
        })
    }

    async fn list_reports(&self, lesson_id: Option<i64>) -> Result<Vec<Report>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_reports_sqlite(pool, lesson_id).await,
            Backend::Mysql(pool) => list_reports_mysql(pool, lesson_id).await,
        }
    }

    async fn delete_report(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query("DELETE FROM reports WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete report")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query("DELETE FROM reports WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete report")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_comment_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query(
        "SELECT id, lesson_id, user_id, content, created_at FROM comments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get comment")?;

    Ok(row.as_ref().map(row_to_comment_sqlite))
}

async fn list_comments_sqlite(pool: &SqlitePool, lesson_id: i64) -> Result<Vec<Comment>> {
    let rows = sqlx::query(
        "SELECT id, lesson_id, user_id, content, created_at FROM comments WHERE lesson_id = ? ORDER BY id",
    )
    .bind(lesson_id)
    .fetch_all(pool)
    .await
    .context("Failed to list comments")?;

    Ok(rows.iter().map(row_to_comment_sqlite).collect())
}

async fn list_reports_sqlite(pool: &SqlitePool, lesson_id: Option<i64>) -> Result<Vec<Report>> {
    let rows = sqlx::query(
        "SELECT id, lesson_id, user_id, reason, created_at FROM reports \
         WHERE (? IS NULL OR lesson_id = ?) ORDER BY id",
    )
    .bind(lesson_id)
    .bind(lesson_id)
    .fetch_all(pool)
    .await
    .context("Failed to list reports")?;

    Ok(rows.iter().map(row_to_report_sqlite).collect())
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        lesson_id: row.get("lesson_id"),
        user_id: row.get("user_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

fn row_to_report_sqlite(row: &sqlx::sqlite::SqliteRow) -> Report {
    Report {
        id: row.get("id"),
        lesson_id: row.get("lesson_id"),
        user_id: row.get("user_id"),
        reason: row.get("reason"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_comment_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query(
        "SELECT id, lesson_id, user_id, content, created_at FROM comments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get comment")?;

    Ok(row.as_ref().map(row_to_comment_mysql))
}

async fn list_comments_mysql(pool: &MySqlPool, lesson_id: i64) -> Result<Vec<Comment>> {
    let rows = sqlx::query(
        "SELECT id, lesson_id, user_id, content, created_at FROM comments WHERE lesson_id = ? ORDER BY id",
    )
    .bind(lesson_id)
    .fetch_all(pool)
    .await
    .context("Failed to list comments")?;

    Ok(rows.iter().map(row_to_comment_mysql).collect())
}

async fn list_reports_mysql(pool: &MySqlPool, lesson_id: Option<i64>) -> Result<Vec<Report>> {
    let rows = sqlx::query(
        "SELECT id, lesson_id, user_id, reason, created_at FROM reports \
         WHERE (? IS NULL OR lesson_id = ?) ORDER BY id",
    )
    .bind(lesson_id)
    .bind(lesson_id)
    .fetch_all(pool)
    .await
    .context("Failed to list reports")?;

    Ok(rows.iter().map(row_to_report_mysql).collect())
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Comment {
    Comment {
        id: row.get("id"),
        lesson_id: row.get("lesson_id"),
        user_id: row.get("user_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

fn row_to_report_mysql(row: &sqlx::mysql::MySqlRow) -> Report {
    Report {
        id: row.get("id"),
        lesson_id: row.get("lesson_id"),
        user_id: row.get("user_id"),
        reason: row.get("reason"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::course::sample_course_input;
    use crate::db::repositories::lesson::sample_lesson_input;
    use crate::db::repositories::{
        CourseRepository, LessonRepository, SqlxCourseRepository, SqlxLessonRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{NewUser, UserType};

    async fn setup() -> (SqlxFeedbackRepository, SqlxLessonRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let users = SqlxUserRepository::new(pool.clone());
        let tutor = users
            .create(&NewUser::new("t@x.com", "T", UserType::Teacher, "h"))
            .await
            .unwrap();
        let course = SqlxCourseRepository::new(pool.clone())
            .create(&sample_course_input("Course", tutor.id))
            .await
            .unwrap();
        let lessons = SqlxLessonRepository::new(pool.clone());
        let lesson = lessons
            .create(&sample_lesson_input(course.id, "L", None))
            .await
            .unwrap();
        (SqlxFeedbackRepository::new(pool), lessons, lesson.id, tutor.id)
    }

    #[tokio::test]
    async fn test_comments() {
        let (repo, _lessons, lesson_id, user_id) = setup().await;

        let first = repo.create_comment(lesson_id, user_id, "Great").await.unwrap();
        repo.create_comment(lesson_id, user_id, "Thanks").await.unwrap();

        assert_eq!(first.content, "Great");
        assert_eq!(repo.get_comment(first.id).await.unwrap(), Some(first.clone()));

        let all = repo.list_comments(lesson_id).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].content, "Thanks");

        assert!(repo.delete_comment(first.id).await.unwrap());
        assert!(!repo.delete_comment(first.id).await.unwrap());
        assert_eq!(repo.list_comments(lesson_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reports() {
        let (repo, _lessons, lesson_id, user_id) = setup().await;

        let report = repo.create_report(lesson_id, user_id, "Broken video").await.unwrap();
        assert_eq!(report.reason, "Broken video");

        assert_eq!(repo.list_reports(Some(lesson_id)).await.unwrap().len(), 1);
        assert_eq!(repo.list_reports(None).await.unwrap().len(), 1);
        assert!(repo.list_reports(Some(999)).await.unwrap().is_empty());

        assert!(repo.delete_report(report.id).await.unwrap());
        assert!(repo.list_reports(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_feedback_removed_with_lesson() {
        let (repo, lessons, lesson_id, user_id) = setup().await;
        repo.create_comment(lesson_id, user_id, "bye").await.unwrap();
        repo.create_report(lesson_id, user_id, "spam").await.unwrap();

        lessons.delete(lesson_id).await.unwrap();

        assert!(repo.list_comments(lesson_id).await.unwrap().is_empty());
        assert!(repo.list_reports(None).await.unwrap().is_empty());
    }
}
