//! Course repository
//!
//! Database operations for courses. Lessons are stored separately and looked up
//! by `course_id`; deleting a course cascades to them.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Course, CourseInput, Difficulty, Price};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const COURSE_COLUMNS: &str = "c.id, c.title, c.tutor_id, c.about, c.tagline, c.category, \
    c.difficulty, c.thumbnail, c.price_cents, c.is_visible, c.created_at, c.updated_at";

/// Course repository trait
#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn create(&self, input: &CourseInput) -> Result<Course>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>>;

    async fn get_by_title(&self, title: &str) -> Result<Option<Course>>;

    /// All courses, optionally restricted to one tutor, ordered by id
    async fn list(&self, tutor_id: Option<i64>) -> Result<Vec<Course>>;

    /// Courses the user is enrolled in
    async fn list_enrolled(&self, user_id: i64) -> Result<Vec<Course>>;

    /// Returns `None` if the course does not exist
    async fn update(&self, id: i64, input: &CourseInput) -> Result<Option<Course>>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based course repository implementation
pub struct SqlxCourseRepository {
    pool: DynDatabasePool,
}

impl SqlxCourseRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CourseRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CourseRepository for SqlxCourseRepository {
    async fn create(&self, input: &CourseInput) -> Result<Course> {
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => create_course_sqlite(pool, input).await?,
            Backend::Mysql(pool) => create_course_mysql(pool, input).await?,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Course not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>> {
        let sql = format!("SELECT {} FROM courses c WHERE c.id = ?", COURSE_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get course by ID")?;
                row.as_ref().map(row_to_course_sqlite).transpose()
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get course by ID")?;
                row.as_ref().map(row_to_course_mysql).transpose()
            }
        }
    }

    async fn get_by_title(&self, title: &str) -> Result<Option<Course>> {
        let sql = format!("SELECT {} FROM courses c WHERE c.title = ?", COURSE_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(title)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get course by title")?;
                row.as_ref().map(row_to_course_sqlite).transpose()
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(title)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get course by title")?;
                row.as_ref().map(row_to_course_mysql).transpose()
            }
        }
    }

    async fn list(&self, tutor_id: Option<i64>) -> Result<Vec<Course>> {
        let sql = format!(
            "SELECT {} FROM courses c WHERE (? IS NULL OR c.tutor_id = ?) ORDER BY c.id",
            COURSE_COLUMNS
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(tutor_id)
                    .bind(tutor_id)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list courses")?;
                rows.iter().map(row_to_course_sqlite).collect()
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(tutor_id)
                    .bind(tutor_id)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list courses")?;
                rows.iter().map(row_to_course_mysql).collect()
            }
        }
    }

    async fn list_enrolled(&self, user_id: i64) -> Result<Vec<Course>> {
        let sql = format!(
            r#"
            SELECT {} FROM courses c
            INNER JOIN user_enrolled_courses e ON e.course_id = c.id
            WHERE e.user_id = ?
            ORDER BY c.id
            "#,
            COURSE_COLUMNS
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list enrolled courses")?;
                rows.iter().map(row_to_course_sqlite).collect()
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list enrolled courses")?;
                rows.iter().map(row_to_course_mysql).collect()
            }
        }
    }

    async fn update(&self, id: i64, input: &CourseInput) -> Result<Option<Course>> {
        if self.get_by_id(id).await?.is_none() {
            return Ok(None);
        }
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_course_sqlite(pool, id, input).await?,
            Backend::Mysql(pool) => update_course_mysql(pool, id, input).await?,
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query("DELETE FROM courses WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete course")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query("DELETE FROM courses WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete course")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

fn parse_difficulty(value: Option<String>) -> Result<Option<Difficulty>> {
    value
        .filter(|s| !s.is_empty())
        .map(|s| {
            Difficulty::from_str(&s)
                .with_context(|| format!("Invalid difficulty in database: {}", s))
        })
        .transpose()
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_course_sqlite(pool: &SqlitePool, input: &CourseInput) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO courses (title, tutor_id, about, tagline, category, difficulty, thumbnail,
                             price_cents, is_visible, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(input.tutor_id)
    .bind(&input.about)
    .bind(&input.tagline)
    .bind(&input.category)
    .bind(input.difficulty.map(|d| d.to_string()))
    .bind(&input.thumbnail)
    .bind(input.price.cents())
    .bind(input.is_visible)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create course")?;

    Ok(result.last_insert_rowid())
}

async fn update_course_sqlite(pool: &SqlitePool, id: i64, input: &CourseInput) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE courses
        SET title = ?, tutor_id = ?, about = ?, tagline = ?, category = ?, difficulty = ?,
            thumbnail = ?, price_cents = ?, is_visible = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.title)
    .bind(input.tutor_id)
    .bind(&input.about)
    .bind(&input.tagline)
    .bind(&input.category)
    .bind(input.difficulty.map(|d| d.to_string()))
    .bind(&input.thumbnail)
    .bind(input.price.cents())
    .bind(input.is_visible)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update course")?;
    Ok(())
}

fn row_to_course_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Course> {
    Ok(Course {
        id: row.get("id"),
        title: row.get("title"),
        about: row.get("about"),
        tagline: row.get("tagline"),
        tutor_id: row.get("tutor_id"),
        category: row.get("category"),
        difficulty: parse_difficulty(row.get("difficulty"))?,
        thumbnail: row.get("thumbnail"),
        price: Price::from_cents(row.get("price_cents")),
        is_visible: row.get("is_visible"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_course_mysql(pool: &MySqlPool, input: &CourseInput) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO courses (title, tutor_id, about, tagline, category, difficulty, thumbnail,
                             price_cents, is_visible, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(input.tutor_id)
    .bind(&input.about)
    .bind(&input.tagline)
    .bind(&input.category)
    .bind(input.difficulty.map(|d| d.to_string()))
    .bind(&input.thumbnail)
    .bind(input.price.cents())
    .bind(input.is_visible)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create course")?;

    Ok(result.last_insert_id() as i64)
}

async fn update_course_mysql(pool: &MySqlPool, id: i64, input: &CourseInput) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE courses
        SET title = ?, tutor_id = ?, about = ?, tagline = ?, category = ?, difficulty = ?,
            thumbnail = ?, price_cents = ?, is_visible = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.title)
    .bind(input.tutor_id)
    .bind(&input.about)
    .bind(&input.tagline)
    .bind(&input.category)
    .bind(input.difficulty.map(|d| d.to_string()))
    .bind(&input.thumbnail)
    .bind(input.price.cents())
    .bind(input.is_visible)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update course")?;
    Ok(())
}

fn row_to_course_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Course> {
    Ok(Course {
        id: row.get("id"),
        title: row.get("title"),
        about: row.get("about"),
        tagline: row.get("tagline"),
        tutor_id: row.get("tutor_id"),
        category: row.get("category"),
        difficulty: parse_difficulty(row.get("difficulty"))?,
        thumbnail: row.get("thumbnail"),
        price: Price::from_cents(row.get("price_cents")),
        is_visible: row.get("is_visible"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
pub(crate) fn sample_course_input(title: &str, tutor_id: i64) -> CourseInput {
    CourseInput {
        title: title.to_string(),
        tutor_id,
        about: "About the course".to_string(),
        tagline: "Learn fast".to_string(),
        category: "Programming".to_string(),
        difficulty: Some(Difficulty::Beginner),
        thumbnail: "https://cdn.example.com/thumb.png".to_string(),
        price: Price::from_cents(4999),
        is_visible: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{NewUser, UserType};

    async fn setup() -> (SqlxCourseRepository, SqlxUserRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let users = SqlxUserRepository::new(pool.clone());
        let tutor = users
            .create(&NewUser::new("tutor@x.com", "Tutor", UserType::Teacher, "h"))
            .await
            .unwrap();
        (SqlxCourseRepository::new(pool), users, tutor.id)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (repo, _users, tutor) = setup().await;
        let course = repo.create(&sample_course_input("Rust", tutor)).await.unwrap();

        assert_eq!(course.title, "Rust");
        assert_eq!(course.tutor_id, tutor);
        assert_eq!(course.price, Price::from_cents(4999));
        assert_eq!(course.difficulty, Some(Difficulty::Beginner));
        assert!(course.is_visible);

        assert_eq!(repo.get_by_id(course.id).await.unwrap(), Some(course.clone()));
        assert!(repo.get_by_title("Rust").await.unwrap().is_some());
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_by_tutor() {
        let (repo, users, tutor) = setup().await;
        let other = users
            .create(&NewUser::new("other@x.com", "Other", UserType::Teacher, "h"))
            .await
            .unwrap();
        repo.create(&sample_course_input("A", tutor)).await.unwrap();
        repo.create(&sample_course_input("B", other.id)).await.unwrap();

        assert_eq!(repo.list(None).await.unwrap().len(), 2);
        let mine = repo.list(Some(tutor)).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "A");
    }

    #[tokio::test]
    async fn test_list_enrolled() {
        let (repo, users, tutor) = setup().await;
        let student = users
            .create(&NewUser::new("s@x.com", "S", UserType::Student, "h"))
            .await
            .unwrap();
        let a = repo.create(&sample_course_input("A", tutor)).await.unwrap();
        repo.create(&sample_course_input("B", tutor)).await.unwrap();

        users.enroll(student.id, a.id).await.unwrap();

        let enrolled = repo.list_enrolled(student.id).await.unwrap();
        assert_eq!(enrolled.len(), 1);
        assert_eq!(enrolled[0].id, a.id);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (repo, _users, tutor) = setup().await;
        let course = repo.create(&sample_course_input("Old", tutor)).await.unwrap();

        let mut input = CourseInput::from_course(&course);
        input.title = "New".to_string();
        input.difficulty = None;
        input.price = Price::from_cents(100);
        input.is_visible = false;

        let updated = repo.update(course.id, &input).await.unwrap().unwrap();
        assert_eq!(updated.title, "New");
        assert_eq!(updated.difficulty, None);
        assert_eq!(updated.price.to_string(), "1.00");
        assert!(!updated.is_visible);

        assert!(repo.update(999, &input).await.unwrap().is_none());
        assert!(repo.delete(course.id).await.unwrap());
        assert!(repo.get_by_id(course.id).await.unwrap().is_none());
    }
}
