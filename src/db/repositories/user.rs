//! User repository
//!
//! Database operations for users and their course enrollments.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::{NewUser, ProfileUpdate, User, UserType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const USER_COLUMNS: &str = "id, email, name, user_type, password_hash, is_active, is_admin, \
    is_blocked, phone, about, website, last_name, age, address, created_at, updated_at";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user and return it with its assigned id
    async fn create(&self, user: &NewUser) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Exact match on the stored (normalized) email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// All users of one account type, oldest first
    async fn list_by_type(&self, user_type: UserType) -> Result<Vec<User>>;

    /// Overwrite the editable profile fields
    async fn update_profile(&self, id: i64, profile: &ProfileUpdate) -> Result<Option<User>>;

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()>;

    /// Returns false when no such user exists
    async fn set_blocked(&self, id: i64, blocked: bool) -> Result<bool>;

    /// Returns false when no such user exists
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count(&self) -> Result<i64>;

    /// Add a course to the user's enrollments; enrolling twice is a no-op
    async fn enroll(&self, user_id: i64, course_id: i64) -> Result<()>;

    async fn unenroll(&self, user_id: i64, course_id: i64) -> Result<()>;

    async fn is_enrolled(&self, user_id: i64, course_id: i64) -> Result<bool>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &NewUser) -> Result<User> {
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => create_user_sqlite(pool, user).await?,
            Backend::Mysql(pool) => create_user_mysql(pool, user).await?,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => fetch_user_sqlite(pool, &sql, id).await,
            Backend::Mysql(pool) => fetch_user_mysql(pool, &sql, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => fetch_user_sqlite(pool, &sql, email.to_string()).await,
            Backend::Mysql(pool) => fetch_user_mysql(pool, &sql, email.to_string()).await,
        }
    }

    async fn list_by_type(&self, user_type: UserType) -> Result<Vec<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_users_by_type_sqlite(pool, user_type).await,
            Backend::Mysql(pool) => list_users_by_type_mysql(pool, user_type).await,
        }
    }

    async fn update_profile(&self, id: i64, profile: &ProfileUpdate) -> Result<Option<User>> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => update_profile_sqlite(pool, id, profile).await?,
            Backend::Mysql(pool) => update_profile_mysql(pool, id, profile).await?,
        };
        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let sql = "UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sql)
                    .bind(password_hash)
                    .bind(Utc::now())
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to update password")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql)
                    .bind(password_hash)
                    .bind(Utc::now())
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to update password")?;
            }
        }
        Ok(())
    }

    async fn set_blocked(&self, id: i64, blocked: bool) -> Result<bool> {
        let sql = "UPDATE users SET is_blocked = ?, updated_at = ? WHERE id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(blocked)
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update block status")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(blocked)
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update block status")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete user")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete user")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM users";
        let count = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .fetch_one(pool)
                .await
                .context("Failed to count users")?
                .get("count"),
            Backend::Mysql(pool) => sqlx::query(sql)
                .fetch_one(pool)
                .await
                .context("Failed to count users")?
                .get("count"),
        };
        Ok(count)
    }

    async fn enroll(&self, user_id: i64, course_id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(
                    "INSERT OR IGNORE INTO user_enrolled_courses (user_id, course_id) VALUES (?, ?)",
                )
                .bind(user_id)
                .bind(course_id)
                .execute(pool)
                .await
                .context("Failed to enroll user")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(
                    "INSERT IGNORE INTO user_enrolled_courses (user_id, course_id) VALUES (?, ?)",
                )
                .bind(user_id)
                .bind(course_id)
                .execute(pool)
                .await
                .context("Failed to enroll user")?;
            }
        }
        Ok(())
    }

    async fn unenroll(&self, user_id: i64, course_id: i64) -> Result<()> {
        let sql = "DELETE FROM user_enrolled_courses WHERE user_id = ? AND course_id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sql)
                    .bind(user_id)
                    .bind(course_id)
                    .execute(pool)
                    .await
                    .context("Failed to unenroll user")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql)
                    .bind(user_id)
                    .bind(course_id)
                    .execute(pool)
                    .await
                    .context("Failed to unenroll user")?;
            }
        }
        Ok(())
    }

    async fn is_enrolled(&self, user_id: i64, course_id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) AS count FROM user_enrolled_courses WHERE user_id = ? AND course_id = ?";
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(user_id)
                .bind(course_id)
                .fetch_one(pool)
                .await
                .context("Failed to check enrollment")?
                .get("count"),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(user_id)
                .bind(course_id)
                .fetch_one(pool)
                .await
                .context("Failed to check enrollment")?
                .get("count"),
        };
        Ok(count > 0)
    }
}

fn parse_user_type(value: Option<String>) -> Result<Option<UserType>> {
    value
        .filter(|s| !s.is_empty())
        .map(|s| {
            UserType::from_str(&s).with_context(|| format!("Invalid user type in database: {}", s))
        })
        .transpose()
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &NewUser) -> Result<i64> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, name, user_type, password_hash, is_admin, phone, age, address, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.name)
    .bind(user.user_type.map(|t| t.to_string()))
    .bind(&user.password_hash)
    .bind(user.is_admin)
    .bind(&user.phone)
    .bind(user.age)
    .bind(&user.address)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(result.last_insert_rowid())
}

async fn fetch_user_sqlite<'q, K>(pool: &SqlitePool, sql: &'q str, key: K) -> Result<Option<User>>
where
    K: 'q + Send + sqlx::Encode<'q, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    let row = sqlx::query(sql)
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;

    row.map(|row| row_to_user_sqlite(&row)).transpose()
}

async fn list_users_by_type_sqlite(pool: &SqlitePool, user_type: UserType) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM users WHERE user_type = ? ORDER BY id",
        USER_COLUMNS
    ))
    .bind(user_type.to_string())
    .fetch_all(pool)
    .await
    .context("Failed to list users")?;

    rows.iter().map(row_to_user_sqlite).collect()
}

async fn update_profile_sqlite(pool: &SqlitePool, id: i64, p: &ProfileUpdate) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET email = ?, name = ?, about = ?, address = ?, age = ?, last_name = ?, phone = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&p.email)
    .bind(&p.name)
    .bind(&p.about)
    .bind(&p.address)
    .bind(p.age)
    .bind(&p.last_name)
    .bind(&p.phone)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    Ok(result.rows_affected())
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        user_type: parse_user_type(row.get("user_type"))?,
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
        is_admin: row.get("is_admin"),
        is_blocked: row.get("is_blocked"),
        phone: row.get("phone"),
        about: row.get("about"),
        website: row.get("website"),
        last_name: row.get("last_name"),
        age: row.get("age"),
        address: row.get("address"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &NewUser) -> Result<i64> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, name, user_type, password_hash, is_admin, phone, age, address, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.name)
    .bind(user.user_type.map(|t| t.to_string()))
    .bind(&user.password_hash)
    .bind(user.is_admin)
    .bind(&user.phone)
    .bind(user.age)
    .bind(&user.address)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(result.last_insert_id() as i64)
}

async fn fetch_user_mysql<'q, K>(pool: &MySqlPool, sql: &'q str, key: K) -> Result<Option<User>>
where
    K: 'q + Send + sqlx::Encode<'q, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
{
    let row = sqlx::query(sql)
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;

    row.map(|row| row_to_user_mysql(&row)).transpose()
}

async fn list_users_by_type_mysql(pool: &MySqlPool, user_type: UserType) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM users WHERE user_type = ? ORDER BY id",
        USER_COLUMNS
    ))
    .bind(user_type.to_string())
    .fetch_all(pool)
    .await
    .context("Failed to list users")?;

    rows.iter().map(row_to_user_mysql).collect()
}

async fn update_profile_mysql(pool: &MySqlPool, id: i64, p: &ProfileUpdate) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET email = ?, name = ?, about = ?, address = ?, age = ?, last_name = ?, phone = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&p.email)
    .bind(&p.name)
    .bind(&p.about)
    .bind(&p.address)
    .bind(p.age)
    .bind(&p.last_name)
    .bind(&p.phone)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    // MySQL reports zero affected rows when nothing changed, so check existence separately.
    if result.rows_affected() == 0 {
        let exists: i64 = sqlx::query("SELECT COUNT(*) AS count FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await?
            .get("count");
        return Ok(exists as u64);
    }
    Ok(result.rows_affected())
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        user_type: parse_user_type(row.get("user_type"))?,
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
        is_admin: row.get("is_admin"),
        is_blocked: row.get("is_blocked"),
        phone: row.get("phone"),
        about: row.get("about"),
        website: row.get("website"),
        last_name: row.get("last_name"),
        age: row.get("age"),
        address: row.get("address"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxUserRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxUserRepository::new(pool.clone());
        (pool, repo)
    }

    async fn insert_course(pool: &DynDatabasePool, tutor_id: i64, title: &str) -> i64 {
        sqlx::query(
            "INSERT INTO courses (title, tutor_id, about, tagline, category, thumbnail, price_cents, created_at, updated_at) \
             VALUES (?, ?, 'a', 't', 'c', 'x', 100, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
        )
        .bind(title)
        .bind(tutor_id)
        .execute(pool.as_sqlite().unwrap())
        .await
        .unwrap()
        .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let (_pool, repo) = setup_test_repo().await;
        let mut new = NewUser::new("Ann@Example.COM", "Ann", UserType::Student, "hash");
        new.phone = Some("555".to_string());

        let created = repo.create(&new).await.expect("Failed to create user");
        assert!(created.id > 0);
        assert_eq!(created.email, "Ann@example.com");
        assert_eq!(created.user_type, Some(UserType::Student));
        assert!(created.is_active);
        assert!(!created.is_admin);
        assert!(!created.is_blocked);
        assert_eq!(created.phone.as_deref(), Some("555"));

        let by_id = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, created.email);

        let by_email = repo.get_by_email("Ann@example.com").await.unwrap();
        assert!(by_email.is_some());
        assert!(repo.get_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&NewUser::new("a@b.com", "A", UserType::Student, "h"))
            .await
            .unwrap();

        let result = repo
            .create(&NewUser::new("a@b.com", "B", UserType::Teacher, "h"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_by_type() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&NewUser::new("s1@x.com", "S1", UserType::Student, "h")).await.unwrap();
        repo.create(&NewUser::new("t1@x.com", "T1", UserType::Teacher, "h")).await.unwrap();
        repo.create(&NewUser::new("s2@x.com", "S2", UserType::Student, "h")).await.unwrap();

        let students = repo.list_by_type(UserType::Student).await.unwrap();
        assert_eq!(students.len(), 2);
        assert_eq!(students[0].name, "S1");

        let teachers = repo.list_by_type(UserType::Teacher).await.unwrap();
        assert_eq!(teachers.len(), 1);
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_profile_and_password() {
        let (_pool, repo) = setup_test_repo().await;
        let user = repo
            .create(&NewUser::new("p@x.com", "P", UserType::Student, "old"))
            .await
            .unwrap();

        let mut update = ProfileUpdate::from_user(&user);
        update.name = "Pat".to_string();
        update.age = Some(30);
        update.about = Some("hello".to_string());

        let updated = repo.update_profile(user.id, &update).await.unwrap().unwrap();
        assert_eq!(updated.name, "Pat");
        assert_eq!(updated.age, Some(30));
        assert_eq!(updated.about.as_deref(), Some("hello"));

        repo.update_password(user.id, "new").await.unwrap();
        let reloaded = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_hash, "new");

        assert!(repo.update_profile(999, &update).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_blocked_and_delete() {
        let (_pool, repo) = setup_test_repo().await;
        let user = repo
            .create(&NewUser::new("b@x.com", "B", UserType::Student, "h"))
            .await
            .unwrap();

        assert!(repo.set_blocked(user.id, true).await.unwrap());
        assert!(repo.get_by_id(user.id).await.unwrap().unwrap().is_blocked);
        assert!(!repo.set_blocked(999, true).await.unwrap());

        assert!(repo.delete(user.id).await.unwrap());
        assert!(repo.get_by_id(user.id).await.unwrap().is_none());
        assert!(!repo.delete(user.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_enrollment() {
        let (pool, repo) = setup_test_repo().await;
        let tutor = repo
            .create(&NewUser::new("t@x.com", "T", UserType::Teacher, "h"))
            .await
            .unwrap();
        let student = repo
            .create(&NewUser::new("s@x.com", "S", UserType::Student, "h"))
            .await
            .unwrap();
        let course = insert_course(&pool, tutor.id, "Rust").await;

        assert!(!repo.is_enrolled(student.id, course).await.unwrap());

        repo.enroll(student.id, course).await.unwrap();
        repo.enroll(student.id, course).await.unwrap();
        assert!(repo.is_enrolled(student.id, course).await.unwrap());

        repo.unenroll(student.id, course).await.unwrap();
        assert!(!repo.is_enrolled(student.id, course).await.unwrap());
    }
}
