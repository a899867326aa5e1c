//! User model
//!
//! Accounts for students, teachers and administrators. The email address is the
//! login name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Email address (unique, domain lowercased)
    pub email: String,
    pub name: String,
    /// Account kind; accounts created outside registration may have none
    pub user_type: Option<UserType>,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    /// Staff flag granting access to the admin endpoints
    pub is_admin: bool,
    /// Blocked accounts cannot sign in
    pub is_blocked: bool,
    pub phone: Option<String>,
    pub about: Option<String>,
    pub website: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_teacher(&self) -> bool {
        self.user_type == Some(UserType::Teacher)
    }

    pub fn is_student(&self) -> bool {
        self.user_type == Some(UserType::Student)
    }

    /// Admins may manage anything; everyone else only what they own.
    pub fn can_manage(&self, owner_id: i64) -> bool {
        self.is_admin || self.id == owner_id
    }

    /// Whether this account may sign in
    pub fn can_login(&self) -> bool {
        self.is_active && !self.is_blocked
    }
}

/// Whoever performs a write: a signed-in user, or the cookie-based admin
/// session which has no account behind it.
#[derive(Debug, Clone)]
pub enum Actor {
    Admin,
    User(User),
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        match self {
            Actor::Admin => true,
            Actor::User(user) => user.is_admin,
        }
    }

    pub fn can_manage(&self, owner_id: i64) -> bool {
        match self {
            Actor::Admin => true,
            Actor::User(user) => user.can_manage(owner_id),
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Actor::Admin => None,
            Actor::User(user) => Some(user),
        }
    }
}

impl From<User> for Actor {
    fn from(user: User) -> Self {
        Actor::User(user)
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Actor::User(user.clone())
    }
}

/// Kind of account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Admin,
    Teacher,
    Student,
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserType::Admin => write!(f, "admin"),
            UserType::Teacher => write!(f, "teacher"),
            UserType::Student => write!(f, "student"),
        }
    }
}

impl FromStr for UserType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserType::Admin),
            "teacher" => Ok(UserType::Teacher),
            "student" => Ok(UserType::Student),
            _ => Err(anyhow::anyhow!("Invalid user type: {}", s)),
        }
    }
}

/// Lowercase the domain part of an email address, leaving the local part as typed.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

/// Row data for inserting a user. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub user_type: Option<UserType>,
    pub password_hash: String,
    pub is_admin: bool,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub address: Option<String>,
}

impl NewUser {
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        user_type: UserType,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            email: normalize_email(&email.into()),
            name: name.into(),
            user_type: Some(user_type),
            password_hash: password_hash.into(),
            is_admin: false,
            phone: None,
            age: None,
            address: None,
        }
    }
}

/// Editable profile fields. `None` leaves optional columns cleared, matching a full PUT.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: String,
    pub name: String,
    pub about: Option<String>,
    pub address: Option<String>,
    pub age: Option<i32>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl ProfileUpdate {
    /// Snapshot of the user's current profile, used as the base for partial edits
    pub fn from_user(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            name: user.name.clone(),
            about: user.about.clone(),
            address: user.address.clone(),
            age: user.age,
            last_name: user.last_name.clone(),
            phone: user.phone.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_user(id: i64, user_type: UserType) -> User {
    let now = Utc::now();
    User {
        id,
        email: format!("user{}@example.com", id),
        name: format!("User {}", id),
        user_type: Some(user_type),
        password_hash: "hash".to_string(),
        is_active: true,
        is_admin: user_type == UserType::Admin,
        is_blocked: false,
        phone: None,
        about: None,
        website: None,
        last_name: None,
        age: None,
        address: None,
        created_at: now,
        updated_at: now,
    }
}
