//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A course category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    /// Display title (unique)
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable category fields
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub title: String,
    pub description: String,
}

impl CategoryInput {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}
