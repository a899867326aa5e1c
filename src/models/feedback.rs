//! Lesson comments and abuse reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A comment left on a lesson.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: i64,
    #[serde(rename = "lesson")]
    pub lesson_id: i64,
    #[serde(rename = "user")]
    pub user_id: i64,
    pub content: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A report flagging a lesson for review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub id: i64,
    #[serde(rename = "lesson")]
    pub lesson_id: i64,
    #[serde(rename = "user")]
    pub user_id: i64,
    pub reason: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}
