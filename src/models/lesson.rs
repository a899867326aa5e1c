//! Lesson model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::feedback::{Comment, Report};

/// A lesson inside a course.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lesson {
    pub id: i64,
    pub title: String,
    #[serde(rename = "course")]
    pub course_id: i64,
    pub description: String,
    #[serde(rename = "videoURL")]
    pub video_url: String,
    /// Length in minutes
    pub duration: i32,
    /// Position within the course; unordered lessons sort last
    pub order: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A lesson with likes, comments and reports attached.
#[derive(Debug, Clone, Serialize)]
pub struct LessonDetail {
    #[serde(flatten)]
    pub lesson: Lesson,
    /// Ids of users who liked the lesson
    pub likes: Vec<i64>,
    pub comments: Vec<Comment>,
    pub reports: Vec<Report>,
}

/// Writable lesson fields
#[derive(Debug, Clone)]
pub struct LessonInput {
    pub title: String,
    pub course_id: i64,
    pub description: String,
    pub video_url: String,
    pub duration: i32,
    pub order: Option<i32>,
}

impl LessonInput {
    pub fn from_lesson(lesson: &Lesson) -> Self {
        Self {
            title: lesson.title.clone(),
            course_id: lesson.course_id,
            description: lesson.description.clone(),
            video_url: lesson.video_url.clone(),
            duration: lesson.duration,
            order: lesson.order,
        }
    }
}
