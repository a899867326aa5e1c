//! Course model
//!
//! A course belongs to one tutor (a teacher-role user) and owns its lessons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::lesson::LessonDetail;
use super::price::Price;

/// A course as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Course {
    pub id: i64,
    /// Title (unique)
    pub title: String,
    pub about: String,
    pub tagline: String,
    /// Owning tutor's user id
    #[serde(rename = "tutor")]
    pub tutor_id: i64,
    /// Free-text category label
    pub category: String,
    pub difficulty: Option<Difficulty>,
    pub thumbnail: String,
    pub price: Price,
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A course with its lessons nested, as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub lessons: Vec<LessonDetail>,
}

/// Course difficulty level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Beginner => write!(f, "beginner"),
            Difficulty::Intermediate => write!(f, "intermediate"),
            Difficulty::Advanced => write!(f, "advanced"),
            Difficulty::Expert => write!(f, "expert"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            "expert" => Ok(Difficulty::Expert),
            _ => Err(anyhow::anyhow!("Invalid difficulty: {}", s)),
        }
    }
}

/// Writable course fields
#[derive(Debug, Clone)]
pub struct CourseInput {
    pub title: String,
    pub tutor_id: i64,
    pub about: String,
    pub tagline: String,
    pub category: String,
    pub difficulty: Option<Difficulty>,
    pub thumbnail: String,
    pub price: Price,
    pub is_visible: bool,
}

impl CourseInput {
    /// Current values of a stored course, the base for partial updates
    pub fn from_course(course: &Course) -> Self {
        Self {
            title: course.title.clone(),
            tutor_id: course.tutor_id,
            about: course.about.clone(),
            tagline: course.tagline.clone(),
            category: course.category.clone(),
            difficulty: course.difficulty,
            thumbnail: course.thumbnail.clone(),
            price: course.price,
            is_visible: course.is_visible,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_roundtrip() {
        for d in [
            Difficulty::Beginner,
            Difficulty::Intermediate,
            Difficulty::Advanced,
            Difficulty::Expert,
        ] {
            assert_eq!(Difficulty::from_str(&d.to_string()).unwrap(), d);
        }
        assert!(Difficulty::from_str("trivial").is_err());
    }

    #[test]
    fn test_course_wire_names() {
        let now = Utc::now();
        let course = Course {
            id: 3,
            title: "Rust".to_string(),
            about: "a".to_string(),
            tagline: "t".to_string(),
            tutor_id: 9,
            category: "dev".to_string(),
            difficulty: Some(Difficulty::Expert),
            thumbnail: "x.png".to_string(),
            price: Price::from_cents(4999),
            is_visible: true,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(CourseDetail {
            course,
            lessons: vec![],
        })
        .unwrap();

        assert_eq!(json["tutor"], 9);
        assert_eq!(json["price"], "49.99");
        assert_eq!(json["difficulty"], "expert");
        assert!(json["lessons"].as_array().unwrap().is_empty());
    }
}
