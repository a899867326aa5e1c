//! Course service
//!
//! Courses are owned by a teacher. Reads are public and include the nested
//! lessons; writes are limited to the owning tutor or an administrator.

use crate::db::repositories::{CourseRepository, UserRepository};
use crate::models::{Actor, Course, CourseDetail, CourseInput, Difficulty, Price, User};
use crate::services::lesson::{LessonService, LessonServiceError};
use crate::services::validation::{FieldErrors, REQUIRED};
use anyhow::Context;
use std::sync::Arc;

pub const TITLE_TAKEN: &str = "course with this title already exists.";
pub const NOT_A_TEACHER: &str = "Tutor must be a teacher.";

/// Error types for course service operations
#[derive(Debug, thiserror::Error)]
pub enum CourseServiceError {
    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    #[error("Course not found: {0}")]
    NotFound(i64),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<LessonServiceError> for CourseServiceError {
    fn from(e: LessonServiceError) -> Self {
        match e {
            LessonServiceError::ValidationError(errors) => CourseServiceError::ValidationError(errors),
            LessonServiceError::NotFound(id) => {
                CourseServiceError::InternalError(anyhow::anyhow!("Lesson {} vanished", id))
            }
            LessonServiceError::Forbidden(msg) => CourseServiceError::Forbidden(msg),
            LessonServiceError::InternalError(e) => CourseServiceError::InternalError(e),
        }
    }
}

/// Course fields as submitted. Missing required values become field errors.
#[derive(Debug, Clone, Default)]
pub struct CourseDraft {
    pub title: String,
    pub tutor: Option<i64>,
    pub about: String,
    pub tagline: String,
    pub category: String,
    pub difficulty: Option<Difficulty>,
    pub thumbnail: String,
    pub price: Option<Price>,
    pub is_visible: Option<bool>,
}

impl CourseDraft {
    pub fn from_course(course: &Course) -> Self {
        let input = CourseInput::from_course(course);
        Self {
            title: input.title,
            tutor: Some(input.tutor_id),
            about: input.about,
            tagline: input.tagline,
            category: input.category,
            difficulty: input.difficulty,
            thumbnail: input.thumbnail,
            price: Some(input.price),
            is_visible: Some(input.is_visible),
        }
    }
}

/// Course service
pub struct CourseService {
    courses: Arc<dyn CourseRepository>,
    users: Arc<dyn UserRepository>,
    lessons: Arc<LessonService>,
}

impl CourseService {
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        users: Arc<dyn UserRepository>,
        lessons: Arc<LessonService>,
    ) -> Self {
        Self {
            courses,
            users,
            lessons,
        }
    }

    /// All courses, or one tutor's, with lessons nested
    pub async fn list(&self, tutor_id: Option<i64>) -> Result<Vec<CourseDetail>, CourseServiceError> {
        let courses = self
            .courses
            .list(tutor_id)
            .await
            .context("Failed to list courses")?;
        self.details(courses).await
    }

    /// Courses the user is enrolled in
    pub async fn list_enrolled(&self, user: &User) -> Result<Vec<CourseDetail>, CourseServiceError> {
        let courses = self
            .courses
            .list_enrolled(user.id)
            .await
            .context("Failed to list enrolled courses")?;
        self.details(courses).await
    }

    pub async fn get(&self, id: i64) -> Result<CourseDetail, CourseServiceError> {
        let course = self.find(id).await?;
        self.detail(course).await
    }

    pub async fn create(&self, actor: &Actor, draft: CourseDraft) -> Result<CourseDetail, CourseServiceError> {
        let input = self.validate(draft, None).await?;
        if !actor.can_manage(input.tutor_id) {
            return Err(CourseServiceError::Forbidden(
                "Courses can only be created for yourself".to_string(),
            ));
        }
        let course = self
            .courses
            .create(&input)
            .await
            .context("Failed to create course")?;
        tracing::info!(course_id = course.id, tutor_id = course.tutor_id, "Created course {}", course.title);
        self.detail(course).await
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        draft: CourseDraft,
    ) -> Result<CourseDetail, CourseServiceError> {
        let existing = self.find(id).await?;
        self.ensure_can_manage(actor, &existing)?;

        let input = self.validate(draft, Some(id)).await?;
        if !actor.is_admin() && input.tutor_id != existing.tutor_id {
            return Err(CourseServiceError::Forbidden(
                "Only an administrator can reassign a course".to_string(),
            ));
        }
        let course = self
            .courses
            .update(id, &input)
            .await
            .context("Failed to update course")?
            .ok_or(CourseServiceError::NotFound(id))?;
        self.detail(course).await
    }

    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<(), CourseServiceError> {
        let existing = self.find(id).await?;
        self.ensure_can_manage(actor, &existing)?;
        self.courses
            .delete(id)
            .await
            .context("Failed to delete course")?;
        tracing::info!(course_id = id, "Deleted course");
        Ok(())
    }

    /// Whether `user` is enrolled in the course. Anonymous callers and unknown
    /// courses are never enrolled.
    pub async fn is_enrolled(&self, user: Option<&User>, course_id: i64) -> Result<bool, CourseServiceError> {
        let Some(user) = user else {
            return Ok(false);
        };
        if self
            .courses
            .get_by_id(course_id)
            .await
            .context("Failed to get course")?
            .is_none()
        {
            return Ok(false);
        }
        Ok(self
            .users
            .is_enrolled(user.id, course_id)
            .await
            .context("Failed to check enrollment")?)
    }

    async fn find(&self, id: i64) -> Result<Course, CourseServiceError> {
        self.courses
            .get_by_id(id)
            .await
            .context("Failed to get course")?
            .ok_or(CourseServiceError::NotFound(id))
    }

    async fn details(&self, courses: Vec<Course>) -> Result<Vec<CourseDetail>, CourseServiceError> {
        let mut out = Vec::with_capacity(courses.len());
        for course in courses {
            out.push(self.detail(course).await?);
        }
        Ok(out)
    }

    async fn detail(&self, course: Course) -> Result<CourseDetail, CourseServiceError> {
        let lessons = self.lessons.list(Some(course.id)).await?;
        Ok(CourseDetail { course, lessons })
    }

    fn ensure_can_manage(&self, actor: &Actor, course: &Course) -> Result<(), CourseServiceError> {
        if actor.can_manage(course.tutor_id) {
            Ok(())
        } else {
            Err(CourseServiceError::Forbidden(
                "Only the course tutor can change this course".to_string(),
            ))
        }
    }

    async fn validate(&self, draft: CourseDraft, current: Option<i64>) -> Result<CourseInput, CourseServiceError> {
        let mut errors = FieldErrors::new();
        let title = draft.title.trim().to_string();
        errors.check_text("title", &title, 255);
        errors.check_text("about", &draft.about, 10_000);
        errors.check_text("tagline", &draft.tagline, 255);
        errors.check_text("category", &draft.category, 255);
        errors.check_text("thumbnail", &draft.thumbnail, 255);
        if draft.price.is_none() {
            errors.add("price", REQUIRED);
        }

        match draft.tutor {
            None => errors.add("tutor", REQUIRED),
            Some(tutor_id) => {
                let tutor = self
                    .users
                    .get_by_id(tutor_id)
                    .await
                    .context("Failed to get tutor")?;
                match tutor {
                    None => errors.add(
                        "tutor",
                        format!("Invalid pk \"{}\" - object does not exist.", tutor_id),
                    ),
                    Some(tutor) if !tutor.is_teacher() => errors.add("tutor", NOT_A_TEACHER),
                    Some(_) => {}
                }
            }
        }

        if !title.is_empty() {
            let existing = self
                .courses
                .get_by_title(&title)
                .await
                .context("Failed to check course title")?;
            if existing.is_some_and(|c| Some(c.id) != current) {
                errors.add("title", TITLE_TAKEN);
            }
        }
        errors.into_result().map_err(CourseServiceError::ValidationError)?;

        Ok(CourseInput {
            title,
            tutor_id: draft.tutor.unwrap_or_default(),
            about: draft.about,
            tagline: draft.tagline,
            category: draft.category,
            difficulty: draft.difficulty,
            thumbnail: draft.thumbnail,
            price: draft.price.unwrap_or_default(),
            is_visible: draft.is_visible.unwrap_or(true),
        })
    }
}

#[cfg(test)]
pub(crate) fn test_course_service(pool: crate::db::DynDatabasePool) -> CourseService {
    use crate::db::repositories::{SqlxCourseRepository, SqlxUserRepository};

    CourseService::new(
        SqlxCourseRepository::boxed(pool.clone()),
        SqlxUserRepository::boxed(pool.clone()),
        Arc::new(crate::services::lesson::test_lesson_service(pool)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{NewUser, UserType};
    use crate::services::lesson::LessonDraft;

    struct Fixture {
        service: CourseService,
        lessons: LessonService,
        users: SqlxUserRepository,
        tutor: User,
        other_tutor: User,
        student: User,
        admin: User,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let users = SqlxUserRepository::new(pool.clone());
        let tutor = users
            .create(&NewUser::new("t1@x.com", "T1", UserType::Teacher, "h"))
            .await
            .unwrap();
        let other_tutor = users
            .create(&NewUser::new("t2@x.com", "T2", UserType::Teacher, "h"))
            .await
            .unwrap();
        let student = users
            .create(&NewUser::new("s@x.com", "S", UserType::Student, "h"))
            .await
            .unwrap();
        let mut admin = NewUser::new("root@x.com", "Root", UserType::Admin, "h");
        admin.is_admin = true;
        let admin = users.create(&admin).await.unwrap();
        Fixture {
            service: test_course_service(pool.clone()),
            lessons: crate::services::lesson::test_lesson_service(pool),
            users,
            tutor,
            other_tutor,
            student,
            admin,
        }
    }

    fn draft(title: &str, tutor: Option<i64>) -> CourseDraft {
        CourseDraft {
            title: title.to_string(),
            tutor,
            about: "All about it".to_string(),
            tagline: "Quick start".to_string(),
            category: "Programming".to_string(),
            difficulty: Some(Difficulty::Beginner),
            thumbnail: "https://cdn.example.com/t.png".to_string(),
            price: Some(Price::from_cents(1999)),
            is_visible: None,
        }
    }

    fn field_errors(result: Result<CourseDetail, CourseServiceError>) -> FieldErrors {
        match result {
            Err(CourseServiceError::ValidationError(errors)) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_with_nested_lessons() {
        let f = setup().await;
        let created = f
            .service
            .create(&Actor::from(&f.tutor), draft("Rust", Some(f.tutor.id)))
            .await
            .unwrap();
        assert!(created.course.is_visible);
        assert!(created.lessons.is_empty());

        f.lessons
            .create(
                &Actor::from(&f.tutor),
                LessonDraft {
                    title: "Intro".to_string(),
                    course: Some(created.course.id),
                    description: "Hello".to_string(),
                    video_url: "https://v.example.com/1".to_string(),
                    duration: 5,
                    order: Some(1),
                },
            )
            .await
            .unwrap();

        let fetched = f.service.get(created.course.id).await.unwrap();
        assert_eq!(fetched.lessons.len(), 1);
        assert_eq!(f.service.list(Some(f.tutor.id)).await.unwrap().len(), 1);
        assert!(f.service.list(Some(f.other_tutor.id)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validation() {
        let f = setup().await;
        let errors = field_errors(f.service.create(&Actor::from(&f.admin), draft("Rust", None)).await);
        assert_eq!(errors.get("tutor"), Some(&[REQUIRED.to_string()][..]));

        let errors = field_errors(f.service.create(&Actor::from(&f.admin), draft("Rust", Some(f.student.id))).await);
        assert_eq!(errors.get("tutor"), Some(&[NOT_A_TEACHER.to_string()][..]));

        let errors = field_errors(f.service.create(&Actor::from(&f.admin), draft("Rust", Some(999))).await);
        assert!(errors.get("tutor").is_some());

        let mut no_price = draft("Rust", Some(f.tutor.id));
        no_price.price = None;
        let errors = field_errors(f.service.create(&Actor::from(&f.tutor), no_price).await);
        assert_eq!(errors.get("price"), Some(&[REQUIRED.to_string()][..]));

        f.service.create(&Actor::from(&f.tutor), draft("Rust", Some(f.tutor.id))).await.unwrap();
        let errors = field_errors(f.service.create(&Actor::from(&f.tutor), draft("Rust", Some(f.tutor.id))).await);
        assert_eq!(errors.get("title"), Some(&[TITLE_TAKEN.to_string()][..]));
    }

    #[tokio::test]
    async fn test_ownership() {
        let f = setup().await;
        assert!(matches!(
            f.service.create(&Actor::from(&f.other_tutor), draft("Rust", Some(f.tutor.id))).await,
            Err(CourseServiceError::Forbidden(_))
        ));

        let course = f
            .service
            .create(&Actor::from(&f.tutor), draft("Rust", Some(f.tutor.id)))
            .await
            .unwrap()
            .course;

        let mut change = CourseDraft::from_course(&course);
        change.tagline = "Updated".to_string();
        assert!(matches!(
            f.service.update(&Actor::from(&f.other_tutor), course.id, change.clone()).await,
            Err(CourseServiceError::Forbidden(_))
        ));
        let updated = f.service.update(&Actor::from(&f.tutor), course.id, change).await.unwrap();
        assert_eq!(updated.course.tagline, "Updated");

        // Keeping its own title is not a conflict
        let unchanged = CourseDraft::from_course(&updated.course);
        assert!(f.service.update(&Actor::from(&f.tutor), course.id, unchanged).await.is_ok());

        assert!(matches!(
            f.service.delete(&Actor::from(&f.student), course.id).await,
            Err(CourseServiceError::Forbidden(_))
        ));
        f.service.delete(&Actor::from(&f.admin), course.id).await.unwrap();
        assert!(matches!(
            f.service.get(course.id).await,
            Err(CourseServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_enrollment() {
        let f = setup().await;
        let course = f
            .service
            .create(&Actor::from(&f.tutor), draft("Rust", Some(f.tutor.id)))
            .await
            .unwrap()
            .course;

        assert!(!f.service.is_enrolled(None, course.id).await.unwrap());
        assert!(!f.service.is_enrolled(Some(&f.student), course.id).await.unwrap());
        assert!(!f.service.is_enrolled(Some(&f.student), 999).await.unwrap());

        f.users.enroll(f.student.id, course.id).await.unwrap();
        assert!(f.service.is_enrolled(Some(&f.student), course.id).await.unwrap());

        let enrolled = f.service.list_enrolled(&f.student).await.unwrap();
        assert_eq!(enrolled.len(), 1);
        assert_eq!(enrolled[0].course.id, course.id);
        assert!(f.service.list_enrolled(&f.tutor).await.unwrap().is_empty());
    }
}
