//! Lesson service
//!
//! Lessons belong to a course and may only be written by that course's tutor
//! or an administrator. Reads return lessons together with their likes,
//! comments and reports.

use crate::db::repositories::{CourseRepository, FeedbackRepository, LessonRepository};
use crate::models::{Actor, Course, Lesson, LessonDetail, LessonInput, User};
use crate::services::validation::{FieldErrors, REQUIRED};
use anyhow::Context;
use std::sync::Arc;

pub const INVALID_COURSE: &str = "Invalid course ID.";

/// Error types for lesson service operations
#[derive(Debug, thiserror::Error)]
pub enum LessonServiceError {
    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    #[error("Lesson not found: {0}")]
    NotFound(i64),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Lesson fields as submitted; `course` is optional so a missing value can be
/// reported as a field error.
#[derive(Debug, Clone, Default)]
pub struct LessonDraft {
    pub title: String,
    pub course: Option<i64>,
    pub description: String,
    pub video_url: String,
    pub duration: i32,
    pub order: Option<i32>,
}

impl LessonDraft {
    pub fn from_lesson(lesson: &Lesson) -> Self {
        let input = LessonInput::from_lesson(lesson);
        Self {
            title: input.title,
            course: Some(input.course_id),
            description: input.description,
            video_url: input.video_url,
            duration: input.duration,
            order: input.order,
        }
    }
}

/// Result of toggling a like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeState {
    pub liked: bool,
    pub likes: usize,
}

/// Lesson service
pub struct LessonService {
    lessons: Arc<dyn LessonRepository>,
    courses: Arc<dyn CourseRepository>,
    feedback: Arc<dyn FeedbackRepository>,
}

impl LessonService {
    pub fn new(
        lessons: Arc<dyn LessonRepository>,
        courses: Arc<dyn CourseRepository>,
        feedback: Arc<dyn FeedbackRepository>,
    ) -> Self {
        Self {
            lessons,
            courses,
            feedback,
        }
    }

    /// All lessons, or those of one course, with their feedback attached
    pub async fn list(&self, course_id: Option<i64>) -> Result<Vec<LessonDetail>, LessonServiceError> {
        let lessons = self
            .lessons
            .list(course_id)
            .await
            .context("Failed to list lessons")?;
        self.details(lessons).await
    }

    pub async fn get(&self, id: i64) -> Result<LessonDetail, LessonServiceError> {
        let lesson = self.find(id).await?;
        self.detail(lesson).await
    }

    /// Attach likes, comments and reports to each lesson
    pub async fn details(&self, lessons: Vec<Lesson>) -> Result<Vec<LessonDetail>, LessonServiceError> {
        let mut out = Vec::with_capacity(lessons.len());
        for lesson in lessons {
            out.push(self.detail(lesson).await?);
        }
        Ok(out)
    }

    pub async fn create(&self, actor: &Actor, draft: LessonDraft) -> Result<LessonDetail, LessonServiceError> {
        let input = self.validate(actor, draft).await?;
        let lesson = self
            .lessons
            .create(&input)
            .await
            .context("Failed to create lesson")?;
        tracing::info!(lesson_id = lesson.id, course_id = lesson.course_id, "Created lesson");
        self.detail(lesson).await
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        draft: LessonDraft,
    ) -> Result<LessonDetail, LessonServiceError> {
        let existing = self.find(id).await?;
        self.ensure_can_manage(actor, existing.course_id).await?;

        let input = self.validate(actor, draft).await?;
        let lesson = self
            .lessons
            .update(id, &input)
            .await
            .context("Failed to update lesson")?
            .ok_or(LessonServiceError::NotFound(id))?;
        self.detail(lesson).await
    }

    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<(), LessonServiceError> {
        let existing = self.find(id).await?;
        self.ensure_can_manage(actor, existing.course_id).await?;
        self.lessons
            .delete(id)
            .await
            .context("Failed to delete lesson")?;
        Ok(())
    }

    /// Like the lesson, or remove the like if the user already liked it
    pub async fn toggle_like(&self, user: &User, id: i64) -> Result<LikeState, LessonServiceError> {
        self.find(id).await?;
        let liked = self
            .lessons
            .toggle_like(id, user.id)
            .await
            .context("Failed to toggle like")?;
        let likes = self
            .lessons
            .like_user_ids(id)
            .await
            .context("Failed to count likes")?
            .len();
        Ok(LikeState { liked, likes })
    }

    async fn find(&self, id: i64) -> Result<Lesson, LessonServiceError> {
        self.lessons
            .get_by_id(id)
            .await
            .context("Failed to get lesson")?
            .ok_or(LessonServiceError::NotFound(id))
    }

    async fn detail(&self, lesson: Lesson) -> Result<LessonDetail, LessonServiceError> {
        let likes = self
            .lessons
            .like_user_ids(lesson.id)
            .await
            .context("Failed to load likes")?;
        let comments = self
            .feedback
            .list_comments(lesson.id)
            .await
            .context("Failed to load comments")?;
        let reports = self
            .feedback
            .list_reports(Some(lesson.id))
            .await
            .context("Failed to load reports")?;
        Ok(LessonDetail {
            lesson,
            likes,
            comments,
            reports,
        })
    }

    async fn course(&self, id: i64) -> Result<Option<Course>, LessonServiceError> {
        Ok(self
            .courses
            .get_by_id(id)
            .await
            .context("Failed to get course")?)
    }

    async fn ensure_can_manage(&self, actor: &Actor, course_id: i64) -> Result<(), LessonServiceError> {
        let owner = self.course(course_id).await?.map(|c| c.tutor_id);
        match owner {
            Some(owner) if actor.can_manage(owner) => Ok(()),
            _ => Err(LessonServiceError::Forbidden(
                "Only the course tutor can change its lessons".to_string(),
            )),
        }
    }

    /// Check fields and resolve the course, which must be owned by `actor` unless they are an admin
    async fn validate(&self, actor: &Actor, draft: LessonDraft) -> Result<LessonInput, LessonServiceError> {
        let Some(course_id) = draft.course else {
            return Err(LessonServiceError::ValidationError(FieldErrors::single(
                "course", REQUIRED,
            )));
        };
        let owned = self
            .course(course_id)
            .await?
            .is_some_and(|c| actor.can_manage(c.tutor_id));
        if !owned {
            return Err(LessonServiceError::ValidationError(FieldErrors::single(
                "course",
                INVALID_COURSE,
            )));
        }

        let mut errors = FieldErrors::new();
        errors.check_text("title", &draft.title, 255);
        errors.check_text("description", &draft.description, 10_000);
        errors.check_text("videoURL", &draft.video_url, 255);
        if draft.duration < 0 {
            errors.add("duration", "Ensure this value is greater than or equal to 0.");
        }
        errors.into_result().map_err(LessonServiceError::ValidationError)?;

        Ok(LessonInput {
            title: draft.title.trim().to_string(),
            course_id,
            description: draft.description,
            video_url: draft.video_url.trim().to_string(),
            duration: draft.duration,
            order: draft.order,
        })
    }
}

#[cfg(test)]
pub(crate) fn test_lesson_service(pool: crate::db::DynDatabasePool) -> LessonService {
    use crate::db::repositories::{SqlxCourseRepository, SqlxFeedbackRepository, SqlxLessonRepository};

    LessonService::new(
        SqlxLessonRepository::boxed(pool.clone()),
        SqlxCourseRepository::boxed(pool.clone()),
        SqlxFeedbackRepository::boxed(pool),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::course::sample_course_input;
    use crate::db::repositories::{
        FeedbackRepository, SqlxCourseRepository, SqlxFeedbackRepository, SqlxUserRepository,
        UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{NewUser, UserType};

    struct Fixture {
        service: LessonService,
        feedback: SqlxFeedbackRepository,
        tutor: User,
        other_tutor: User,
        admin: User,
        course_id: i64,
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
        let mut admin = NewUser::new("root@x.com", "Root", UserType::Admin, "h");
        admin.is_admin = true;
        let admin = users.create(&admin).await.unwrap();
        let course = SqlxCourseRepository::new(pool.clone())
            .create(&sample_course_input("Rust", tutor.id))
            .await
            .unwrap();
        Fixture {
            service: test_lesson_service(pool.clone()),
            feedback: SqlxFeedbackRepository::new(pool),
            tutor,
            other_tutor,
            admin,
            course_id: course.id,
        }
    }

    fn draft(course: Option<i64>, title: &str) -> LessonDraft {
        LessonDraft {
            title: title.to_string(),
            course,
            description: "Intro to ownership".to_string(),
            video_url: "https://videos.example.com/own.mp4".to_string(),
            duration: 12,
            order: Some(1),
        }
    }

    fn course_error(e: LessonServiceError) -> Vec<String> {
        match e {
            LessonServiceError::ValidationError(errors) => {
                errors.get("course").map(<[String]>::to_vec).unwrap_or_default()
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_requires_course() {
        let f = setup().await;
        let err = f.service.create(&Actor::from(&f.tutor), draft(None, "Ownership")).await.unwrap_err();
        assert_eq!(course_error(err), vec![REQUIRED.to_string()]);
    }

    #[tokio::test]
    async fn test_create_requires_owned_course() {
        let f = setup().await;
        let err = f
            .service
            .create(&Actor::from(&f.other_tutor), draft(Some(f.course_id), "Ownership"))
            .await
            .unwrap_err();
        assert_eq!(course_error(err), vec![INVALID_COURSE.to_string()]);

        let err = f.service.create(&Actor::from(&f.tutor), draft(Some(999), "Ownership")).await.unwrap_err();
        assert_eq!(course_error(err), vec![INVALID_COURSE.to_string()]);

        // Admins may add lessons to any course
        assert!(f.service.create(&Actor::from(&f.admin), draft(Some(f.course_id), "Admin lesson")).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_and_get_detail() {
        let f = setup().await;
        let created = f
            .service
            .create(&Actor::from(&f.tutor), draft(Some(f.course_id), "Ownership"))
            .await
            .unwrap();
        assert_eq!(created.lesson.course_id, f.course_id);
        assert!(created.likes.is_empty());

        f.feedback
            .create_comment(created.lesson.id, f.tutor.id, "Nice")
            .await
            .unwrap();
        let detail = f.service.get(created.lesson.id).await.unwrap();
        assert_eq!(detail.comments.len(), 1);
        assert_eq!(f.service.list(Some(f.course_id)).await.unwrap().len(), 1);
        assert!(f.service.list(Some(999)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete_permissions() {
        let f = setup().await;
        let lesson = f
            .service
            .create(&Actor::from(&f.tutor), draft(Some(f.course_id), "Ownership"))
            .await
            .unwrap()
            .lesson;

        assert!(matches!(
            f.service
                .update(&Actor::from(&f.other_tutor), lesson.id, LessonDraft::from_lesson(&lesson))
                .await,
            Err(LessonServiceError::Forbidden(_))
        ));

        let mut change = LessonDraft::from_lesson(&lesson);
        change.title = "Borrowing".to_string();
        let updated = f.service.update(&Actor::from(&f.tutor), lesson.id, change).await.unwrap();
        assert_eq!(updated.lesson.title, "Borrowing");

        assert!(matches!(
            f.service.delete(&Actor::from(&f.other_tutor), lesson.id).await,
            Err(LessonServiceError::Forbidden(_))
        ));
        f.service.delete(&Actor::Admin, lesson.id).await.unwrap();
        assert!(matches!(
            f.service.get(lesson.id).await,
            Err(LessonServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_toggle_like() {
        let f = setup().await;
        let lesson = f
            .service
            .create(&Actor::from(&f.tutor), draft(Some(f.course_id), "Ownership"))
            .await
            .unwrap()
            .lesson;

        let first = f.service.toggle_like(&f.other_tutor, lesson.id).await.unwrap();
        assert_eq!(first, LikeState { liked: true, likes: 1 });

        let second = f.service.toggle_like(&f.admin, lesson.id).await.unwrap();
        assert_eq!(second, LikeState { liked: true, likes: 2 });

        let undo = f.service.toggle_like(&f.other_tutor, lesson.id).await.unwrap();
        assert_eq!(undo, LikeState { liked: false, likes: 1 });

        assert!(matches!(
            f.service.toggle_like(&f.admin, 999).await,
            Err(LessonServiceError::NotFound(999))
        ));
    }
}
