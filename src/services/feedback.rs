//! Comment and report service

use crate::db::repositories::{FeedbackRepository, LessonRepository};
use crate::models::{Actor, Comment, Report, User};
use crate::services::validation::FieldErrors;
use anyhow::Context;
use std::sync::Arc;

/// Error types for feedback operations
#[derive(Debug, thiserror::Error)]
pub enum FeedbackServiceError {
    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    #[error("Lesson not found: {0}")]
    LessonNotFound(i64),

    #[error("Comment not found: {0}")]
    CommentNotFound(i64),

    #[error("Report not found: {0}")]
    ReportNotFound(i64),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Feedback service
pub struct FeedbackService {
    feedback: Arc<dyn FeedbackRepository>,
    lessons: Arc<dyn LessonRepository>,
}

impl FeedbackService {
    pub fn new(feedback: Arc<dyn FeedbackRepository>, lessons: Arc<dyn LessonRepository>) -> Self {
        Self { feedback, lessons }
    }

    pub async fn list_comments(&self, lesson_id: i64) -> Result<Vec<Comment>, FeedbackServiceError> {
        self.ensure_lesson(lesson_id).await?;
        Ok(self
            .feedback
            .list_comments(lesson_id)
            .await
            .context("Failed to list comments")?)
    }

    pub async fn add_comment(
        &self,
        author: &User,
        lesson_id: i64,
        content: &str,
    ) -> Result<Comment, FeedbackServiceError> {
        let content = content.trim();
        let mut errors = FieldErrors::new();
        errors.check_text("content", content, 5_000);
        errors.into_result().map_err(FeedbackServiceError::ValidationError)?;
        self.ensure_lesson(lesson_id).await?;

        let comment = self
            .feedback
            .create_comment(lesson_id, author.id, content)
            .await
            .context("Failed to create comment")?;
        tracing::debug!(comment_id = comment.id, lesson_id, "Comment added");
        Ok(comment)
    }

    /// Remove a comment; only its author or an admin may do so
    pub async fn delete_comment(&self, actor: &Actor, id: i64) -> Result<(), FeedbackServiceError> {
        let comment = self
            .feedback
            .get_comment(id)
            .await
            .context("Failed to get comment")?
            .ok_or(FeedbackServiceError::CommentNotFound(id))?;
        if !actor.can_manage(comment.user_id) {
            return Err(FeedbackServiceError::Forbidden(
                "Only the author can delete this comment".to_string(),
            ));
        }
        self.feedback
            .delete_comment(id)
            .await
            .context("Failed to delete comment")?;
        Ok(())
    }

    pub async fn add_report(
        &self,
        reporter: &User,
        lesson_id: i64,
        reason: &str,
    ) -> Result<Report, FeedbackServiceError> {
        let reason = reason.trim();
        let mut errors = FieldErrors::new();
        errors.check_text("reason", reason, 5_000);
        errors.into_result().map_err(FeedbackServiceError::ValidationError)?;
        self.ensure_lesson(lesson_id).await?;

        let report = self
            .feedback
            .create_report(lesson_id, reporter.id, reason)
            .await
            .context("Failed to create report")?;
        tracing::info!(report_id = report.id, lesson_id, user_id = reporter.id, "Lesson reported");
        Ok(report)
    }

    pub async fn list_reports(&self) -> Result<Vec<Report>, FeedbackServiceError> {
        Ok(self
            .feedback
            .list_reports(None)
            .await
            .context("Failed to list reports")?)
    }

    pub async fn delete_report(&self, id: i64) -> Result<(), FeedbackServiceError> {
        if !self
            .feedback
            .delete_report(id)
            .await
            .context("Failed to delete report")?
        {
            return Err(FeedbackServiceError::ReportNotFound(id));
        }
        Ok(())
    }

    async fn ensure_lesson(&self, lesson_id: i64) -> Result<(), FeedbackServiceError> {
        self.lessons
            .get_by_id(lesson_id)
            .await
            .context("Failed to get lesson")?
            .map(|_| ())
            .ok_or(FeedbackServiceError::LessonNotFound(lesson_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::course::sample_course_input;
    use crate::db::repositories::lesson::sample_lesson_input;
    use crate::db::repositories::{
        CourseRepository, SqlxCourseRepository, SqlxFeedbackRepository, SqlxLessonRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{NewUser, UserType};
    use crate::services::validation::BLANK;

    struct Fixture {
        service: FeedbackService,
        author: User,
        other: User,
        admin: User,
        lesson_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let users = SqlxUserRepository::new(pool.clone());
        let tutor = users
            .create(&NewUser::new("t@x.com", "T", UserType::Teacher, "h"))
            .await
            .unwrap();
        let author = users
            .create(&NewUser::new("a@x.com", "A", UserType::Student, "h"))
            .await
            .unwrap();
        let other = users
            .create(&NewUser::new("b@x.com", "B", UserType::Student, "h"))
            .await
            .unwrap();
        let mut admin = NewUser::new("root@x.com", "Root", UserType::Admin, "h");
        admin.is_admin = true;
        let admin = users.create(&admin).await.unwrap();

        let course = SqlxCourseRepository::new(pool.clone())
            .create(&sample_course_input("Rust", tutor.id))
            .await
            .unwrap();
        let lessons = SqlxLessonRepository::boxed(pool.clone());
        let lesson = lessons
            .create(&sample_lesson_input(course.id, "Intro", Some(1)))
            .await
            .unwrap();

        Fixture {
            service: FeedbackService::new(SqlxFeedbackRepository::boxed(pool), lessons),
            author,
            other,
            admin,
            lesson_id: lesson.id,
        }
    }

    #[tokio::test]
    async fn test_comments() {
        let f = setup().await;
        let comment = f
            .service
            .add_comment(&f.author, f.lesson_id, "  Great lesson ")
            .await
            .unwrap();
        assert_eq!(comment.content, "Great lesson");
        assert_eq!(comment.user_id, f.author.id);

        let comments = f.service.list_comments(f.lesson_id).await.unwrap();
        assert_eq!(comments, vec![comment.clone()]);

        assert!(matches!(
            f.service.delete_comment(&Actor::from(&f.other), comment.id).await,
            Err(FeedbackServiceError::Forbidden(_))
        ));
        f.service.delete_comment(&Actor::from(&f.author), comment.id).await.unwrap();
        assert!(matches!(
            f.service.delete_comment(&Actor::from(&f.admin), comment.id).await,
            Err(FeedbackServiceError::CommentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_deletes_any_comment() {
        let f = setup().await;
        let comment = f.service.add_comment(&f.author, f.lesson_id, "Hmm").await.unwrap();
        f.service.delete_comment(&Actor::from(&f.admin), comment.id).await.unwrap();
        assert!(f.service.list_comments(f.lesson_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_and_unknown_lesson() {
        let f = setup().await;
        match f.service.add_comment(&f.author, f.lesson_id, "   ").await {
            Err(FeedbackServiceError::ValidationError(errors)) => {
                assert_eq!(errors.get("content"), Some(&[BLANK.to_string()][..]));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            f.service.add_report(&f.author, f.lesson_id, "").await,
            Err(FeedbackServiceError::ValidationError(_))
        ));
        assert!(matches!(
            f.service.add_comment(&f.author, 999, "Hi").await,
            Err(FeedbackServiceError::LessonNotFound(999))
        ));
        assert!(matches!(
            f.service.list_comments(999).await,
            Err(FeedbackServiceError::LessonNotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_reports() {
        let f = setup().await;
        let report = f
            .service
            .add_report(&f.author, f.lesson_id, "Broken video")
            .await
            .unwrap();
        f.service.add_report(&f.other, f.lesson_id, "Spam").await.unwrap();

        let reports = f.service.list_reports().await.unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0], report);

        f.service.delete_report(report.id).await.unwrap();
        assert_eq!(f.service.list_reports().await.unwrap().len(), 1);
        assert!(matches!(
            f.service.delete_report(report.id).await,
            Err(FeedbackServiceError::ReportNotFound(_))
        ));
    }
}
