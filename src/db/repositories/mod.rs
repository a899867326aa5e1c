//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific aggregate.

pub mod category;
pub mod course;
pub mod feedback;
pub mod lesson;
pub mod order;
pub mod user;

pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use course::{CourseRepository, SqlxCourseRepository};
pub use feedback::{FeedbackRepository, SqlxFeedbackRepository};
pub use lesson::{LessonRepository, SqlxLessonRepository};
pub use order::{OrderRepository, SqlxOrderRepository};
pub use user::{SqlxUserRepository, UserRepository};
