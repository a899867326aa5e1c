//! Services layer - Business logic
//!
//! Services validate input, apply permission rules and coordinate the
//! repositories. Handlers only translate between HTTP and these calls.

pub mod category;
pub mod course;
pub mod email;
pub mod feedback;
pub mod lesson;
pub mod order;
pub mod password;
pub mod rate_limiter;
pub mod reset_token;
pub mod token;
pub mod user;
pub mod validation;

pub use category::{CategoryService, CategoryServiceError};
pub use course::{CourseDraft, CourseService, CourseServiceError};
pub use email::{EmailService, OutgoingMail};
pub use feedback::{FeedbackService, FeedbackServiceError};
pub use lesson::{LessonDraft, LessonService, LessonServiceError, LikeState};
pub use order::{OrderDraft, OrderService, OrderServiceError};
pub use password::{hash_password, verify_password};
pub use rate_limiter::LoginRateLimiter;
pub use reset_token::ResetTokenGenerator;
pub use token::{Claims, Role, TokenError, TokenPair, TokenService, TokenType};
pub use user::{LoginInput, RegisterInput, TutorInput, UserService, UserServiceError};
pub use validation::FieldErrors;
