//! Data models
//!
//! Entities persisted by the repositories and the input types the services
//! accept for them.

mod category;
mod course;
mod feedback;
mod lesson;
mod order;
mod price;
mod user;

pub use category::{Category, CategoryInput};
pub use course::{Course, CourseDetail, CourseInput, Difficulty};
pub use feedback::{Comment, Report};
pub use lesson::{Lesson, LessonDetail, LessonInput};
pub use order::{group_prices_by_course, CoursePriceSeries, Order, OrderInput, OrderStatus, PriceWindow};
pub use price::Price;
pub use user::{normalize_email, Actor, NewUser, ProfileUpdate, User, UserType};

#[cfg(test)]
pub(crate) use user::sample_user;
