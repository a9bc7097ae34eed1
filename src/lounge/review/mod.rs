//! 书评模块

pub mod models;
pub mod rating;
pub mod service;

// 重新导出主要类型和函数
pub use models::{NewReview, Review, ReviewUpdate, UserRef};
pub use rating::{ratings_by_book, RatingSummary};
pub use service::ReviewService;
