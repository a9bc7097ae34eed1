//! 用户书单模块（已读 / 想读）

pub mod models;
pub mod service;

// 重新导出主要类型和函数
pub use models::{BookListEntry, BookListKind};
pub use service::BookListService;
