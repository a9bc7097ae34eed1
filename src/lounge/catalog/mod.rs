//! 图书目录模块
//!
//! 通过公开的图书 API 检索书籍，并把返回结果规范化为扁平的 [`CatalogBook`]

pub mod api;
pub mod featured;
pub mod models;

// 重新导出主要类型和函数
pub use api::{CatalogApi, OrderBy, PopularCategory};
pub use featured::{load_featured_books, parse_featured_books, FeaturedBook};
pub use models::{CatalogBook, Volume, VolumeInfo};
