pub mod auth;
pub mod book;
pub mod booklist;
pub mod catalog;
pub mod chat;
pub mod client;
pub mod club;
pub mod config;
pub mod error;
pub mod friend;
pub mod live;
pub mod review;
pub mod session;
pub mod store;
pub mod types;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;

// 重新导出书籍统一模型
pub use book::{BookDetails, BookSnapshot, BookSource};
