//! 读书会模块
//!
//! 读书会目录、加入读书会、聊天消息的发送与历史

pub mod models;
pub mod service;

// 重新导出主要类型和函数
pub use models::{BookClub, ChatMessage, ClubDirectory, ClubMembership};
pub use service::{ClubService, CLUB_CLASS, HISTORY_LIMIT, MESSAGE_CLASS, MEMBERSHIP_CLASS};
