//! 好友模块
//!
//! 好友申请、好友关系维护与好友检索

pub mod models;
pub mod service;

// 重新导出主要类型和函数
pub use models::{FriendRequest, FriendRequestStatus, Friendship, FriendsOverview, SendRequestOutcome};
pub use service::FriendService;
