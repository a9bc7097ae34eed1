//! 账号模块
//!
//! 注册、登录、资料维护与用户检索

pub mod models;
pub mod service;

// 重新导出主要类型和函数
pub use models::{validate_username, ProfileUpdate, Registration, UserProfile, UserSummary};
pub use service::AuthService;
