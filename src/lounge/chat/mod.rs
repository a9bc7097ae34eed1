//! 读书会聊天
//!
//! 选择读书会后先拉取历史消息，再订阅实时推送；推送失败时退化为只读历史。

pub mod club_chat;
pub mod listener;
pub mod state;

// 重新导出主要类型和函数
pub use club_chat::ClubChat;
pub use listener::{ChatListener, EmptyChatListener};
pub use state::{ChatChange, ChatPhase, ChatState};
