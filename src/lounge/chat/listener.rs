//! 聊天监听器回调接口

use crate::lounge::club::ChatMessage;
use async_trait::async_trait;

#[async_trait]
pub trait ChatListener: Send + Sync {
    /// 历史消息加载完成（最早的在前）
    async fn on_history_loaded(&self, club_id: String, messages: Vec<ChatMessage>);

    /// 收到新消息
    async fn on_message_created(&self, message: ChatMessage);

    async fn on_message_updated(&self, message: ChatMessage);

    async fn on_message_removed(&self, message_id: String);

    /// 推送连接状态变化，`connected = false` 时只显示历史消息
    async fn on_connection_status_changed(&self, connected: bool, detail: String);
}

/// 默认空实现（无操作）
pub struct EmptyChatListener;

#[async_trait]
impl ChatListener for EmptyChatListener {
    async fn on_history_loaded(&self, _club_id: String, _messages: Vec<ChatMessage>) {}

    async fn on_message_created(&self, _message: ChatMessage) {}

    async fn on_message_updated(&self, _message: ChatMessage) {}

    async fn on_message_removed(&self, _message_id: String) {}

    async fn on_connection_status_changed(&self, _connected: bool, _detail: String) {}
}
