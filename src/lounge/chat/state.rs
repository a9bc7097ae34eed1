//! 聊天状态机
//!
//! Idle → FetchingHistory → Subscribing → Live → Closed；
//! 推送通道失败时进入 HistoryOnly，不重连。

use crate::lounge::club::ChatMessage;
use crate::lounge::live::LiveEvent;
use crate::lounge::types::{decode, Record};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatPhase {
    #[default]
    Idle,
    FetchingHistory,
    Subscribing,
    Live,
    /// 推送不可用，只显示历史消息
    HistoryOnly,
    Closed,
}

/// 推送事件对消息列表的影响
#[derive(Debug, Clone, PartialEq)]
pub enum ChatChange {
    Appended(ChatMessage),
    Replaced(ChatMessage),
    Removed(String),
    Ignored,
}

#[derive(Debug, Default)]
pub struct ChatState {
    pub phase: ChatPhase,
    pub club_id: Option<String>,
    pub messages: Vec<ChatMessage>,
}

impl ChatState {
    /// 切换读书会：清空消息并进入 FetchingHistory
    pub fn begin(&mut self, club_id: &str) {
        self.phase = ChatPhase::FetchingHistory;
        self.club_id = Some(club_id.to_string());
        self.messages.clear();
    }

    pub fn reset(&mut self, phase: ChatPhase) {
        self.phase = phase;
        self.club_id = None;
        self.messages.clear();
    }

    /// 追加消息，已存在同 ID 的消息时不追加
    pub fn append(&mut self, message: ChatMessage) -> ChatChange {
        if self.messages.iter().any(|m| m.id == message.id) {
            return ChatChange::Ignored;
        }
        self.messages.push(message.clone());
        ChatChange::Appended(message)
    }

    fn owns(&self, record: &Record) -> bool {
        let club_id = record.get("clubId").and_then(|v| v.as_str());
        club_id.is_some() && club_id == self.club_id.as_deref()
    }

    /// 应用推送事件；`Failed` 由调用方处理
    ///
    /// 新增和更新的消息必须属于当前读书会，否则忽略。
    pub fn apply(&mut self, event: LiveEvent) -> ChatChange {
        if let LiveEvent::Created(record) | LiveEvent::Entered(record) | LiveEvent::Updated(record) = &event {
            if !self.owns(record) {
                debug!("[ClubChat] 忽略其他读书会的推送: {:?}", record.get("clubId"));
                return ChatChange::Ignored;
            }
        }
        match event {
            LiveEvent::Created(record) | LiveEvent::Entered(record) => match to_message(record) {
                Some(message) => self.append(message),
                None => ChatChange::Ignored,
            },
            LiveEvent::Updated(record) => {
                let Some(message) = to_message(record) else {
                    return ChatChange::Ignored;
                };
                match self.messages.iter_mut().find(|m| m.id == message.id) {
                    Some(existing) => {
                        *existing = message.clone();
                        ChatChange::Replaced(message)
                    }
                    None => ChatChange::Ignored,
                }
            }
            LiveEvent::Deleted(record) | LiveEvent::Left(record) => {
                let Some(id) = record.get("objectId").and_then(|v| v.as_str()) else {
                    return ChatChange::Ignored;
                };
                let before = self.messages.len();
                self.messages.retain(|m| m.id != id);
                if self.messages.len() < before {
                    ChatChange::Removed(id.to_string())
                } else {
                    ChatChange::Ignored
                }
            }
            LiveEvent::Failed(_) => ChatChange::Ignored,
        }
    }
}

fn to_message(record: Record) -> Option<ChatMessage> {
    match decode(record) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!("[ClubChat] ⚠️ 无法解析推送的消息: {:#}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, text: &str) -> Record {
        json!({"objectId": id, "clubId": "club123", "userId": "u1", "username": "Ada", "text": text})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn create_update_delete() {
        let mut state = ChatState::default();
        state.begin("club123");
        assert!(matches!(state.apply(LiveEvent::Created(record("m1", "hi"))), ChatChange::Appended(_)));
        assert_eq!(state.apply(LiveEvent::Entered(record("m1", "hi"))), ChatChange::Ignored);

        let change = state.apply(LiveEvent::Updated(record("m1", "hello")));
        assert!(matches!(change, ChatChange::Replaced(ref m) if m.text == "hello"));
        assert_eq!(state.messages[0].text, "hello");

        assert_eq!(state.apply(LiveEvent::Updated(record("m9", "?"))), ChatChange::Ignored);
        assert_eq!(
            state.apply(LiveEvent::Deleted(record("m1", ""))),
            ChatChange::Removed("m1".into())
        );
        assert!(state.messages.is_empty());
        assert_eq!(state.apply(LiveEvent::Left(record("m1", ""))), ChatChange::Ignored);
    }

    #[test]
    fn malformed_push_is_ignored() {
        let mut state = ChatState::default();
        let broken = json!({"text": "no id"}).as_object().cloned().unwrap();
        assert_eq!(state.apply(LiveEvent::Created(broken)), ChatChange::Ignored);
    }

    #[test]
    fn pushes_for_other_clubs_are_ignored() {
        let mut state = ChatState::default();
        state.begin("club123");
        state.apply(LiveEvent::Created(record("m1", "hi")));

        let mut foreign = record("m2", "elsewhere");
        foreign.insert("clubId".into(), json!("other"));
        assert_eq!(state.apply(LiveEvent::Created(foreign.clone())), ChatChange::Ignored);
        assert_eq!(state.apply(LiveEvent::Entered(foreign)), ChatChange::Ignored);

        let mut moved = record("m1", "moved");
        moved.insert("clubId".into(), json!("other"));
        assert_eq!(state.apply(LiveEvent::Updated(moved)), ChatChange::Ignored);
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].text, "hi");

        state.reset(ChatPhase::Closed);
        assert_eq!(state.apply(LiveEvent::Created(record("m3", "late"))), ChatChange::Ignored);
        assert!(state.messages.is_empty());
    }
}
