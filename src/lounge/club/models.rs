use crate::lounge::types::deserialize_string_or_null;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookClub {
    #[serde(rename = "objectId")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub description: String,
}

/// 用户加入的读书会（`clubId` 为指针，查询时展开）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubMembership {
    #[serde(rename = "objectId")]
    pub id: String,
    pub user_id: String,
    #[serde(rename = "clubId")]
    pub club: BookClub,
}

/// 读书会聊天消息，`username` 是发送时的名字快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(rename = "objectId")]
    pub id: String,
    pub club_id: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub user_id: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub username: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub text: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ClubDirectory {
    pub my_clubs: Vec<BookClub>,
    /// 尚未加入的读书会
    pub explore_clubs: Vec<BookClub>,
}
