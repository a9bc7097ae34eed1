use crate::lounge::auth::UserSummary;
use crate::lounge::review::UserRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FriendRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendRequestStatus::Pending => "pending",
            FriendRequestStatus::Accepted => "accepted",
            FriendRequestStatus::Rejected => "rejected",
        }
    }
}

/// 好友申请（`fromUser` 为指针，查询待处理申请时会展开）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    #[serde(rename = "objectId")]
    pub id: String,
    pub from_user: UserRef,
    pub to_user_id: String,
    pub status: FriendRequestStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// 单向好友关系，每对好友各有一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
    #[serde(rename = "objectId")]
    pub id: String,
    pub user: UserRef,
    pub friend_id: String,
}

/// 发送好友申请的结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendRequestOutcome {
    Sent(FriendRequest),
    /// 已有待处理的申请，未创建新申请
    AlreadyPending,
    AlreadyFriends,
}

#[derive(Debug, Clone, Default)]
pub struct FriendsOverview {
    pub pending: Vec<FriendRequest>,
    pub friends: Vec<UserSummary>,
}
