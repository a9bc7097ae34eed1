//! 好友服务
//!
//! 唯一性由先读后写保证：并发调用仍可能产生重复行

use crate::lounge::auth::UserSummary;
use crate::lounge::error::LoungeError;
use crate::lounge::friend::models::{
    FriendRequest, FriendRequestStatus, Friendship, FriendsOverview, SendRequestOutcome,
};
use crate::lounge::session::{SessionContext, SessionUser};
use crate::lounge::store::{
    ensure_batch_succeeded, find_as, first_as, BatchOp, ObjectStore, Query,
};
use crate::lounge::types::{decode, to_record, Pointer, USER_CLASS};
use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const FRIEND_REQUEST_CLASS: &str = "FriendRequest";
pub const FRIENDSHIP_CLASS: &str = "Friendship";

/// 好友检索的最短关键字
pub const MIN_SEARCH_LEN: usize = 2;
pub const SEARCH_LIMIT: usize = 10;

pub struct FriendService {
    store: Arc<dyn ObjectStore>,
}

impl FriendService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// 发送好友申请：已有待处理申请或已是好友时不写入
    pub async fn send_friend_request(
        &self,
        ctx: &SessionContext,
        to_user_id: &str,
    ) -> Result<SendRequestOutcome> {
        let me = ctx.require_user()?;
        if to_user_id == me.user_id {
            return Err(LoungeError::Validation(
                "You cannot send a friend request to yourself".to_string(),
            )
            .into());
        }

        let existing = Query::new(FRIEND_REQUEST_CLASS)
            .equal_to_pointer("fromUser", &me.pointer())
            .equal_to("toUserId", to_user_id)
            .equal_to("status", FriendRequestStatus::Pending.as_str());
        if self
            .store
            .first(&existing, Some(&me.session_token))
            .await
            .context("检查好友申请失败")?
            .is_some()
        {
            info!("[FriendService] 好友申请已存在: {} -> {}", me.user_id, to_user_id);
            return Ok(SendRequestOutcome::AlreadyPending);
        }

        if self.check_if_friends(ctx, to_user_id).await {
            info!("[FriendService] 已经是好友: {}", to_user_id);
            return Ok(SendRequestOutcome::AlreadyFriends);
        }

        info!("[FriendService] 📨 发送好友申请: {} -> {}", me.user_id, to_user_id);
        let fields = to_record(json!({
            "fromUser": me.pointer().to_value(),
            "toUserId": to_user_id,
            "status": FriendRequestStatus::Pending.as_str(),
        }));
        let created = self
            .store
            .create(FRIEND_REQUEST_CLASS, fields, Some(&me.session_token))
            .await
            .context("发送好友申请失败")?;
        Ok(SendRequestOutcome::Sent(decode(created)?))
    }

    /// 接受好友申请：状态改为 accepted，并保证两个方向各有一行好友关系
    ///
    /// 已接受的申请再次接受时只补齐缺失的好友关系。
    pub async fn accept_friend_request(
        &self,
        ctx: &SessionContext,
        request_id: &str,
    ) -> Result<FriendRequest> {
        let me = ctx.require_user()?;
        let mut request = self.load_addressed_request(me, request_id).await?;
        if request.status == FriendRequestStatus::Rejected {
            return Err(LoungeError::Validation(
                "This friend request is no longer pending".to_string(),
            )
            .into());
        }

        let from_id = request.from_user.id.clone();
        let mut ops = Vec::new();
        if request.status == FriendRequestStatus::Pending {
            ops.push(BatchOp::Update {
                class_name: FRIEND_REQUEST_CLASS.to_string(),
                object_id: request.id.clone(),
                fields: to_record(json!({ "status": FriendRequestStatus::Accepted.as_str() })),
            });
        }
        for (user_id, friend_id) in [(from_id.as_str(), me.user_id.as_str()), (me.user_id.as_str(), from_id.as_str())] {
            if self.friendship_row(user_id, friend_id, &me.session_token).await?.is_none() {
                ops.push(BatchOp::create(
                    FRIENDSHIP_CLASS,
                    to_record(json!({
                        "user": Pointer::user(user_id).to_value(),
                        "friendId": friend_id,
                    })),
                ));
            }
        }

        if !ops.is_empty() {
            info!(
                "[FriendService] ✅ 接受好友申请 {}，批量写入 {} 个请求",
                request_id,
                ops.len()
            );
            let results = self
                .store
                .batch(ops, Some(&me.session_token))
                .await
                .context("接受好友申请失败")?;
            ensure_batch_succeeded(&results).context("接受好友申请部分失败")?;
        }

        request.status = FriendRequestStatus::Accepted;
        Ok(request)
    }

    pub async fn reject_friend_request(
        &self,
        ctx: &SessionContext,
        request_id: &str,
    ) -> Result<FriendRequest> {
        let me = ctx.require_user()?;
        let mut request = self.load_addressed_request(me, request_id).await?;
        if request.status != FriendRequestStatus::Pending {
            return Err(LoungeError::Validation(
                "This friend request is no longer pending".to_string(),
            )
            .into());
        }
        info!("[FriendService] 拒绝好友申请: {}", request_id);
        self.store
            .update(
                FRIEND_REQUEST_CLASS,
                request_id,
                to_record(json!({ "status": FriendRequestStatus::Rejected.as_str() })),
                Some(&me.session_token),
            )
            .await
            .context("拒绝好友申请失败")?;
        request.status = FriendRequestStatus::Rejected;
        Ok(request)
    }

    /// 发给我的待处理申请，最新在前；失败时返回空列表
    pub async fn pending_requests(&self, ctx: &SessionContext) -> Vec<FriendRequest> {
        let Some(me) = ctx.user() else {
            return Vec::new();
        };
        let query = Query::new(FRIEND_REQUEST_CLASS)
            .equal_to("toUserId", me.user_id.as_str())
            .equal_to("status", FriendRequestStatus::Pending.as_str())
            .include("fromUser")
            .descending("createdAt");
        match find_as(self.store.as_ref(), &query, Some(&me.session_token)).await {
            Ok(requests) => requests,
            Err(e) => {
                error!("[FriendService] ❌ 获取好友申请失败: {:#}", e);
                Vec::new()
            }
        }
    }

    /// 好友列表：先查好友关系，再按 ID 批量查用户；失败时返回空列表
    pub async fn friends(&self, ctx: &SessionContext) -> Vec<UserSummary> {
        let Some(me) = ctx.user() else {
            return Vec::new();
        };
        match self.load_friends(me).await {
            Ok(friends) => friends,
            Err(e) => {
                error!("[FriendService] ❌ 获取好友列表失败: {:#}", e);
                Vec::new()
            }
        }
    }

    async fn load_friends(&self, me: &SessionUser) -> Result<Vec<UserSummary>> {
        let query = Query::new(FRIENDSHIP_CLASS).equal_to_pointer("user", &me.pointer());
        let rows: Vec<Friendship> =
            find_as(self.store.as_ref(), &query, Some(&me.session_token)).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = rows.into_iter().map(|f| f.friend_id).collect();
        let users = Query::new(USER_CLASS).contained_in("objectId", ids);
        find_as(self.store.as_ref(), &users, Some(&me.session_token)).await
    }

    /// 是否已是好友；失败时按 false 处理
    pub async fn check_if_friends(&self, ctx: &SessionContext, user_id: &str) -> bool {
        let Some(me) = ctx.user() else {
            return false;
        };
        let query = Query::new(FRIENDSHIP_CLASS)
            .equal_to_pointer("user", &me.pointer())
            .equal_to("friendId", user_id);
        match self.store.count(&query, Some(&me.session_token)).await {
            Ok(count) => count > 0,
            Err(e) => {
                warn!("[FriendService] ⚠️ 检查好友关系失败: {:#}", e);
                false
            }
        }
    }

    /// 删除好友（两个方向一起删除）
    pub async fn remove_friend(&self, ctx: &SessionContext, friend_id: &str) -> Result<()> {
        let me = ctx.require_user()?;
        let mut ops = Vec::new();
        for (user_id, other) in [(me.user_id.as_str(), friend_id), (friend_id, me.user_id.as_str())] {
            if let Some(row) = self.friendship_row(user_id, other, &me.session_token).await? {
                ops.push(BatchOp::destroy(FRIENDSHIP_CLASS, &row.id));
            }
        }
        if ops.is_empty() {
            return Ok(());
        }
        info!("[FriendService] 🗑️ 删除好友 {}，共 {} 行", friend_id, ops.len());
        let results = self
            .store
            .batch(ops, Some(&me.session_token))
            .await
            .context("删除好友失败")?;
        ensure_batch_succeeded(&results).context("删除好友部分失败")
    }

    /// 按用户名前缀检索可添加的用户（排除自己）；失败时返回空列表
    pub async fn search_users_for_friends(
        &self,
        ctx: &SessionContext,
        term: &str,
    ) -> Vec<UserSummary> {
        let Some(me) = ctx.user() else {
            return Vec::new();
        };
        let term = term.trim();
        if term.chars().count() < MIN_SEARCH_LEN {
            return Vec::new();
        }
        let query = Query::new(USER_CLASS)
            .starts_with("username", term)
            .not_equal_to("objectId", me.user_id.as_str())
            .exists("username")
            .limit(SEARCH_LIMIT);
        match find_as(self.store.as_ref(), &query, Some(&me.session_token)).await {
            Ok(users) => users,
            Err(e) => {
                error!("[FriendService] ❌ 检索用户失败: {:#}", e);
                Vec::new()
            }
        }
    }

    /// 同时加载待处理申请和好友列表
    pub async fn overview(&self, ctx: &SessionContext) -> FriendsOverview {
        let (pending, friends) = tokio::join!(self.pending_requests(ctx), self.friends(ctx));
        FriendsOverview { pending, friends }
    }

    async fn load_addressed_request(
        &self,
        me: &SessionUser,
        request_id: &str,
    ) -> Result<FriendRequest> {
        let record = self
            .store
            .get(FRIEND_REQUEST_CLASS, request_id, &["fromUser"], Some(&me.session_token))
            .await
            .context("获取好友申请失败")?;
        let request: FriendRequest = decode(record)?;
        if request.to_user_id != me.user_id {
            return Err(LoungeError::Forbidden(
                "This friend request was not sent to you".to_string(),
            )
            .into());
        }
        Ok(request)
    }

    async fn friendship_row(
        &self,
        user_id: &str,
        friend_id: &str,
        session_token: &str,
    ) -> Result<Option<Friendship>> {
        let query = Query::new(FRIENDSHIP_CLASS)
            .equal_to_pointer("user", &Pointer::user(user_id))
            .equal_to("friendId", friend_id);
        first_as(self.store.as_ref(), &query, Some(session_token))
            .await
            .context("查询好友关系失败")
    }
}
