//! 读书会服务

use crate::lounge::club::models::{BookClub, ChatMessage, ClubDirectory, ClubMembership};
use crate::lounge::error::LoungeError;
use crate::lounge::session::SessionContext;
use crate::lounge::store::{find_as, first_as, ObjectStore, Query};
use crate::lounge::types::{decode, to_record, Pointer};
use anyhow::{Context, Result};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

pub const CLUB_CLASS: &str = "BookClub";
pub const MEMBERSHIP_CLASS: &str = "UserClubs";
pub const MESSAGE_CLASS: &str = "Message";

/// 聊天历史默认条数
pub const HISTORY_LIMIT: usize = 100;

pub struct ClubService {
    store: Arc<dyn ObjectStore>,
}

impl ClubService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// 我的读书会与可加入的读书会；未登录时全部归为可加入
    pub async fn directory(&self, ctx: &SessionContext) -> Result<ClubDirectory> {
        let my_clubs: Vec<BookClub> = match ctx.user() {
            Some(_) => self
                .memberships(ctx)
                .await?
                .into_iter()
                .map(|m| m.club)
                .collect(),
            None => Vec::new(),
        };

        let all: Vec<BookClub> = find_as(
            self.store.as_ref(),
            &Query::new(CLUB_CLASS).ascending("name"),
            ctx.token(),
        )
        .await
        .context("获取读书会列表失败")?;

        let joined: HashSet<&str> = my_clubs.iter().map(|c| c.id.as_str()).collect();
        let explore_clubs = all
            .iter()
            .filter(|c| !joined.contains(c.id.as_str()))
            .cloned()
            .collect();

        Ok(ClubDirectory {
            my_clubs,
            explore_clubs,
        })
    }

    pub async fn memberships(&self, ctx: &SessionContext) -> Result<Vec<ClubMembership>> {
        let user = ctx.require_user()?;
        let query = Query::new(MEMBERSHIP_CLASS)
            .equal_to("userId", user.user_id.as_str())
            .include("clubId");
        find_as(self.store.as_ref(), &query, Some(&user.session_token))
            .await
            .context("获取已加入的读书会失败")
    }

    /// 加入读书会；已加入时返回原有记录
    pub async fn join_club(&self, ctx: &SessionContext, club_id: &str) -> Result<ClubMembership> {
        let user = ctx.require_user()?;
        let existing = Query::new(MEMBERSHIP_CLASS)
            .equal_to("userId", user.user_id.as_str())
            .equal_to_pointer("clubId", &Pointer::new(CLUB_CLASS, club_id))
            .include("clubId");
        if let Some(membership) =
            first_as::<ClubMembership>(self.store.as_ref(), &existing, Some(&user.session_token))
                .await
                .context("查询读书会成员失败")?
        {
            info!("[ClubService] 已是读书会 {} 的成员", club_id);
            return Ok(membership);
        }

        // 确认读书会存在
        let club: BookClub = decode(
            self.store
                .get(CLUB_CLASS, club_id, &[], Some(&user.session_token))
                .await
                .context("获取读书会失败")?,
        )?;

        info!("[ClubService] 🙋 加入读书会: {}", club.name);
        let fields = to_record(json!({
            "userId": user.user_id,
            "clubId": Pointer::new(CLUB_CLASS, club_id).to_value(),
        }));
        let created = self
            .store
            .create(MEMBERSHIP_CLASS, fields, Some(&user.session_token))
            .await
            .context("加入读书会失败")?;
        let mut membership: ClubMembership = decode(created)?;
        membership.club = club;
        Ok(membership)
    }

    /// 发送聊天消息；发送者名字取名，其次用户名
    pub async fn send_message(
        &self,
        ctx: &SessionContext,
        club_id: &str,
        text: &str,
    ) -> Result<ChatMessage> {
        let user = ctx.require_user()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(LoungeError::Validation("Message cannot be empty".to_string()).into());
        }
        info!("[ClubService] 💬 发送消息到读书会 {}", club_id);
        let fields = to_record(json!({
            "clubId": club_id,
            "userId": user.user_id,
            "username": user.display_name(),
            "text": text,
        }));
        let created = self
            .store
            .create(MESSAGE_CLASS, fields, Some(&user.session_token))
            .await
            .context("发送消息失败")?;
        decode(created)
    }

    /// 聊天历史，最早的在前
    pub async fn message_history(
        &self,
        ctx: &SessionContext,
        club_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        let query = Self::history_query(club_id).limit(limit);
        find_as(self.store.as_ref(), &query, ctx.token())
            .await
            .context("获取聊天历史失败")
    }

    pub(crate) fn history_query(club_id: &str) -> Query {
        Query::new(MESSAGE_CLASS)
            .equal_to("clubId", club_id)
            .ascending("createdAt")
    }

    /// 创建读书会（离线演示数据用）
    pub async fn create_club(&self, ctx: &SessionContext, name: &str, description: &str) -> Result<BookClub> {
        let fields = to_record(json!({ "name": name, "description": description }));
        let created = self
            .store
            .create(CLUB_CLASS, fields, ctx.token())
            .await
            .context("创建读书会失败")?;
        decode(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lounge::error::{classify, ErrorKind};
    use crate::lounge::store::MemoryStore;
    use crate::lounge::test_support::sign_in;

    #[tokio::test]
    async fn join_is_idempotent_and_directory_splits_clubs() {
        let store = Arc::new(MemoryStore::new());
        let ctx = sign_in(&store, "ada", "Ada").await;
        let clubs = ClubService::new(store.clone());
        let mystery = clubs.create_club(&ctx, "Mystery Lovers", "Whodunits").await.unwrap();
        clubs.create_club(&ctx, "Classics", "Old books").await.unwrap();

        let first = clubs.join_club(&ctx, &mystery.id).await.unwrap();
        let second = clubs.join_club(&ctx, &mystery.id).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.club.name, "Mystery Lovers");
        assert_eq!(store.records(MEMBERSHIP_CLASS).len(), 1);

        let directory = clubs.directory(&ctx).await.unwrap();
        assert_eq!(directory.my_clubs.len(), 1);
        assert_eq!(directory.explore_clubs.len(), 1);
        assert_eq!(directory.explore_clubs[0].name, "Classics");

        let anonymous = clubs.directory(&SessionContext::anonymous()).await.unwrap();
        assert_eq!(anonymous.explore_clubs.len(), 2);
    }

    #[tokio::test]
    async fn history_is_oldest_first_and_capped() {
        let store = Arc::new(MemoryStore::new());
        let ctx = sign_in(&store, "ada", "Ada").await;
        let clubs = ClubService::new(store.clone());

        for i in 0..5 {
            clubs.send_message(&ctx, "club123", &format!("  message {i} ")).await.unwrap();
        }
        clubs.send_message(&ctx, "other", "elsewhere").await.unwrap();

        let history = clubs.message_history(&ctx, "club123", 3).await.unwrap();
        let texts: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["message 0", "message 1", "message 2"]);
        assert_eq!(history[0].username, "Ada");

        let err = clubs.send_message(&ctx, "club123", "   ").await.unwrap_err();
        assert_eq!(classify(&err), ErrorKind::Validation);
    }
}
