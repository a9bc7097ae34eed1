//! 会话上下文
//!
//! 每个数据访问调用显式接收 [`SessionContext`]，不存在全局的 "当前用户"。

use crate::lounge::error::LoungeError;
use crate::lounge::types::Pointer;
use serde::{Deserialize, Serialize};

/// 已登录用户
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: String,
    pub session_token: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub profile_picture: String,
    #[serde(default)]
    pub reviews_anonymous: bool,
}

impl SessionUser {
    pub fn pointer(&self) -> Pointer {
        Pointer::user(&self.user_id)
    }

    /// 聊天消息中展示的名字：优先名，其次用户名
    pub fn display_name(&self) -> &str {
        if self.first_name.trim().is_empty() {
            &self.username
        } else {
            &self.first_name
        }
    }
}

/// 调用上下文：匿名或已登录
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    user: Option<SessionUser>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn authenticated(user: SessionUser) -> Self {
        Self { user: Some(user) }
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// 写操作前调用：未登录时返回 [`LoungeError::NotLoggedIn`]
    pub fn require_user(&self) -> Result<&SessionUser, LoungeError> {
        self.user.as_ref().ok_or(LoungeError::NotLoggedIn)
    }

    pub fn token(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.session_token.as_str())
    }

    /// 资料更新后替换缓存的用户信息，会话令牌保持不变
    pub fn replace_user(&mut self, user: SessionUser) {
        self.user = Some(user);
    }

    pub fn clear(&mut self) {
        self.user = None;
    }
}
