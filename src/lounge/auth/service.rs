//! 账号服务

use crate::lounge::auth::models::{
    validate_username, ProfileUpdate, Registration, UserProfile, UserSummary,
};
use crate::lounge::error::LoungeError;
use crate::lounge::session::SessionContext;
use crate::lounge::store::{find_as, ObjectStore, Query};
use crate::lounge::types::{decode, record_str, to_record, Record, USER_CLASS};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

/// 用户检索条数上限
pub const USER_SEARCH_LIMIT: usize = 10;

pub struct AuthService {
    store: Arc<dyn ObjectStore>,
}

impl AuthService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// 用户名是否可用，查询失败时按不可用处理
    pub async fn check_username_availability(&self, username: &str) -> bool {
        let query = Query::new(USER_CLASS).equal_to("username", username);
        match self.store.count(&query, None).await {
            Ok(count) => count == 0,
            Err(e) => {
                warn!("[AuthService] ⚠️ 检查用户名失败: {:#}", e);
                false
            }
        }
    }

    /// 注册并登录
    pub async fn register(&self, form: &Registration) -> Result<SessionContext> {
        form.validate()?;
        if !self.check_username_availability(&form.username).await {
            return Err(LoungeError::Validation(
                "Username is already taken. Please choose another one.".to_string(),
            )
            .into());
        }

        info!("[AuthService] 📝 注册用户: {}", form.username);
        let fields = json!({
            "username": form.username,
            "firstName": form.first_name.trim(),
            "lastName": form.last_name.trim(),
            "email": form.email.trim(),
            "password": form.password,
            "profilePicture": "",
            "reviewsAnonymous": false,
            "ACL": { "*": { "read": true } },
        });
        let created = self
            .store
            .sign_up(to_record(fields))
            .await
            .context("注册失败")?;
        Self::session_from_record(created)
    }

    /// 用户名或邮箱登录
    pub async fn log_in(&self, identifier: &str, password: &str) -> Result<SessionContext> {
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(LoungeError::Validation(
                "Please enter your username or email and password".to_string(),
            )
            .into());
        }
        info!("[AuthService] 🔐 用户登录: {}", identifier);
        let record = self
            .store
            .log_in(identifier, password)
            .await
            .context("登录失败")?;
        let ctx = Self::session_from_record(record)?;
        info!("[AuthService] ✅ 登录成功");
        Ok(ctx)
    }

    /// 用已有的会话令牌恢复会话
    pub async fn restore_session(&self, session_token: &str) -> Result<SessionContext> {
        let mut record = self
            .store
            .current_user(session_token)
            .await
            .context("恢复会话失败")?;
        record.insert(
            "sessionToken".to_string(),
            Value::String(session_token.to_string()),
        );
        Self::session_from_record(record)
    }

    /// 退出登录，本地会话总会被清除
    pub async fn log_out(&self, ctx: &mut SessionContext) -> Result<()> {
        let token = ctx.token().map(str::to_string);
        ctx.clear();
        if let Some(token) = token {
            self.store.log_out(&token).await.context("退出登录失败")?;
            info!("[AuthService] 👋 已退出登录");
        }
        Ok(())
    }

    pub async fn current_profile(&self, ctx: &SessionContext) -> Result<UserProfile> {
        let user = ctx.require_user()?;
        let record = self
            .store
            .current_user(&user.session_token)
            .await
            .context("获取用户资料失败")?;
        decode(record)
    }

    /// 修改资料；只有用户名变化时才重新检查可用性
    pub async fn update_profile(
        &self,
        ctx: &mut SessionContext,
        update: ProfileUpdate,
    ) -> Result<UserProfile> {
        let user = ctx.require_user()?.clone();
        if update.is_empty() {
            return Err(LoungeError::Validation("Nothing to update".to_string()).into());
        }

        let mut fields = Record::new();
        if let Some(username) = update.username {
            let username = username.trim().to_string();
            if username != user.username {
                validate_username(&username)?;
                if !self.check_username_availability(&username).await {
                    return Err(LoungeError::Validation(
                        "Username is already taken. Please choose another one.".to_string(),
                    )
                    .into());
                }
                fields.insert("username".to_string(), Value::String(username));
            }
        }
        if let Some(picture) = update.profile_picture {
            fields.insert("profilePicture".to_string(), Value::String(picture));
        }
        if let Some(anonymous) = update.reviews_anonymous {
            fields.insert("reviewsAnonymous".to_string(), Value::Bool(anonymous));
        }
        if let Some(genres) = update.favorite_genres {
            fields.insert("favoriteGenres".to_string(), json!(genres));
        }

        if !fields.is_empty() {
            info!("[AuthService] ✏️ 更新资料字段: {:?}", fields.keys().collect::<Vec<_>>());
            self.store
                .update(USER_CLASS, &user.user_id, fields, Some(&user.session_token))
                .await
                .context("更新资料失败")?;
        }

        let profile = self.current_profile(ctx).await?;
        ctx.replace_user(profile.clone().into_session_user(user.session_token));
        Ok(profile)
    }

    /// 按用户名模糊检索（不区分大小写），失败时返回空列表
    pub async fn search_users(&self, term: &str) -> Vec<UserSummary> {
        let term = term.trim();
        if term.is_empty() {
            return Vec::new();
        }
        let query = Query::new(USER_CLASS)
            .contains_ignore_case("username", term)
            .limit(USER_SEARCH_LIMIT);
        match find_as(self.store.as_ref(), &query, None).await {
            Ok(users) => users,
            Err(e) => {
                error!("[AuthService] ❌ 检索用户失败: {:#}", e);
                Vec::new()
            }
        }
    }

    fn session_from_record(record: Record) -> Result<SessionContext> {
        let token = record_str(&record, "sessionToken")
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("响应中缺少 sessionToken 字段"))?;
        let profile: UserProfile = decode(record)?;
        Ok(SessionContext::authenticated(
            profile.into_session_user(token),
        ))
    }
}
