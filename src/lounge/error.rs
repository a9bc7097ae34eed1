//! 错误分类
//!
//! 所有操作返回 `anyhow::Result`，根因为 [`LoungeError`]。
//! 调用方通过 [`classify`] 区分校验失败、未登录和后端/网络失败。

use thiserror::Error;

/// BaaS 返回的 "Object not found" 错误码
pub const OBJECT_NOT_FOUND: i64 = 101;

#[derive(Debug, Error)]
pub enum LoungeError {
    /// 输入校验失败（空用户名、评分无效、重复申请等）
    #[error("{0}")]
    Validation(String),

    /// 当前没有登录用户
    #[error("请先登录")]
    NotLoggedIn,

    /// 已登录但无权操作该对象
    #[error("无权操作: {0}")]
    Forbidden(String),

    #[error("对象不存在: {0}")]
    NotFound(String),

    /// BaaS 返回的业务错误
    #[error("服务器错误 {code}: {message}")]
    Store { code: i64, message: String },

    /// 无法解析的 HTTP 错误响应
    #[error("HTTP 错误 {status}: {body}")]
    Http { status: u16, body: String },

    /// 图书目录 API 返回非 2xx
    #[error("图书目录 API 错误: {status}")]
    Catalog { status: u16 },

    #[error("LiveQuery 错误: {0}")]
    LiveQuery(String),

    #[error("配置错误: {0}")]
    Config(String),

    /// 所属视图已销毁，结果被丢弃
    #[error("操作已取消")]
    Cancelled,
}

/// 面向用户的三类错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotAuthenticated,
    Backend,
}

impl LoungeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoungeError::Validation(_) | LoungeError::Forbidden(_) => ErrorKind::Validation,
            LoungeError::NotLoggedIn => ErrorKind::NotAuthenticated,
            // 会话令牌失效
            LoungeError::Store { code: 209, .. } => ErrorKind::NotAuthenticated,
            _ => ErrorKind::Backend,
        }
    }
}

/// 在错误链中查找 [`LoungeError`]
pub fn find_lounge_error(err: &anyhow::Error) -> Option<&LoungeError> {
    err.chain().find_map(|e| e.downcast_ref::<LoungeError>())
}

/// 将任意错误归入三类之一，未知错误视为后端失败
pub fn classify(err: &anyhow::Error) -> ErrorKind {
    find_lounge_error(err)
        .map(LoungeError::kind)
        .unwrap_or(ErrorKind::Backend)
}

/// 阻塞式提示框使用的文本
pub fn user_message(err: &anyhow::Error) -> String {
    match find_lounge_error(err) {
        Some(LoungeError::Validation(msg)) => msg.clone(),
        Some(LoungeError::NotLoggedIn) => "Please log in to continue".to_string(),
        Some(LoungeError::Forbidden(msg)) => msg.clone(),
        Some(e) if e.kind() == ErrorKind::NotAuthenticated => {
            "Your session has expired, please log in again".to_string()
        }
        _ => format!("Something went wrong: {err}"),
    }
}
