//! 客户端配置
//!
//! BaaS 应用凭据与各服务地址，进程启动时提供。

use crate::lounge::error::LoungeError;
use std::time::Duration;
use tracing::{info, warn};

/// 默认的图书目录 API 地址
pub const DEFAULT_CATALOG_URL: &str = "https://www.googleapis.com/books/v1/volumes";

/// 默认的 BaaS REST 地址
pub const DEFAULT_SERVER_URL: &str = "https://parseapi.back4app.com";

/// 默认请求超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// 客户端配置
#[derive(Clone, Debug)]
pub struct LoungeConfig {
    /// BaaS 应用 ID
    pub application_id: String,
    /// BaaS 客户端密钥
    pub client_key: String,
    /// REST 服务地址，例如 `https://parseapi.back4app.com`
    pub server_url: String,
    /// LiveQuery WebSocket 地址
    pub live_query_url: String,
    /// 图书目录 API 地址
    pub catalog_base_url: String,
    /// HTTP 请求超时
    pub request_timeout: Duration,
}

impl LoungeConfig {
    /// 创建默认配置，LiveQuery 地址由 REST 地址推导
    pub fn new(application_id: String, client_key: String, server_url: String) -> Self {
        let server_url = server_url.trim_end_matches('/').to_string();
        let live_query_url = derive_live_query_url(&server_url);
        Self {
            application_id,
            client_key,
            server_url,
            live_query_url,
            catalog_base_url: DEFAULT_CATALOG_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// 覆盖 LiveQuery 地址
    pub fn with_live_query_url(mut self, url: impl Into<String>) -> Self {
        self.live_query_url = url.into();
        self
    }

    /// 覆盖图书目录地址
    pub fn with_catalog_base_url(mut self, url: impl Into<String>) -> Self {
        self.catalog_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// 从环境变量读取配置
    ///
    /// 必填：`LOUNGE_APP_ID`、`LOUNGE_CLIENT_KEY`、`LOUNGE_SERVER_URL`；
    /// 可选：`LOUNGE_LIVE_QUERY_URL`、`LOUNGE_CATALOG_URL`、`LOUNGE_TIMEOUT_SECS`。
    pub fn from_env() -> Result<Self, LoungeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, LoungeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| LoungeError::Config(format!("缺少环境变量 {key}")))
        };

        let mut config = Self::new(
            required("LOUNGE_APP_ID")?,
            required("LOUNGE_CLIENT_KEY")?,
            required("LOUNGE_SERVER_URL")?,
        );

        if let Some(url) = lookup("LOUNGE_LIVE_QUERY_URL") {
            config = config.with_live_query_url(url);
        }
        if let Some(url) = lookup("LOUNGE_CATALOG_URL") {
            config = config.with_catalog_base_url(url);
        }
        if let Some(raw) = lookup("LOUNGE_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) => config.request_timeout = Duration::from_secs(secs),
                Err(e) => warn!("[Config] LOUNGE_TIMEOUT_SECS 无效 ({raw}): {e}，使用默认值"),
            }
        }

        info!(
            "[Config] 服务地址: {}, LiveQuery: {}",
            config.server_url, config.live_query_url
        );
        Ok(config)
    }
}

/// http -> ws, https -> wss
fn derive_live_query_url(server_url: &str) -> String {
    if let Some(rest) = server_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = server_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        server_url.to_string()
    }
}
