//! BaaS REST 实现
//!
//! 负责所有对象存储相关的 HTTP 请求

use crate::lounge::config::LoungeConfig;
use crate::lounge::store::{BatchOp, BatchResult, ObjectStore, Query};
use crate::lounge::types::{handle_http_response, BatchItemResponse, QueryResponse, Record, USER_CLASS};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

const HEADER_SESSION_TOKEN: &str = "X-Parse-Session-Token";
const HEADER_REQUEST_ID: &str = "X-Parse-Request-Id";

/// 基于 REST API 的对象存储客户端
pub struct RestStore {
    client: reqwest::Client,
    server_url: String,
    /// 服务挂载路径（例如 `/parse`），批量请求的 path 需要带上
    mount_path: String,
}

impl RestStore {
    /// 创建带应用凭据的 HTTP 客户端（凭据通过 default_headers 自动添加）
    pub fn new(config: &LoungeConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-parse-application-id"),
            HeaderValue::from_str(&config.application_id).context("无效的 application id")?,
        );
        headers.insert(
            HeaderName::from_static("x-parse-client-key"),
            HeaderValue::from_str(&config.client_key).context("无效的 client key")?,
        );

        let client = reqwest::ClientBuilder::new()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .context("创建 HTTP 客户端失败")?;

        let server_url = config.server_url.trim_end_matches('/').to_string();
        let mount_path = reqwest::Url::parse(&server_url)
            .with_context(|| format!("无效的服务地址: {server_url}"))?
            .path()
            .trim_end_matches('/')
            .to_string();

        info!(
            "[Store] 创建 REST 存储客户端，服务地址: {}, 挂载路径: '{}'",
            server_url, mount_path
        );

        Ok(Self {
            client,
            server_url,
            mount_path,
        })
    }

    /// 类对应的相对路径，`_User` 使用 `users` 端点
    fn class_path(class_name: &str) -> String {
        if class_name == USER_CLASS {
            "users".to_string()
        } else {
            format!("classes/{class_name}")
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.server_url, path)
    }

    fn request(&self, method: Method, path: &str, session_token: Option<&str>) -> RequestBuilder {
        let request_id = Uuid::new_v4().to_string();
        let url = self.url(path);
        debug!("[Store]   {} {} (请求ID: {})", method, url, request_id);

        let mut builder = self
            .client
            .request(method, url)
            .header(HEADER_REQUEST_ID, request_id);
        if let Some(token) = session_token {
            builder = builder.header(HEADER_SESSION_TOKEN, token);
        }
        builder
    }

    fn query_params(query: &Query) -> Vec<(&'static str, String)> {
        let mut params = vec![("where", query.where_clause().to_string())];
        if let Some(order) = query.order_param() {
            params.push(("order", order));
        }
        if let Some(limit) = query.limit_value() {
            params.push(("limit", limit.to_string()));
        }
        if let Some(skip) = query.skip_value() {
            params.push(("skip", skip.to_string()));
        }
        if !query.includes().is_empty() {
            params.push(("include", query.includes().join(",")));
        }
        if !query.keys().is_empty() {
            params.push(("keys", query.keys().join(",")));
        }
        params
    }

    async fn send<T: serde::de::DeserializeOwned>(
        builder: RequestBuilder,
        operation_name: &str,
    ) -> Result<T> {
        let response = builder.send().await.context("请求失败")?;
        handle_http_response(response, operation_name).await
    }
}

#[async_trait]
impl ObjectStore for RestStore {
    async fn find(&self, query: &Query, session_token: Option<&str>) -> Result<Vec<Record>> {
        info!("[Store] 📡 查询 {}", query.class_name());
        let builder = self
            .request(Method::GET, &Self::class_path(query.class_name()), session_token)
            .query(&Self::query_params(query));
        let resp: QueryResponse = Self::send(builder, "查询").await?;
        debug!("[Store] ✅ 查询 {} 返回 {} 条", query.class_name(), resp.results.len());
        Ok(resp.results)
    }

    async fn count(&self, query: &Query, session_token: Option<&str>) -> Result<u64> {
        let builder = self
            .request(Method::GET, &Self::class_path(query.class_name()), session_token)
            .query(&[
                ("where", query.where_clause().to_string()),
                ("count", "1".to_string()),
                ("limit", "0".to_string()),
            ]);
        let resp: QueryResponse = Self::send(builder, "计数").await?;
        Ok(resp.count.unwrap_or(0))
    }

    async fn get(
        &self,
        class_name: &str,
        object_id: &str,
        include: &[&str],
        session_token: Option<&str>,
    ) -> Result<Record> {
        let path = format!("{}/{}", Self::class_path(class_name), object_id);
        let mut builder = self.request(Method::GET, &path, session_token);
        if !include.is_empty() {
            builder = builder.query(&[("include", include.join(","))]);
        }
        Self::send(builder, "获取对象").await
    }

    async fn create(
        &self,
        class_name: &str,
        fields: Record,
        session_token: Option<&str>,
    ) -> Result<Record> {
        info!("[Store] 📝 创建 {}", class_name);
        let builder = self
            .request(Method::POST, &Self::class_path(class_name), session_token)
            .json(&fields);
        let mut created: Record = Self::send(builder, "创建对象").await?;
        // 响应只有 objectId/createdAt，合并提交的字段
        for (key, value) in fields {
            created.entry(key).or_insert(value);
        }
        created.insert("className".to_string(), Value::String(class_name.to_string()));
        Ok(created)
    }

    async fn update(
        &self,
        class_name: &str,
        object_id: &str,
        fields: Record,
        session_token: Option<&str>,
    ) -> Result<Record> {
        info!("[Store] ✏️ 更新 {} {}", class_name, object_id);
        let path = format!("{}/{}", Self::class_path(class_name), object_id);
        let builder = self
            .request(Method::PUT, &path, session_token)
            .json(&fields);
        Self::send(builder, "更新对象").await
    }

    async fn destroy(
        &self,
        class_name: &str,
        object_id: &str,
        session_token: Option<&str>,
    ) -> Result<()> {
        info!("[Store] 🗑️ 删除 {} {}", class_name, object_id);
        let path = format!("{}/{}", Self::class_path(class_name), object_id);
        let _: Value = Self::send(self.request(Method::DELETE, &path, session_token), "删除对象").await?;
        Ok(())
    }

    async fn batch(
        &self,
        ops: Vec<BatchOp>,
        session_token: Option<&str>,
    ) -> Result<Vec<BatchResult>> {
        info!("[Store] 📦 批量操作，共 {} 个请求", ops.len());
        let requests: Vec<Value> = ops
            .into_iter()
            .map(|op| match op {
                BatchOp::Create { class_name, fields } => serde_json::json!({
                    "method": "POST",
                    "path": format!("{}/{}", self.mount_path, Self::class_path(&class_name)),
                    "body": fields,
                }),
                BatchOp::Update {
                    class_name,
                    object_id,
                    fields,
                } => serde_json::json!({
                    "method": "PUT",
                    "path": format!("{}/{}/{}", self.mount_path, Self::class_path(&class_name), object_id),
                    "body": fields,
                }),
                BatchOp::Destroy {
                    class_name,
                    object_id,
                } => serde_json::json!({
                    "method": "DELETE",
                    "path": format!("{}/{}/{}", self.mount_path, Self::class_path(&class_name), object_id),
                }),
            })
            .collect();

        let builder = self
            .request(Method::POST, "batch", session_token)
            .json(&serde_json::json!({ "requests": requests }));
        let items: Vec<BatchItemResponse> = Self::send(builder, "批量操作").await?;
        Ok(items
            .into_iter()
            .map(|item| match item {
                BatchItemResponse::Success(record) => BatchResult::Success(record),
                BatchItemResponse::Error(e) => BatchResult::Failure {
                    code: e.code,
                    message: e.error,
                },
            })
            .collect())
    }

    async fn sign_up(&self, fields: Record) -> Result<Record> {
        info!("[Store] 🔐 注册用户");
        let builder = self
            .request(Method::POST, "users", None)
            .header("X-Parse-Revocable-Session", "1")
            .json(&fields);
        let mut created: Record = Self::send(builder, "注册").await?;
        for (key, value) in fields {
            if key != "password" {
                created.entry(key).or_insert(value);
            }
        }
        Ok(created)
    }

    async fn log_in(&self, identifier: &str, password: &str) -> Result<Record> {
        info!("[Store] 🔐 正在登录...");
        // 含 @ 的按邮箱登录
        let body = if identifier.contains('@') {
            serde_json::json!({ "email": identifier, "password": password })
        } else {
            serde_json::json!({ "username": identifier, "password": password })
        };
        let builder = self
            .request(Method::POST, "login", None)
            .header("X-Parse-Revocable-Session", "1")
            .json(&body);
        Self::send(builder, "登录").await
    }

    async fn current_user(&self, session_token: &str) -> Result<Record> {
        Self::send(
            self.request(Method::GET, "users/me", Some(session_token)),
            "获取当前用户",
        )
        .await
    }

    async fn log_out(&self, session_token: &str) -> Result<()> {
        let _: Value = Self::send(
            self.request(Method::POST, "logout", Some(session_token)),
            "退出登录",
        )
        .await?;
        Ok(())
    }
}
