//! 对象存储客户端
//!
//! [`ObjectStore`] 描述 BaaS 提供的对象/查询/用户原语，
//! [`RestStore`] 通过 REST API 实现，[`MemoryStore`] 在进程内实现同样的语义。

pub mod memory;
pub mod query;
pub mod rest;

pub use memory::MemoryStore;
pub use query::{Query, SortKey};
pub use rest::RestStore;

use crate::lounge::types::{decode, decode_all, Record};
use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// 批量操作中的单个请求
#[derive(Debug, Clone)]
pub enum BatchOp {
    Create { class_name: String, fields: Record },
    Update { class_name: String, object_id: String, fields: Record },
    Destroy { class_name: String, object_id: String },
}

impl BatchOp {
    pub fn create(class_name: &str, fields: Record) -> Self {
        BatchOp::Create {
            class_name: class_name.to_string(),
            fields,
        }
    }

    pub fn destroy(class_name: &str, object_id: &str) -> Self {
        BatchOp::Destroy {
            class_name: class_name.to_string(),
            object_id: object_id.to_string(),
        }
    }
}

/// 批量操作中单个请求的结果
#[derive(Debug, Clone)]
pub enum BatchResult {
    Success(Record),
    Failure { code: i64, message: String },
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchResult::Success(_))
    }
}

/// BaaS 对象存储接口
///
/// 所有方法显式接收会话令牌（匿名调用传 `None`）。
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 执行查询
    async fn find(&self, query: &Query, session_token: Option<&str>) -> Result<Vec<Record>>;

    /// 计数（忽略 limit/skip）
    async fn count(&self, query: &Query, session_token: Option<&str>) -> Result<u64>;

    /// 按 ID 获取，不存在时返回 `LoungeError::NotFound`
    async fn get(
        &self,
        class_name: &str,
        object_id: &str,
        include: &[&str],
        session_token: Option<&str>,
    ) -> Result<Record>;

    /// 创建对象，返回至少包含 `objectId`、`createdAt` 的记录
    async fn create(
        &self,
        class_name: &str,
        fields: Record,
        session_token: Option<&str>,
    ) -> Result<Record>;

    /// 更新对象（支持 `Increment` 等操作），返回被修改的字段
    async fn update(
        &self,
        class_name: &str,
        object_id: &str,
        fields: Record,
        session_token: Option<&str>,
    ) -> Result<Record>;

    async fn destroy(
        &self,
        class_name: &str,
        object_id: &str,
        session_token: Option<&str>,
    ) -> Result<()>;

    /// 批量操作，非原子：各请求独立成功或失败
    async fn batch(&self, ops: Vec<BatchOp>, session_token: Option<&str>)
        -> Result<Vec<BatchResult>>;

    /// 注册用户，返回的记录包含 `sessionToken`
    async fn sign_up(&self, fields: Record) -> Result<Record>;

    /// 登录，`identifier` 为用户名或邮箱
    async fn log_in(&self, identifier: &str, password: &str) -> Result<Record>;

    /// 会话令牌对应的用户
    async fn current_user(&self, session_token: &str) -> Result<Record>;

    async fn log_out(&self, session_token: &str) -> Result<()>;

    /// 查询第一条
    async fn first(&self, query: &Query, session_token: Option<&str>) -> Result<Option<Record>> {
        let limited = query.clone().limit(1);
        Ok(self.find(&limited, session_token).await?.into_iter().next())
    }
}

/// 查询并投影为业务模型
pub async fn find_as<T: DeserializeOwned>(
    store: &dyn ObjectStore,
    query: &Query,
    session_token: Option<&str>,
) -> Result<Vec<T>> {
    decode_all(store.find(query, session_token).await?)
}

/// 查询第一条并投影为业务模型
pub async fn first_as<T: DeserializeOwned>(
    store: &dyn ObjectStore,
    query: &Query,
    session_token: Option<&str>,
) -> Result<Option<T>> {
    store
        .first(query, session_token)
        .await?
        .map(decode)
        .transpose()
}

/// 批量结果中任一失败即返回错误（已成功的部分不会回滚）
pub fn ensure_batch_succeeded(results: &[BatchResult]) -> Result<()> {
    for result in results {
        if let BatchResult::Failure { code, message } = result {
            return Err(crate::lounge::error::LoungeError::Store {
                code: *code,
                message: message.clone(),
            }
            .into());
        }
    }
    Ok(())
}
