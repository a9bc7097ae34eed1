//! LiveQuery 实时订阅模块
//!
//! [`LiveConnector`] 打开一个按查询过滤的推送订阅，
//! [`LiveQueryClient`] 基于 WebSocket 实现。

pub mod client;
pub mod protocol;

// 重新导出主要类型和函数
pub use client::{LiveConnector, LiveEvent, LiveQueryClient, LiveSubscription};
pub use protocol::{ClientOp, ServerOp, SubscriptionQuery};
