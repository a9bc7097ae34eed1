//! 视图生命周期内的取消范围
//!
//! 视图关闭（drop 或 `cancel`）后，尚未完成的请求结果不会再写回视图。

use crate::lounge::error::LoungeError;
use anyhow::Result;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ViewScope {
    token: CancellationToken,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// 子范围：父范围取消时一并取消
    pub fn child(&self) -> ViewScope {
        ViewScope {
            token: self.token.child_token(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        debug!("[ViewScope] 取消视图范围");
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 在范围内运行；范围已取消时返回 `None`，结果不应再写回视图
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            output = fut => (!self.token.is_cancelled()).then_some(output),
        }
    }

    /// 同 [`run`](Self::run)，取消时返回 `LoungeError::Cancelled`
    pub async fn try_run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.run(fut).await {
            Some(result) => result,
            None => Err(LoungeError::Cancelled.into()),
        }
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn completed_work_is_returned() {
        let scope = ViewScope::new();
        assert_eq!(scope.run(async { 42 }).await, Some(42));
    }

    #[tokio::test]
    async fn cancelled_scope_drops_result() {
        let scope = ViewScope::new();
        let token = scope.token();
        let slow = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            "stale"
        };
        let canceller = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            token.cancel();
        };
        let (result, ()) = tokio::join!(scope.run(slow), canceller);
        assert_eq!(result, None);
        assert_eq!(scope.run(async { 1 }).await, None);
    }

    #[tokio::test]
    async fn try_run_reports_cancellation() {
        let scope = ViewScope::new();
        assert_eq!(scope.try_run(async { anyhow::Ok(7) }).await.unwrap(), 7);

        scope.cancel();
        let err = scope.try_run(async { anyhow::Ok(7) }).await.unwrap_err();
        assert!(matches!(
            crate::lounge::error::find_lounge_error(&err),
            Some(LoungeError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn parent_cancels_children_and_drop_cancels() {
        let parent = ViewScope::new();
        let child = parent.child();
        let token = parent.token();
        drop(parent);
        assert!(token.is_cancelled());
        assert!(child.is_cancelled());
    }
}
