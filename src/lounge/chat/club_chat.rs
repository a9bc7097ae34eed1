//! 读书会聊天会话
//!
//! 同一时间只关注一个读书会。切换读书会时先关闭旧订阅（等待其退出），
//! 再拉取新读书会的历史消息并订阅推送。
//! `select_club` 和 `close` 互斥执行，后发起的一方等待前一方完成。

use crate::lounge::chat::listener::ChatListener;
use crate::lounge::chat::state::{ChatChange, ChatPhase, ChatState};
use crate::lounge::club::{ChatMessage, ClubService, HISTORY_LIMIT, MESSAGE_CLASS};
use crate::lounge::error::LoungeError;
use crate::lounge::live::{LiveConnector, LiveEvent, LiveSubscription};
use crate::lounge::session::SessionContext;
use crate::lounge::store::{find_as, ObjectStore, Query};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

struct Pump {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

pub struct ClubChat {
    store: Arc<dyn ObjectStore>,
    clubs: ClubService,
    connector: Arc<dyn LiveConnector>,
    listener: Arc<dyn ChatListener>,
    state: Arc<Mutex<ChatState>>,
    pump: Mutex<Option<Pump>>,
    /// 串行化 `select_club` / `close`
    select_lock: Mutex<()>,
    /// 所有推送任务的父令牌，drop 时取消
    root: CancellationToken,
}

impl ClubChat {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        connector: Arc<dyn LiveConnector>,
        listener: Arc<dyn ChatListener>,
    ) -> Self {
        Self {
            clubs: ClubService::new(store.clone()),
            store,
            connector,
            listener,
            state: Arc::new(Mutex::new(ChatState::default())),
            pump: Mutex::new(None),
            select_lock: Mutex::new(()),
            root: CancellationToken::new(),
        }
    }

    pub async fn phase(&self) -> ChatPhase {
        self.state.lock().await.phase
    }

    pub async fn club_id(&self) -> Option<String> {
        self.state.lock().await.club_id.clone()
    }

    /// 当前消息快照，最早的在前
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().await.messages.clone()
    }

    /// 切换到指定读书会
    ///
    /// 历史消息拉取失败时返回错误并回到 Idle；
    /// 订阅失败不算错误，进入 HistoryOnly。
    pub async fn select_club(&self, ctx: &SessionContext, club_id: &str) -> Result<()> {
        let _selecting = self.select_lock.lock().await;
        self.teardown().await;
        info!("[ClubChat] 📖 进入读书会聊天: {}", club_id);
        self.state.lock().await.begin(club_id);

        let query = ClubService::history_query(club_id).limit(HISTORY_LIMIT);
        let history: Vec<ChatMessage> = match find_as(self.store.as_ref(), &query, ctx.token())
            .await
            .context("获取聊天历史失败")
        {
            Ok(history) => history,
            Err(e) => {
                error!("[ClubChat] ❌ 历史消息加载失败: {:#}", e);
                self.state.lock().await.reset(ChatPhase::Idle);
                return Err(e);
            }
        };
        debug!("[ClubChat] 历史消息 {} 条", history.len());

        {
            let mut state = self.state.lock().await;
            state.messages = history.clone();
            state.phase = ChatPhase::Subscribing;
        }
        self.listener
            .on_history_loaded(club_id.to_string(), history)
            .await;

        let live_query = Query::new(MESSAGE_CLASS).equal_to("clubId", club_id);
        match self.connector.subscribe(&live_query, ctx.token()).await {
            Ok(subscription) => {
                self.state.lock().await.phase = ChatPhase::Live;
                self.listener
                    .on_connection_status_changed(true, "Live".to_string())
                    .await;
                self.start_pump(subscription).await;
            }
            Err(e) => {
                warn!("[ClubChat] ⚠️ 订阅失败，只显示历史消息: {:#}", e);
                self.state.lock().await.phase = ChatPhase::HistoryOnly;
                self.listener
                    .on_connection_status_changed(false, format!("{:#}", e))
                    .await;
            }
        }
        Ok(())
    }

    /// 发送消息到当前读书会，并立即加入本地列表（推送回显按 ID 去重）
    pub async fn send(&self, ctx: &SessionContext, text: &str) -> Result<ChatMessage> {
        let club_id = self
            .club_id()
            .await
            .ok_or_else(|| LoungeError::Validation("Please select a club first".to_string()))?;
        let message = self.clubs.send_message(ctx, &club_id, text).await?;

        let change = {
            let mut state = self.state.lock().await;
            if state.club_id.as_deref() == Some(club_id.as_str()) {
                state.append(message.clone())
            } else {
                ChatChange::Ignored
            }
        };
        if let ChatChange::Appended(appended) = change {
            self.listener.on_message_created(appended).await;
        }
        Ok(message)
    }

    /// 关闭聊天并释放订阅
    pub async fn close(&self) {
        let _selecting = self.select_lock.lock().await;
        self.teardown().await;
        self.state.lock().await.reset(ChatPhase::Closed);
        info!("[ClubChat] 👋 聊天已关闭");
    }

    async fn start_pump(&self, subscription: LiveSubscription) {
        let shutdown = self.root.child_token();
        let task = tokio::spawn(pump_events(
            subscription,
            shutdown.clone(),
            self.state.clone(),
            self.listener.clone(),
        ));
        let replaced = self.pump.lock().await.replace(Pump { shutdown, task });
        if let Some(pump) = replaced {
            stop_pump(pump).await;
        }
    }

    async fn teardown(&self) {
        let pump = self.pump.lock().await.take();
        if let Some(pump) = pump {
            stop_pump(pump).await;
        }
    }
}

impl Drop for ClubChat {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

async fn stop_pump(pump: Pump) {
    debug!("[ClubChat] 关闭旧订阅");
    pump.shutdown.cancel();
    if let Err(e) = pump.task.await {
        warn!("[ClubChat] ⚠️ 推送任务异常退出: {}", e);
    }
}

async fn pump_events(
    mut subscription: LiveSubscription,
    shutdown: CancellationToken,
    state: Arc<Mutex<ChatState>>,
    listener: Arc<dyn ChatListener>,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => {
                subscription.close().await;
                return;
            }
            event = subscription.next_event() => event,
        };

        let event = match event {
            Some(LiveEvent::Failed(reason)) => {
                fall_back_to_history(&state, listener.as_ref(), reason).await;
                return;
            }
            None => {
                fall_back_to_history(&state, listener.as_ref(), "Live updates closed".to_string()).await;
                return;
            }
            Some(event) => event,
        };

        let change = state.lock().await.apply(event);
        match change {
            ChatChange::Appended(message) => listener.on_message_created(message).await,
            ChatChange::Replaced(message) => listener.on_message_updated(message).await,
            ChatChange::Removed(id) => listener.on_message_removed(id).await,
            ChatChange::Ignored => {}
        }
    }
}

async fn fall_back_to_history(state: &Mutex<ChatState>, listener: &dyn ChatListener, reason: String) {
    warn!("[ClubChat] ⚠️ 推送中断，只显示历史消息: {}", reason);
    state.lock().await.phase = ChatPhase::HistoryOnly;
    listener.on_connection_status_changed(false, reason).await;
}
