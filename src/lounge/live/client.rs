//! LiveQuery WebSocket 客户端
//!
//! 每个订阅使用独立的连接：握手（connect → connected，subscribe → subscribed）完成后，
//! 由后台任务把服务端事件转发到 mpsc 通道。连接失败后不重连。

use crate::lounge::config::LoungeConfig;
use crate::lounge::error::LoungeError;
use crate::lounge::live::protocol::{ClientOp, ServerOp, SubscriptionQuery};
use crate::lounge::store::Query;
use crate::lounge::types::Record;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, WsMessage>;
type WsReader = SplitStream<WsStream>;

/// 心跳间隔
const PING_INTERVAL: Duration = Duration::from_secs(25);

/// 握手超时
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// 订阅推送的事件
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Created(Record),
    Updated(Record),
    Deleted(Record),
    /// 对象更新后开始满足查询条件
    Entered(Record),
    /// 对象更新后不再满足查询条件
    Left(Record),
    /// 推送通道失败，之后不会再有事件
    Failed(String),
}

/// 一个打开的订阅
///
/// `close` 会等待后台任务退出；直接 drop 只发出取消信号。
pub struct LiveSubscription {
    request_id: u64,
    events: mpsc::UnboundedReceiver<LiveEvent>,
    shutdown: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl LiveSubscription {
    /// 由事件通道构造订阅（用于自定义的 [`LiveConnector`]）
    pub fn from_channel(
        request_id: u64,
        events: mpsc::UnboundedReceiver<LiveEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            request_id,
            events,
            shutdown,
            worker: None,
        }
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// 下一个事件；通道关闭后返回 `None`
    pub async fn next_event(&mut self) -> Option<LiveEvent> {
        self.events.recv().await
    }

    /// 取消订阅并等待连接关闭
    pub async fn close(mut self) {
        self.shutdown.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!("[LiveQuery] ⚠️ 订阅任务异常退出: {}", e);
            }
        }
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// 打开按查询过滤的推送订阅
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn subscribe(&self, query: &Query, session_token: Option<&str>) -> Result<LiveSubscription>;
}

/// 基于 WebSocket 的 LiveQuery 客户端
pub struct LiveQueryClient {
    url: String,
    application_id: String,
    client_key: String,
    installation_id: String,
    handshake_timeout: Duration,
    next_request_id: AtomicU64,
}

impl LiveQueryClient {
    pub fn new(config: &LoungeConfig) -> Self {
        Self {
            url: config.live_query_url.clone(),
            application_id: config.application_id.clone(),
            client_key: config.client_key.clone(),
            installation_id: Uuid::new_v4().to_string(),
            handshake_timeout: HANDSHAKE_TIMEOUT,
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    async fn handshake(
        &self,
        query: &Query,
        session_token: Option<&str>,
        request_id: u64,
    ) -> Result<(WsWriter, WsReader)> {
        let (ws_stream, response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| LoungeError::LiveQuery(format!("连接失败: {e}")))?;
        info!("[LiveQuery] ✅ WebSocket 连接成功, 状态: {}", response.status());

        let (mut write, mut read) = ws_stream.split();

        send_op(
            &mut write,
            &ClientOp::Connect {
                application_id: self.application_id.clone(),
                client_key: self.client_key.clone(),
                session_token: session_token.map(str::to_string),
                installation_id: self.installation_id.clone(),
            },
        )
        .await?;
        wait_for(&mut read, |op| matches!(op, ServerOp::Connected { .. })).await?;
        debug!("[LiveQuery] 服务端已确认连接");

        send_op(
            &mut write,
            &ClientOp::Subscribe {
                request_id,
                query: SubscriptionQuery {
                    class_name: query.class_name().to_string(),
                    where_clause: query.where_clause(),
                },
                session_token: session_token.map(str::to_string),
            },
        )
        .await?;
        wait_for(&mut read, |op| {
            matches!(op, ServerOp::Subscribed { request_id: id } if *id == request_id)
        })
        .await?;

        Ok((write, read))
    }
}

#[async_trait]
impl LiveConnector for LiveQueryClient {
    async fn subscribe(&self, query: &Query, session_token: Option<&str>) -> Result<LiveSubscription> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        info!(
            "[LiveQuery] 🔗 订阅 {} (请求ID: {}, 地址: {})",
            query.class_name(),
            request_id,
            self.url
        );

        let (write, read) = timeout(
            self.handshake_timeout,
            self.handshake(query, session_token, request_id),
        )
        .await
        .map_err(|_| LoungeError::LiveQuery("握手超时".to_string()))??;
        info!("[LiveQuery] ✅ 订阅成功 (请求ID: {})", request_id);

        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let worker = tokio::spawn(run_subscription(write, read, tx, shutdown.clone(), request_id));

        Ok(LiveSubscription {
            request_id,
            events: rx,
            shutdown,
            worker: Some(worker),
        })
    }
}

async fn send_op(write: &mut WsWriter, op: &ClientOp) -> Result<()> {
    let text = serde_json::to_string(op).context("序列化 LiveQuery 消息失败")?;
    debug!("[LiveQuery] 📤 {}", text);
    write
        .send(WsMessage::Text(text))
        .await
        .map_err(|e| LoungeError::LiveQuery(format!("发送失败: {e}")).into())
}

/// 读取直到收到满足条件的消息；服务端返回 error 时失败
async fn wait_for<F>(read: &mut WsReader, expected: F) -> Result<ServerOp>
where
    F: Fn(&ServerOp) -> bool,
{
    while let Some(frame) = read.next().await {
        let frame = frame.map_err(|e| LoungeError::LiveQuery(format!("读取失败: {e}")))?;
        let WsMessage::Text(text) = frame else {
            continue;
        };
        debug!("[LiveQuery] 📥 {}", text);
        match serde_json::from_str::<ServerOp>(&text) {
            Ok(ServerOp::Error { code, error, .. }) => {
                error!("[LiveQuery] ❌ 服务端错误: {:?} {}", code, error);
                return Err(LoungeError::LiveQuery(error).into());
            }
            Ok(op) if expected(&op) => return Ok(op),
            Ok(_) => {}
            Err(e) => warn!("[LiveQuery] ⚠️ 无法解析的消息: {}, 原始: {}", e, text),
        }
    }
    Err(LoungeError::LiveQuery("连接已关闭".to_string()).into())
}

/// 服务端消息转为订阅事件，其他请求 ID 的事件被忽略
fn to_event(op: ServerOp, request_id: u64) -> Option<LiveEvent> {
    let (event, id) = match op {
        ServerOp::Create(e) => (LiveEvent::Created(e.object), e.request_id),
        ServerOp::Update(e) => (LiveEvent::Updated(e.object), e.request_id),
        ServerOp::Delete(e) => (LiveEvent::Deleted(e.object), e.request_id),
        ServerOp::Enter(e) => (LiveEvent::Entered(e.object), e.request_id),
        ServerOp::Leave(e) => (LiveEvent::Left(e.object), e.request_id),
        ServerOp::Error { error, .. } => return Some(LiveEvent::Failed(error)),
        _ => return None,
    };
    (id == request_id).then_some(event)
}

async fn run_subscription(
    mut write: WsWriter,
    mut read: WsReader,
    tx: mpsc::UnboundedSender<LiveEvent>,
    shutdown: CancellationToken,
    request_id: u64,
) {
    let mut ticker = interval(PING_INTERVAL);
    // interval 的第一次 tick 立即完成
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("[LiveQuery] 取消订阅 (请求ID: {})", request_id);
                let _ = send_op(&mut write, &ClientOp::Unsubscribe { request_id }).await;
                let _ = write.close().await;
                break;
            }
            _ = ticker.tick() => {
                if write.send(WsMessage::Ping(vec![])).await.is_err() {
                    let _ = tx.send(LiveEvent::Failed("发送心跳失败".to_string()));
                    break;
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        debug!("[LiveQuery] 📥 {}", text);
                        let op = match serde_json::from_str::<ServerOp>(&text) {
                            Ok(op) => op,
                            Err(e) => {
                                warn!("[LiveQuery] ⚠️ 无法解析的消息: {}", e);
                                continue;
                            }
                        };
                        if let Some(event) = to_event(op, request_id) {
                            let failed = matches!(event, LiveEvent::Failed(_));
                            if tx.send(event).is_err() || failed {
                                break;
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        warn!("[LiveQuery] 👋 连接关闭: {:?}", frame);
                        let _ = tx.send(LiveEvent::Failed("连接已关闭".to_string()));
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("[LiveQuery] WebSocket 错误: {}", e);
                        let _ = tx.send(LiveEvent::Failed(e.to_string()));
                        break;
                    }
                    None => {
                        let _ = tx.send(LiveEvent::Failed("连接已关闭".to_string()));
                        break;
                    }
                }
            }
        }
    }
    info!("[LiveQuery] 订阅已结束 (请求ID: {})", request_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lounge::test_support::init_test_logger;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    /// 本地 LiveQuery 服务：完成握手、推送一条 create 事件，并把收到的 op 回传
    async fn spawn_server(reject: bool) -> (String, mpsc::UnboundedReceiver<Value>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(frame)) = ws.next().await {
                let WsMessage::Text(text) = frame else {
                    continue;
                };
                let op: Value = serde_json::from_str(&text).unwrap();
                let _ = seen_tx.send(op.clone());
                let reply = match op["op"].as_str() {
                    Some("connect") if reject => {
                        json!({"op": "error", "code": 4, "error": "Key in request is not valid", "reconnect": false})
                    }
                    Some("connect") => json!({"op": "connected", "clientId": "c1"}),
                    Some("subscribe") => {
                        let id = op["requestId"].clone();
                        let subscribed = json!({"op": "subscribed", "clientId": "c1", "requestId": id});
                        ws.send(WsMessage::Text(subscribed.to_string())).await.unwrap();
                        json!({"op": "create", "clientId": "c1", "requestId": id,
                               "object": {"objectId": "m1", "clubId": "club123", "text": "hello"}})
                    }
                    _ => continue,
                };
                if ws.send(WsMessage::Text(reply.to_string())).await.is_err() {
                    break;
                }
            }
        });

        (format!("ws://{addr}"), seen_rx)
    }

    fn client_for(url: &str) -> LiveQueryClient {
        let config = LoungeConfig::new("app".into(), "key".into(), "http://localhost:1337/parse".into())
            .with_live_query_url(url);
        LiveQueryClient::new(&config).with_handshake_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn subscribe_receives_events_and_unsubscribes_on_close() {
        init_test_logger();
        let (url, mut seen) = spawn_server(false).await;
        let client = client_for(&url);

        let query = Query::new("Message").equal_to("clubId", "club123");
        let mut subscription = client.subscribe(&query, Some("r:token")).await.unwrap();

        let event = subscription.next_event().await.unwrap();
        match event {
            LiveEvent::Created(object) => assert_eq!(object["text"], "hello"),
            other => panic!("unexpected event {other:?}"),
        }

        let connect = seen.recv().await.unwrap();
        assert_eq!(connect["applicationId"], "app");
        assert_eq!(connect["sessionToken"], "r:token");
        let subscribe = seen.recv().await.unwrap();
        assert_eq!(subscribe["query"]["where"], json!({"clubId": "club123"}));

        let request_id = subscription.request_id();
        subscription.close().await;
        let unsubscribe = seen.recv().await.unwrap();
        assert_eq!(unsubscribe["op"], "unsubscribe");
        assert_eq!(unsubscribe["requestId"], request_id);
    }

    #[tokio::test]
    async fn server_error_fails_the_handshake() {
        init_test_logger();
        let (url, _seen) = spawn_server(true).await;
        let err = client_for(&url)
            .subscribe(&Query::new("Message"), None)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            crate::lounge::error::find_lounge_error(&err),
            Some(LoungeError::LiveQuery(msg)) if msg.contains("not valid")
        ));
    }

    #[test]
    fn events_for_other_requests_are_ignored() {
        let op: ServerOp = serde_json::from_value(
            json!({"op": "update", "requestId": 7, "object": {"objectId": "m1"}}),
        )
        .unwrap();
        assert_eq!(to_event(op.clone(), 3), None);
        assert!(matches!(to_event(op, 7), Some(LiveEvent::Updated(_))));
    }
}
