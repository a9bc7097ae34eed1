//! 单元测试公共工具：日志、一次性 HTTP 服务、内存存储中的测试用户、可暂停的存储

use crate::lounge::session::{SessionContext, SessionUser};
use crate::lounge::store::{BatchOp, BatchResult, MemoryStore, ObjectStore, Query};
use crate::lounge::types::{record_str, Record};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Notify, Semaphore};

static INIT_LOGGER: Once = Once::new();

pub(crate) fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::EnvFilter;

        let filter_layer =
            EnvFilter::new("info,literary_lounge_sdk=debug,hyper_util::client=info,reqwest=info");

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_target(false)
            .with_test_writer();

        let _ = tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .try_init();
    });
}

/// 只应答一次的本地 HTTP 服务
pub(crate) struct TestServer {
    pub base_url: String,
    request: oneshot::Receiver<String>,
}

impl TestServer {
    /// 服务端收到的原始请求（请求行 + 头 + body）
    pub async fn request(self) -> String {
        self.request.await.unwrap_or_default()
    }
}

pub(crate) async fn serve_once(status_line: &'static str, body: String) -> TestServer {
    init_test_logger();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let raw = read_request(&mut socket).await;
        let _ = tx.send(raw);

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    });

    TestServer {
        base_url: format!("http://{addr}"),
        request: rx,
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// 在内存存储中注册一个用户并返回其会话
pub(crate) async fn sign_in(store: &MemoryStore, username: &str, first_name: &str) -> SessionContext {
    let fields: Record = json!({
        "username": username,
        "firstName": first_name,
        "lastName": "Tester",
        "email": format!("{username}@example.com"),
        "password": "secret",
        "profilePicture": "",
        "reviewsAnonymous": false,
    })
    .as_object()
    .cloned()
    .unwrap();
    let created = store.sign_up(fields).await.unwrap();
    SessionContext::authenticated(SessionUser {
        user_id: record_str(&created, "objectId").unwrap().to_string(),
        session_token: record_str(&created, "sessionToken").unwrap().to_string(),
        username: username.to_string(),
        first_name: first_name.to_string(),
        last_name: "Tester".to_string(),
        email: format!("{username}@example.com"),
        profile_picture: String::new(),
        reviews_anonymous: false,
    })
}

/// 读操作在内存存储中完成后停在闸门处，直到 `release`
///
/// 用来制造"请求已发出、结果尚未返回"的时间窗口。
pub(crate) struct GatedStore {
    inner: Arc<MemoryStore>,
    gated: AtomicBool,
    gate: Semaphore,
    entered: Notify,
}

impl GatedStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
            entered: Notify::new(),
        }
    }

    /// 之后的读操作停在闸门处
    pub fn hold(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    /// 之后的读操作直接返回，已停住的不受影响
    pub fn pass_through(&self) {
        self.gated.store(false, Ordering::SeqCst);
    }

    /// 放行所有停住的读操作
    pub fn release(&self) {
        self.gate.close();
    }

    /// 等待至少一个读操作停在闸门处
    pub async fn wait_until_held(&self) {
        self.entered.notified().await;
    }

    async fn checkpoint(&self) {
        if self.gated.load(Ordering::SeqCst) {
            self.entered.notify_one();
            let _ = self.gate.acquire().await;
        }
    }
}

#[async_trait]
impl ObjectStore for GatedStore {
    async fn find(&self, query: &Query, session_token: Option<&str>) -> Result<Vec<Record>> {
        let records = self.inner.find(query, session_token).await;
        self.checkpoint().await;
        records
    }

    async fn count(&self, query: &Query, session_token: Option<&str>) -> Result<u64> {
        let count = self.inner.count(query, session_token).await;
        self.checkpoint().await;
        count
    }

    async fn get(
        &self,
        class_name: &str,
        object_id: &str,
        include: &[&str],
        session_token: Option<&str>,
    ) -> Result<Record> {
        self.inner.get(class_name, object_id, include, session_token).await
    }

    async fn create(&self, class_name: &str, fields: Record, session_token: Option<&str>) -> Result<Record> {
        self.inner.create(class_name, fields, session_token).await
    }

    async fn update(
        &self,
        class_name: &str,
        object_id: &str,
        fields: Record,
        session_token: Option<&str>,
    ) -> Result<Record> {
        self.inner.update(class_name, object_id, fields, session_token).await
    }

    async fn destroy(&self, class_name: &str, object_id: &str, session_token: Option<&str>) -> Result<()> {
        self.inner.destroy(class_name, object_id, session_token).await
    }

    async fn batch(&self, ops: Vec<BatchOp>, session_token: Option<&str>) -> Result<Vec<BatchResult>> {
        self.inner.batch(ops, session_token).await
    }

    async fn sign_up(&self, fields: Record) -> Result<Record> {
        self.inner.sign_up(fields).await
    }

    async fn log_in(&self, identifier: &str, password: &str) -> Result<Record> {
        self.inner.log_in(identifier, password).await
    }

    async fn current_user(&self, session_token: &str) -> Result<Record> {
        self.inner.current_user(session_token).await
    }

    async fn log_out(&self, session_token: &str) -> Result<()> {
        self.inner.log_out(session_token).await
    }
}
