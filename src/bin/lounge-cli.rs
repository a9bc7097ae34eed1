//! Literary Lounge 命令行客户端
//!
//! 每次执行一个子命令：检索书籍、查看和撰写书评、管理好友与书单、读书会聊天。
//! `--offline` 使用进程内存储，无需任何服务端。

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use literary_lounge_sdk::lounge::auth::Registration;
use literary_lounge_sdk::lounge::booklist::BookListKind;
use literary_lounge_sdk::lounge::catalog::{OrderBy, PopularCategory};
use literary_lounge_sdk::lounge::chat::ChatListener;
use literary_lounge_sdk::lounge::club::ChatMessage;
use literary_lounge_sdk::lounge::config::DEFAULT_SERVER_URL;
use literary_lounge_sdk::lounge::error::{find_lounge_error, user_message, LoungeError};
use literary_lounge_sdk::lounge::friend::SendRequestOutcome;
use literary_lounge_sdk::lounge::review::NewReview;
use literary_lounge_sdk::lounge::BookSource;
use literary_lounge_sdk::{LoungeClient, LoungeConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

/// Literary Lounge CLI 客户端
#[derive(Parser, Debug)]
#[command(name = "lounge-cli")]
#[command(about = "Literary Lounge CLI - 书籍发现与社交阅读", long_about = None)]
struct Args {
    /// BaaS 应用 ID
    #[arg(long, env = "LOUNGE_APP_ID")]
    app_id: Option<String>,

    /// BaaS 客户端密钥
    #[arg(long, env = "LOUNGE_CLIENT_KEY")]
    client_key: Option<String>,

    /// REST 服务地址
    #[arg(long, env = "LOUNGE_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// LiveQuery 地址（默认由服务地址推导）
    #[arg(long, env = "LOUNGE_LIVE_QUERY_URL")]
    live_query_url: Option<String>,

    /// 图书目录 API 地址
    #[arg(long, env = "LOUNGE_CATALOG_URL")]
    catalog_url: Option<String>,

    /// 用户名或邮箱（提供时自动登录）
    #[arg(short, long)]
    username: Option<String>,

    #[arg(short, long, env = "LOUNGE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// 使用进程内存储（预置演示读书会，登录名会被自动注册）
    #[arg(long)]
    offline: bool,

    /// 日志级别（默认: info,literary_lounge_sdk=debug）
    #[arg(long, default_value = "info,literary_lounge_sdk=debug")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 检索书籍
    Search {
        query: String,
        #[arg(short, long, default_value_t = 10)]
        max: u32,
        /// 按出版时间排序
        #[arg(long)]
        newest: bool,
    },
    /// 书籍详情与评分
    Book { book_id: String },
    /// 热门分类：bestseller, fiction, nonfiction, mystery, romance, scifi, fantasy
    Popular {
        #[arg(default_value = "bestseller")]
        category: PopularCategory,
        #[arg(short, long, default_value_t = 10)]
        max: u32,
    },
    /// 某本书的书评
    Reviews {
        book_id: String,
        /// 显示全部（分页），否则只显示热门
        #[arg(long)]
        all: bool,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// 发表书评
    Review {
        book_id: String,
        rating: u8,
        text: String,
    },
    /// 点赞书评
    Like { review_id: String },
    /// 好友列表
    Friends,
    /// 好友申请（可接受或拒绝）
    Requests {
        #[arg(long, conflicts_with = "reject")]
        accept: Option<String>,
        #[arg(long)]
        reject: Option<String>,
    },
    /// 按用户名添加好友
    AddFriend { username: String },
    /// 书单：read 或 wishlist
    Lists {
        #[arg(default_value = "read")]
        kind: BookListKind,
        /// 按书籍 ID 加入书单
        #[arg(long, conflicts_with = "remove")]
        add: Option<String>,
        #[arg(long)]
        remove: Option<String>,
    },
    /// 读书会目录
    Clubs,
    /// 加入读书会
    Join { club_id: String },
    /// 读书会聊天，从标准输入读取消息，输入 /quit 退出
    Chat {
        club_id: String,
        /// 运行时长（秒），0 表示直到输入结束
        #[arg(short, long, default_value_t = 0)]
        duration: u64,
    },
}

/// 初始化日志（同时输出到 stdout 和文件）
fn init_logger(log_level: &str) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    // 优先使用环境变量 RUST_LOG，否则使用命令行参数
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("lounge.log")
        .context("无法创建日志文件 lounge.log")?;

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(true);

    // 文件不需要颜色
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!("[CLI] 📝 日志已同时输出到控制台和文件: lounge.log");
    Ok(())
}

fn build_config(args: &Args) -> Result<LoungeConfig> {
    let (app_id, client_key) = match (&args.app_id, &args.client_key) {
        (Some(app_id), Some(client_key)) => (app_id.clone(), client_key.clone()),
        _ if args.offline => ("offline".to_string(), "offline".to_string()),
        _ => anyhow::bail!("需要 --app-id 和 --client-key（或 LOUNGE_APP_ID / LOUNGE_CLIENT_KEY），或使用 --offline"),
    };
    let mut config = LoungeConfig::new(app_id, client_key, args.server_url.clone());
    if let Some(url) = &args.live_query_url {
        config = config.with_live_query_url(url);
    }
    if let Some(url) = &args.catalog_url {
        config = config.with_catalog_base_url(url);
    }
    Ok(config)
}

async fn sign_in(client: &mut LoungeClient, args: &Args) -> Result<()> {
    let Some(username) = &args.username else {
        return Ok(());
    };
    let password = args.password.clone().unwrap_or_default();
    if args.offline {
        // 离线模式每次启动都是空库，密码只需非空
        let password = if password.is_empty() { "offline".to_string() } else { password };
        let form = Registration {
            username: username.clone(),
            first_name: username.clone(),
            last_name: "Reader".to_string(),
            email: format!("{username}@example.com"),
            password,
        };
        client.register(&form).await?;
    } else {
        client.log_in(username, &password).await?;
    }
    if let Some(user) = client.session().user() {
        info!("[CLI] ✅ 已登录: {} ({})", user.display_name(), user.user_id);
    }
    Ok(())
}

/// 把聊天事件打印到控制台
struct CliChatListener;

#[async_trait::async_trait]
impl ChatListener for CliChatListener {
    async fn on_history_loaded(&self, club_id: String, messages: Vec<ChatMessage>) {
        info!("[CLI/Chat] 📜 读书会 {} 历史消息 {} 条", club_id, messages.len());
        for message in messages {
            println!("{}: {}", message.username, message.text);
        }
    }

    async fn on_message_created(&self, message: ChatMessage) {
        println!("{}: {}", message.username, message.text);
    }

    async fn on_message_updated(&self, message: ChatMessage) {
        println!("(edited) {}: {}", message.username, message.text);
    }

    async fn on_message_removed(&self, message_id: String) {
        info!("[CLI/Chat] 🗑️ 消息已删除: {}", message_id);
    }

    async fn on_connection_status_changed(&self, connected: bool, detail: String) {
        if connected {
            info!("[CLI/Chat] 🔗 实时更新已连接");
        } else {
            warn!("[CLI/Chat] ⚠️ 实时更新不可用，只显示历史消息: {}", detail);
        }
    }
}

async fn run(client: &LoungeClient, command: Command) -> Result<()> {
    match command {
        Command::Search { query, max, newest } => {
            let order = if newest { OrderBy::Newest } else { OrderBy::Relevance };
            for book in client.catalog().search(&query, max, order).await? {
                println!("{}  {} - {} [{}]", book.id, book.title, book.author, book.genre);
            }
        }
        Command::Book { book_id } => {
            let book = client.catalog().get_by_id(&book_id).await?;
            let summary = client.reviews().rating_summary(client.session(), &book_id).await?;
            println!("{}\nby {}\n{}\n{}", book.title, book.author, book.genre, summary.label());
            if !book.description.is_empty() {
                println!("\n{}", book.description);
            }
        }
        Command::Popular { category, max } => {
            for book in client.catalog().popular(category, max).await? {
                println!("{}  {} - {}", book.id, book.title, book.author);
            }
        }
        Command::Reviews { book_id, all, page } => {
            let view = client.review_list(&book_id);
            if all {
                view.show_all(client.session()).await?;
                for _ in 1..page {
                    if !view.next_page() {
                        break;
                    }
                }
            } else {
                view.refresh(client.session()).await?;
            }
            println!("{}", view.summary().label());
            for review in view.visible() {
                println!(
                    "[{}] {}★ {} ({} likes): {}",
                    review.id,
                    review.rating,
                    review.author_display_name(),
                    review.likes,
                    review.review_text
                );
            }
            if all {
                let pages = view.paginator();
                println!("Page {} of {}", pages.current_page(), pages.total_pages().max(1));
            }
        }
        Command::Review { book_id, rating, text } => {
            let book = client.catalog().get_by_id(&book_id).await?;
            let review = NewReview {
                book: BookSource::Catalog(book).snapshot(),
                rating,
                review_text: text,
            };
            let saved = client.reviews().create_review(client.session(), review).await?;
            println!("Review posted: {}", saved.id);
        }
        Command::Like { review_id } => {
            let review = client.reviews().like_review(client.session(), &review_id).await?;
            println!("{} now has {} likes", review.id, review.likes);
        }
        Command::Friends => {
            let overview = client.friends().overview(client.session()).await;
            println!("Friends ({}):", overview.friends.len());
            for friend in overview.friends {
                println!("  {} @{}", friend.full_name(), friend.username);
            }
            println!("Pending requests: {}", overview.pending.len());
        }
        Command::Requests { accept, reject } => {
            if let Some(request_id) = accept {
                let request = client
                    .friends()
                    .accept_friend_request(client.session(), &request_id)
                    .await?;
                println!("Accepted request from @{}", request.from_user.username);
            } else if let Some(request_id) = reject {
                client
                    .friends()
                    .reject_friend_request(client.session(), &request_id)
                    .await?;
                println!("Request rejected");
            } else {
                for request in client.friends().pending_requests(client.session()).await {
                    println!("[{}] @{}", request.id, request.from_user.username);
                }
            }
        }
        Command::AddFriend { username } => {
            let candidates = client
                .friends()
                .search_users_for_friends(client.session(), &username)
                .await;
            let Some(target) = candidates.into_iter().find(|u| u.username == username) else {
                anyhow::bail!("User @{username} not found");
            };
            match client
                .friends()
                .send_friend_request(client.session(), &target.id)
                .await?
            {
                SendRequestOutcome::Sent(_) => println!("Friend request sent to @{username}"),
                SendRequestOutcome::AlreadyPending => println!("A request is already pending"),
                SendRequestOutcome::AlreadyFriends => println!("You are already friends"),
            }
        }
        Command::Lists { kind, add, remove } => {
            if let Some(book_id) = add {
                let book = client.catalog().get_by_id(&book_id).await?;
                let details = BookSource::Catalog(book).details();
                client.lists().add(client.session(), kind, &details).await?;
            } else if let Some(book_id) = remove {
                if !client.lists().remove(client.session(), kind, &book_id).await? {
                    println!("{book_id} was not on the {kind} list");
                }
            }
            for entry in client.lists().list(client.session(), kind).await? {
                println!("{}  {} - {}", entry.book_id, entry.title, entry.author);
            }
        }
        Command::Clubs => {
            let directory = client.clubs().directory(client.session()).await?;
            println!("My clubs:");
            for club in &directory.my_clubs {
                println!("  [{}] {}", club.id, club.name);
            }
            println!("Explore:");
            for club in &directory.explore_clubs {
                println!("  [{}] {} - {}", club.id, club.name, club.description);
            }
        }
        Command::Join { club_id } => {
            let membership = client.clubs().join_club(client.session(), &club_id).await?;
            println!("Joined {}", membership.club.name);
        }
        Command::Chat { club_id, duration } => {
            let chat = client.club_chat(Arc::new(CliChatListener));
            chat.select_club(client.session(), &club_id).await?;

            let input = async {
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                while let Some(line) = lines.next_line().await? {
                    let line = line.trim();
                    if line == "/quit" {
                        break;
                    }
                    if line.is_empty() {
                        continue;
                    }
                    if let Err(e) = chat.send(client.session(), line).await {
                        error!("[CLI/Chat] ❌ 发送失败: {}", user_message(&e));
                    }
                }
                anyhow::Ok(())
            };

            if duration > 0 {
                info!("[CLI] ⏰ {} 秒后自动退出", duration);
                match tokio::time::timeout(Duration::from_secs(duration), input).await {
                    Ok(result) => result?,
                    Err(_) => info!("[CLI] ⏰ 时间到"),
                }
            } else {
                input.await?;
            }
            chat.close().await;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level)?;
    info!("[CLI] 🚀 Literary Lounge CLI");

    let config = build_config(&args)?;
    let mut client = if args.offline {
        LoungeClient::offline(config)?
    } else {
        LoungeClient::new(config)?
    };

    if let Err(e) = sign_in(&mut client, &args).await {
        error!("[CLI] ❌ 登录失败: {:#}", e);
        eprintln!("{}", user_message(&e));
        return Err(e);
    }

    let interrupt = client.scope().token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("[CLI] 🛑 收到中断信号");
            interrupt.cancel();
        }
    });

    let outcome = client.scope().try_run(run(&client, args.command)).await;
    if let Err(e) = outcome {
        if matches!(find_lounge_error(&e), Some(LoungeError::Cancelled)) {
            info!("[CLI] 👋 已中断");
            return Ok(());
        }
        error!("[CLI] ❌ 命令失败: {:#}", e);
        eprintln!("{}", user_message(&e));
        return Err(e);
    }
    Ok(())
}
