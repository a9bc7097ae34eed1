//! 客户端入口
//!
//! [`LoungeClient`] 持有当前会话和各个服务，调用方通过它访问全部功能。

use crate::lounge::auth::{AuthService, ProfileUpdate, Registration, UserProfile};
use crate::lounge::book::BookDetails;
use crate::lounge::booklist::{BookListEntry, BookListKind, BookListService};
use crate::lounge::catalog::CatalogApi;
use crate::lounge::chat::{ChatListener, ClubChat};
use crate::lounge::club::{ClubService, CLUB_CLASS};
use crate::lounge::config::LoungeConfig;
use crate::lounge::error::LoungeError;
use crate::lounge::friend::FriendService;
use crate::lounge::live::{LiveConnector, LiveQueryClient, LiveSubscription};
use crate::lounge::review::{Review, ReviewService};
use crate::lounge::session::SessionContext;
use crate::lounge::store::{MemoryStore, ObjectStore, Query, RestStore};
use crate::lounge::types::to_record;
use crate::lounge::view::{BookCardState, ReviewListView, ViewScope};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// 离线模式预置的读书会
const DEMO_CLUBS: &[(&str, &str)] = &[
    ("Mystery Lovers", "Whodunits, thrillers and detective classics"),
    ("Sci-Fi Voyagers", "From Dune to the latest space operas"),
    ("Classic Reads", "Austen, Tolstoy and friends"),
];

/// 个人主页数据
#[derive(Debug, Clone)]
pub struct ProfilePage {
    pub profile: UserProfile,
    pub reviews: Vec<Review>,
    pub read_list: Vec<BookListEntry>,
    pub wishlist: Vec<BookListEntry>,
}

pub struct LoungeClient {
    config: LoungeConfig,
    session: SessionContext,
    store: Arc<dyn ObjectStore>,
    live: Arc<dyn LiveConnector>,
    catalog: CatalogApi,
    auth: AuthService,
    reviews: ReviewService,
    friends: FriendService,
    lists: BookListService,
    clubs: ClubService,
    /// 所有视图的父范围，客户端销毁时一并取消
    scope: ViewScope,
}

impl LoungeClient {
    /// 连接远程 BaaS
    pub fn new(config: LoungeConfig) -> Result<Self> {
        let store = Arc::new(RestStore::new(&config)?);
        let live = Arc::new(LiveQueryClient::new(&config));
        let catalog = CatalogApi::new(&config)?;
        Ok(Self::with_parts(config, store, live, catalog))
    }

    /// 离线模式：进程内存储，预置演示读书会，聊天只有历史消息
    pub fn offline(config: LoungeConfig) -> Result<Self> {
        let store = MemoryStore::new();
        for (name, description) in DEMO_CLUBS {
            store.seed(
                CLUB_CLASS,
                to_record(json!({ "name": name, "description": description })),
            );
        }
        info!("[Client] 🧪 离线模式，预置 {} 个读书会", DEMO_CLUBS.len());
        let catalog = CatalogApi::new(&config)?;
        Ok(Self::with_parts(
            config,
            Arc::new(store),
            Arc::new(OfflineLive),
            catalog,
        ))
    }

    pub fn with_parts(
        config: LoungeConfig,
        store: Arc<dyn ObjectStore>,
        live: Arc<dyn LiveConnector>,
        catalog: CatalogApi,
    ) -> Self {
        Self {
            config,
            session: SessionContext::anonymous(),
            auth: AuthService::new(store.clone()),
            reviews: ReviewService::new(store.clone()),
            friends: FriendService::new(store.clone()),
            lists: BookListService::new(store.clone()),
            clubs: ClubService::new(store.clone()),
            store,
            live,
            catalog,
            scope: ViewScope::new(),
        }
    }

    pub fn config(&self) -> &LoungeConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    pub fn scope(&self) -> &ViewScope {
        &self.scope
    }

    pub fn catalog(&self) -> &CatalogApi {
        &self.catalog
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn reviews(&self) -> &ReviewService {
        &self.reviews
    }

    pub fn friends(&self) -> &FriendService {
        &self.friends
    }

    pub fn lists(&self) -> &BookListService {
        &self.lists
    }

    pub fn clubs(&self) -> &ClubService {
        &self.clubs
    }

    pub async fn register(&mut self, form: &Registration) -> Result<()> {
        self.session = self.auth.register(form).await?;
        Ok(())
    }

    pub async fn log_in(&mut self, identifier: &str, password: &str) -> Result<()> {
        self.session = self.auth.log_in(identifier, password).await?;
        Ok(())
    }

    pub async fn restore_session(&mut self, session_token: &str) -> Result<()> {
        self.session = self.auth.restore_session(session_token).await?;
        Ok(())
    }

    pub async fn log_out(&mut self) -> Result<()> {
        self.auth.log_out(&mut self.session).await
    }

    pub async fn update_profile(&mut self, update: ProfileUpdate) -> Result<UserProfile> {
        self.auth.update_profile(&mut self.session, update).await
    }

    /// 个人主页：资料、书评和两个书单一起加载
    pub async fn profile_page(&self) -> Result<ProfilePage> {
        let ctx = &self.session;
        ctx.require_user()?;
        let (profile, reviews, read_list, wishlist) = tokio::try_join!(
            self.auth.current_profile(ctx),
            self.reviews.current_user_reviews(ctx),
            self.lists.list(ctx, BookListKind::Read),
            self.lists.list(ctx, BookListKind::Wishlist),
        )?;
        Ok(ProfilePage {
            profile,
            reviews,
            read_list,
            wishlist,
        })
    }

    /// 新建读书会聊天会话
    pub fn club_chat(&self, listener: Arc<dyn ChatListener>) -> ClubChat {
        ClubChat::new(self.store.clone(), self.live.clone(), listener)
    }

    pub fn review_list(&self, book_id: impl Into<String>) -> ReviewListView {
        ReviewListView::new(self.store.clone(), book_id).with_scope(&self.scope)
    }

    pub fn book_card(&self, book: BookDetails) -> BookCardState {
        BookCardState::new(self.store.clone(), book).with_scope(&self.scope)
    }
}

/// 离线模式没有推送服务
struct OfflineLive;

#[async_trait]
impl LiveConnector for OfflineLive {
    async fn subscribe(&self, _query: &Query, _session_token: Option<&str>) -> Result<LiveSubscription> {
        Err(LoungeError::LiveQuery("Live updates are unavailable offline".to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lounge::book::BookSnapshot;
    use crate::lounge::chat::{ChatPhase, EmptyChatListener};
    use crate::lounge::error::{classify, ErrorKind};
    use crate::lounge::review::NewReview;
    use crate::lounge::test_support::init_test_logger;

    fn offline_client() -> LoungeClient {
        init_test_logger();
        let config = LoungeConfig::new("app".into(), "key".into(), "http://127.0.0.1:1".into());
        LoungeClient::offline(config).unwrap()
    }

    fn ada() -> Registration {
        Registration {
            username: "ada_reads".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            password: "secret".into(),
        }
    }

    #[tokio::test]
    async fn register_log_out_and_back_in() {
        let mut client = offline_client();
        client.register(&ada()).await.unwrap();
        assert!(client.is_logged_in());

        client.log_out().await.unwrap();
        assert!(!client.is_logged_in());
        let err = client.profile_page().await.unwrap_err();
        assert_eq!(classify(&err), ErrorKind::NotAuthenticated);

        client.log_in("ada@example.com", "secret").await.unwrap();
        assert_eq!(client.session().user().unwrap().username, "ada_reads");
    }

    #[tokio::test]
    async fn profile_page_loads_everything() {
        let mut client = offline_client();
        client.register(&ada()).await.unwrap();

        let book = BookDetails {
            book_id: "dune".into(),
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            genre: "Science Fiction".into(),
            ..Default::default()
        };
        client
            .book_card(book.clone())
            .toggle_wishlist(client.session())
            .await
            .unwrap();
        client
            .reviews()
            .create_review(
                client.session(),
                NewReview {
                    book: BookSnapshot {
                        book_id: book.book_id.clone(),
                        title: book.title.clone(),
                        author: book.author.clone(),
                        cover_image: String::new(),
                    },
                    rating: 5,
                    review_text: "Spice must flow".into(),
                },
            )
            .await
            .unwrap();

        let page = client.profile_page().await.unwrap();
        assert_eq!(page.profile.first_name, "Ada");
        assert_eq!(page.reviews.len(), 1);
        assert!(page.read_list.is_empty());
        assert_eq!(page.wishlist[0].title, "Dune");
    }

    #[tokio::test]
    async fn offline_chat_is_history_only() {
        let mut client = offline_client();
        client.register(&ada()).await.unwrap();

        let directory = client.clubs().directory(client.session()).await.unwrap();
        assert_eq!(directory.explore_clubs.len(), DEMO_CLUBS.len());
        let club = &directory.explore_clubs[0];

        let chat = client.club_chat(Arc::new(EmptyChatListener));
        chat.select_club(client.session(), &club.id).await.unwrap();
        assert_eq!(chat.phase().await, ChatPhase::HistoryOnly);

        chat.send(client.session(), "hello offline").await.unwrap();
        assert_eq!(chat.messages().await.len(), 1);
    }

    #[tokio::test]
    async fn client_scope_cancels_its_views() {
        let mut client = offline_client();
        client.register(&ada()).await.unwrap();

        let view = client.review_list("dune");
        client.scope().cancel();
        assert!(view.scope().is_cancelled());
        let err = view.refresh(client.session()).await.unwrap_err();
        assert!(matches!(
            crate::lounge::error::find_lounge_error(&err),
            Some(LoungeError::Cancelled)
        ));
    }
}
