//! 书评列表视图：热门（前 N 条）与全部（分页）两种模式

use crate::lounge::review::{RatingSummary, Review, ReviewService};
use crate::lounge::session::SessionContext;
use crate::lounge::store::ObjectStore;
use crate::lounge::view::pagination::Paginator;
use crate::lounge::view::scope::ViewScope;
use anyhow::Result;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// 热门模式默认显示条数
pub const DEFAULT_TOP_REVIEWS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewListMode {
    Popular,
    All,
}

struct ListState {
    mode: ReviewListMode,
    reviews: Vec<Review>,
    paginator: Paginator,
    summary: RatingSummary,
}

pub struct ReviewListView {
    service: ReviewService,
    book_id: String,
    top_limit: usize,
    state: Mutex<ListState>,
    /// 正在点赞的评论
    liking: Mutex<HashSet<String>>,
    /// 最近一次 refresh 的序号，只有最新一次的结果会写回
    latest: AtomicU64,
    scope: ViewScope,
}

/// 点赞进行中的标记，drop 时清除
pub struct LikeGuard<'a> {
    liking: &'a Mutex<HashSet<String>>,
    review_id: String,
}

impl Drop for LikeGuard<'_> {
    fn drop(&mut self) {
        lock(self.liking).remove(&self.review_id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ReviewListView {
    pub fn new(store: Arc<dyn ObjectStore>, book_id: impl Into<String>) -> Self {
        Self {
            service: ReviewService::new(store),
            book_id: book_id.into(),
            top_limit: DEFAULT_TOP_REVIEWS,
            state: Mutex::new(ListState {
                mode: ReviewListMode::Popular,
                reviews: Vec::new(),
                paginator: Paginator::new(0),
                summary: RatingSummary::default(),
            }),
            liking: Mutex::new(HashSet::new()),
            latest: AtomicU64::new(0),
            scope: ViewScope::new(),
        }
    }

    /// 挂到上层视图的范围下，上层关闭时本视图一并取消
    pub fn with_scope(mut self, parent: &ViewScope) -> Self {
        self.scope = parent.child();
        self
    }

    pub fn scope(&self) -> &ViewScope {
        &self.scope
    }

    /// 关闭视图，进行中的请求结果不再写回
    pub fn close(&self) {
        self.scope.cancel();
    }

    pub fn with_top_limit(mut self, top_limit: usize) -> Self {
        self.top_limit = top_limit.max(1);
        self
    }

    pub fn mode(&self) -> ReviewListMode {
        lock(&self.state).mode
    }

    /// 当前可见的评论：热门模式全部显示，全部模式只显示当前页
    pub fn visible(&self) -> Vec<Review> {
        let state = lock(&self.state);
        match state.mode {
            ReviewListMode::Popular => state.reviews.clone(),
            ReviewListMode::All => state.paginator.page(&state.reviews).to_vec(),
        }
    }

    pub fn summary(&self) -> RatingSummary {
        lock(&self.state).summary
    }

    pub fn paginator(&self) -> Paginator {
        lock(&self.state).paginator
    }

    pub fn next_page(&self) -> bool {
        lock(&self.state).paginator.next()
    }

    pub fn prev_page(&self) -> bool {
        lock(&self.state).paginator.prev()
    }

    /// 按当前模式重新拉取评论和评分
    ///
    /// 视图已关闭时返回 `LoungeError::Cancelled`；被更新的 refresh 或模式切换
    /// 取代的结果直接丢弃。
    pub async fn refresh(&self, ctx: &SessionContext) -> Result<()> {
        let mode = self.mode();
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let reviews = async {
            match mode {
                ReviewListMode::Popular => {
                    self.service
                        .popular_reviews_for_book(ctx, &self.book_id, self.top_limit)
                        .await
                }
                ReviewListMode::All => self.service.reviews_for_book(ctx, &self.book_id).await,
            }
        };
        let (reviews, summary) = self
            .scope
            .try_run(async {
                tokio::try_join!(reviews, self.service.rating_summary(ctx, &self.book_id))
            })
            .await?;
        debug!("[ReviewList] 📚 {} 的评论 {} 条", self.book_id, reviews.len());

        let mut state = lock(&self.state);
        if state.mode != mode || self.latest.load(Ordering::SeqCst) != seq {
            debug!("[ReviewList] 丢弃过期结果 #{}", seq);
            return Ok(());
        }
        state.paginator.set_total(reviews.len());
        state.reviews = reviews;
        state.summary = summary;
        Ok(())
    }

    pub async fn show_all(&self, ctx: &SessionContext) -> Result<()> {
        self.switch_mode(ReviewListMode::All);
        self.refresh(ctx).await
    }

    pub async fn show_popular(&self, ctx: &SessionContext) -> Result<()> {
        self.switch_mode(ReviewListMode::Popular);
        self.refresh(ctx).await
    }

    fn switch_mode(&self, mode: ReviewListMode) {
        let mut state = lock(&self.state);
        state.mode = mode;
        state.paginator.reset();
    }

    pub fn is_liking(&self, review_id: &str) -> bool {
        lock(&self.liking).contains(review_id)
    }

    /// 标记评论正在点赞；已在进行中时返回 `None`
    pub fn begin_like(&self, review_id: &str) -> Option<LikeGuard<'_>> {
        if !lock(&self.liking).insert(review_id.to_string()) {
            return None;
        }
        Some(LikeGuard {
            liking: &self.liking,
            review_id: review_id.to_string(),
        })
    }

    /// 点赞后整体刷新（点赞数变化会影响排序）
    ///
    /// 同一条评论的点赞尚未完成时直接返回 `Ok(false)`。
    pub async fn like(&self, ctx: &SessionContext, review_id: &str) -> Result<bool> {
        let Some(guard) = self.begin_like(review_id) else {
            info!("[ReviewList] 点赞进行中，忽略重复点击: {}", review_id);
            return Ok(false);
        };
        self.service.like_review(ctx, review_id).await?;
        drop(guard);
        self.refresh(ctx).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lounge::book::BookSnapshot;
    use crate::lounge::review::NewReview;
    use crate::lounge::error::{find_lounge_error, LoungeError};
    use crate::lounge::store::MemoryStore;
    use crate::lounge::test_support::{sign_in, GatedStore};

    async fn seed_reviews(store: &Arc<MemoryStore>, ctx: &SessionContext, count: usize) -> Vec<Review> {
        let service = ReviewService::new(store.clone());
        let mut created = Vec::new();
        for i in 0..count {
            let review = NewReview {
                book: BookSnapshot {
                    book_id: "dune".into(),
                    title: "Dune".into(),
                    author: "Frank Herbert".into(),
                    cover_image: String::new(),
                },
                rating: (i % 5 + 1) as u8,
                review_text: format!("review {i}"),
            };
            created.push(service.create_review(ctx, review).await.unwrap());
        }
        created
    }

    #[tokio::test]
    async fn popular_then_all_with_pages() {
        let store = Arc::new(MemoryStore::new());
        let ctx = sign_in(&store, "ada", "Ada").await;
        seed_reviews(&store, &ctx, 7).await;

        let view = ReviewListView::new(store.clone(), "dune");
        view.refresh(&ctx).await.unwrap();
        assert_eq!(view.mode(), ReviewListMode::Popular);
        assert_eq!(view.visible().len(), DEFAULT_TOP_REVIEWS);
        assert_eq!(view.summary().count, 7);

        view.show_all(&ctx).await.unwrap();
        assert_eq!(view.paginator().total_pages(), 2);
        let first_page = view.visible();
        assert_eq!(first_page.len(), 5);
        assert_eq!(first_page[0].review_text, "review 6");
        assert!(view.next_page());
        assert_eq!(view.visible().len(), 2);
        assert!(!view.next_page());

        view.show_popular(&ctx).await.unwrap();
        assert_eq!(view.paginator().current_page(), 1);
        assert_eq!(view.visible().len(), 3);
    }

    #[tokio::test]
    async fn like_refreshes_ordering() {
        let store = Arc::new(MemoryStore::new());
        let ctx = sign_in(&store, "ada", "Ada").await;
        let created = seed_reviews(&store, &ctx, 4).await;
        let target = &created[3];

        let view = ReviewListView::new(store.clone(), "dune").with_top_limit(1);
        view.refresh(&ctx).await.unwrap();

        assert!(view.like(&ctx, &target.id).await.unwrap());
        let top = view.visible();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, target.id);
        assert_eq!(top[0].likes, 1);
        assert!(!view.is_liking(&target.id));
    }

    #[tokio::test]
    async fn in_flight_like_blocks_reentry() {
        let store = Arc::new(MemoryStore::new());
        let ctx = sign_in(&store, "ada", "Ada").await;
        let created = seed_reviews(&store, &ctx, 1).await;
        let view = ReviewListView::new(store.clone(), "dune");

        let guard = view.begin_like(&created[0].id).unwrap();
        assert!(view.begin_like(&created[0].id).is_none());
        assert!(!view.like(&ctx, &created[0].id).await.unwrap());
        drop(guard);

        assert!(view.like(&ctx, &created[0].id).await.unwrap());
        let review = ReviewService::new(store.clone())
            .get_review(&ctx, &created[0].id)
            .await
            .unwrap();
        assert_eq!(review.likes, 1);
    }

    #[tokio::test]
    async fn closing_mid_refresh_keeps_previous_state() {
        let memory = Arc::new(MemoryStore::new());
        let ctx = sign_in(&memory, "ada", "Ada").await;
        seed_reviews(&memory, &ctx, 2).await;
        let store = Arc::new(GatedStore::new(memory.clone()));

        let view = ReviewListView::new(store.clone(), "dune");
        view.refresh(&ctx).await.unwrap();
        assert_eq!(view.visible().len(), 2);

        seed_reviews(&memory, &ctx, 1).await;
        store.hold();
        let closer = async {
            store.wait_until_held().await;
            view.close();
            store.release();
        };
        let (result, ()) = tokio::join!(view.refresh(&ctx), closer);

        let err = result.unwrap_err();
        assert!(matches!(find_lounge_error(&err), Some(LoungeError::Cancelled)));
        assert_eq!(view.visible().len(), 2);
        assert_eq!(view.summary().count, 2);
    }

    #[tokio::test]
    async fn older_refresh_finishing_last_is_discarded() {
        let memory = Arc::new(MemoryStore::new());
        let ctx = sign_in(&memory, "ada", "Ada").await;
        seed_reviews(&memory, &ctx, 1).await;
        let store = Arc::new(GatedStore::new(memory.clone()));
        let view = ReviewListView::new(store.clone(), "dune");

        store.hold();
        let newer = async {
            store.wait_until_held().await;
            store.pass_through();
            seed_reviews(&memory, &ctx, 1).await;
            view.refresh(&ctx).await.unwrap();
            assert_eq!(view.summary().count, 2);
            store.release();
        };
        let (older, ()) = tokio::join!(view.refresh(&ctx), newer);
        older.unwrap();

        assert_eq!(view.summary().count, 2);
        assert_eq!(view.visible().len(), 2);
    }
}
