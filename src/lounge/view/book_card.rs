//! 书籍卡片：已读 / 想读状态切换

use crate::lounge::book::BookDetails;
use crate::lounge::booklist::{BookListKind, BookListService};
use crate::lounge::session::SessionContext;
use crate::lounge::store::ObjectStore;
use crate::lounge::view::scope::ViewScope;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

pub struct BookCardState {
    lists: BookListService,
    book: BookDetails,
    in_read: AtomicBool,
    in_wishlist: AtomicBool,
    /// 同一时间只允许一个书单写操作
    submitting: AtomicBool,
    scope: ViewScope,
}

struct SubmitGuard<'a>(&'a AtomicBool);

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl BookCardState {
    pub fn new(store: Arc<dyn ObjectStore>, book: BookDetails) -> Self {
        Self {
            lists: BookListService::new(store),
            book,
            in_read: AtomicBool::new(false),
            in_wishlist: AtomicBool::new(false),
            submitting: AtomicBool::new(false),
            scope: ViewScope::new(),
        }
    }

    pub fn with_scope(mut self, parent: &ViewScope) -> Self {
        self.scope = parent.child();
        self
    }

    pub fn scope(&self) -> &ViewScope {
        &self.scope
    }

    /// 卡片移出视图，进行中的读取不再写回
    pub fn close(&self) {
        self.scope.cancel();
    }

    pub fn book(&self) -> &BookDetails {
        &self.book
    }

    pub fn in_read_list(&self) -> bool {
        self.in_read.load(Ordering::SeqCst)
    }

    pub fn in_wishlist(&self) -> bool {
        self.in_wishlist.load(Ordering::SeqCst)
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    /// 读取两个书单中的状态；未登录时都为 false
    pub async fn load(&self, ctx: &SessionContext) {
        if !ctx.is_authenticated() {
            self.in_read.store(false, Ordering::SeqCst);
            self.in_wishlist.store(false, Ordering::SeqCst);
            return;
        }
        let lookup = async {
            tokio::join!(
                self.lists.contains(ctx, BookListKind::Read, &self.book.book_id),
                self.lists.contains(ctx, BookListKind::Wishlist, &self.book.book_id),
            )
        };
        let Some((read, wish)) = self.scope.run(lookup).await else {
            debug!("[BookCard] 卡片已关闭，丢弃《{}》的书单状态", self.book.title);
            return;
        };
        debug!(
            "[BookCard] 《{}》 已读={} 想读={}",
            self.book.title, read, wish
        );
        self.in_read.store(read, Ordering::SeqCst);
        self.in_wishlist.store(wish, Ordering::SeqCst);
    }

    /// 切换书单状态，返回切换后的状态；已有写操作进行中时返回 `None`
    pub async fn toggle(&self, ctx: &SessionContext, kind: BookListKind) -> Result<Option<bool>> {
        ctx.require_user()?;
        if self.submitting.swap(true, Ordering::SeqCst) {
            info!("[BookCard] 书单操作进行中，忽略: 《{}》", self.book.title);
            return Ok(None);
        }
        let _guard = SubmitGuard(&self.submitting);

        let flag = match kind {
            BookListKind::Read => &self.in_read,
            BookListKind::Wishlist => &self.in_wishlist,
        };
        let now_in = if flag.load(Ordering::SeqCst) {
            self.lists.remove(ctx, kind, &self.book.book_id).await?;
            false
        } else {
            self.lists.add(ctx, kind, &self.book).await?;
            true
        };
        flag.store(now_in, Ordering::SeqCst);
        Ok(Some(now_in))
    }

    pub async fn toggle_read(&self, ctx: &SessionContext) -> Result<Option<bool>> {
        self.toggle(ctx, BookListKind::Read).await
    }

    pub async fn toggle_wishlist(&self, ctx: &SessionContext) -> Result<Option<bool>> {
        self.toggle(ctx, BookListKind::Wishlist).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lounge::error::{classify, ErrorKind};
    use crate::lounge::store::MemoryStore;
    use crate::lounge::test_support::{sign_in, GatedStore};

    fn dune() -> BookDetails {
        BookDetails {
            book_id: "dune".into(),
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            genre: "Science Fiction".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn toggles_read_and_wishlist() {
        let store = Arc::new(MemoryStore::new());
        let ctx = sign_in(&store, "ada", "Ada").await;
        let card = BookCardState::new(store.clone(), dune());
        card.load(&ctx).await;
        assert!(!card.in_read_list());

        assert_eq!(card.toggle_read(&ctx).await.unwrap(), Some(true));
        assert_eq!(card.toggle_wishlist(&ctx).await.unwrap(), Some(true));
        assert_eq!(store.records("ReadBook").len(), 1);

        let reloaded = BookCardState::new(store.clone(), dune());
        reloaded.load(&ctx).await;
        assert!(reloaded.in_read_list());
        assert!(reloaded.in_wishlist());

        assert_eq!(reloaded.toggle_read(&ctx).await.unwrap(), Some(false));
        assert!(store.records("ReadBook").is_empty());
        assert!(!reloaded.is_submitting());
    }

    #[tokio::test]
    async fn submitting_blocks_reentry_and_anonymous_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let ctx = sign_in(&store, "ada", "Ada").await;
        let card = BookCardState::new(store.clone(), dune());

        card.submitting.store(true, Ordering::SeqCst);
        assert_eq!(card.toggle_read(&ctx).await.unwrap(), None);
        assert!(store.records("ReadBook").is_empty());
        card.submitting.store(false, Ordering::SeqCst);

        let err = card.toggle_read(&SessionContext::anonymous()).await.unwrap_err();
        assert_eq!(classify(&err), ErrorKind::NotAuthenticated);
    }

    #[tokio::test]
    async fn closed_card_ignores_late_status() {
        let memory = Arc::new(MemoryStore::new());
        let ctx = sign_in(&memory, "ada", "Ada").await;
        BookListService::new(memory.clone())
            .add(&ctx, BookListKind::Read, &dune())
            .await
            .unwrap();
        let store = Arc::new(GatedStore::new(memory.clone()));

        let card = BookCardState::new(store.clone(), dune());
        store.hold();
        let closer = async {
            store.wait_until_held().await;
            card.close();
            store.release();
        };
        tokio::join!(card.load(&ctx), closer);
        assert!(!card.in_read_list());

        let fresh = BookCardState::new(memory.clone(), dune());
        fresh.load(&ctx).await;
        assert!(fresh.in_read_list());
    }
}
