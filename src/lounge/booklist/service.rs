//! 书单服务

use crate::lounge::book::BookDetails;
use crate::lounge::booklist::models::{BookListEntry, BookListKind};
use crate::lounge::session::{SessionContext, SessionUser};
use crate::lounge::store::{find_as, first_as, ObjectStore, Query};
use crate::lounge::types::{decode, to_record};
use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

pub struct BookListService {
    store: Arc<dyn ObjectStore>,
}

impl BookListService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// 加入书单；已存在时直接返回原条目
    pub async fn add(
        &self,
        ctx: &SessionContext,
        kind: BookListKind,
        book: &BookDetails,
    ) -> Result<BookListEntry> {
        let user = ctx.require_user()?;
        if let Some(existing) = self.find_entry(user, kind, &book.book_id).await? {
            info!("[BookList] 《{}》已在{}书单中", book.title, kind);
            return Ok(existing);
        }

        info!("[BookList] ➕ 加入{}书单: 《{}》", kind, book.title);
        let fields = to_record(json!({
            "user": user.pointer().to_value(),
            "bookId": book.book_id,
            "title": book.title,
            "author": book.author,
            "coverImage": book.cover_image,
            "description": book.description,
            "genre": book.genre,
            "categories": book.categories,
        }));
        let created = self
            .store
            .create(kind.class_name(), fields, Some(&user.session_token))
            .await
            .with_context(|| format!("加入{kind}书单失败"))?;
        decode(created)
    }

    /// 移出书单，返回是否真的删除了条目
    pub async fn remove(&self, ctx: &SessionContext, kind: BookListKind, book_id: &str) -> Result<bool> {
        let user = ctx.require_user()?;
        let Some(entry) = self.find_entry(user, kind, book_id).await? else {
            return Ok(false);
        };
        info!("[BookList] ➖ 移出{}书单: {}", kind, book_id);
        self.store
            .destroy(kind.class_name(), &entry.id, Some(&user.session_token))
            .await
            .with_context(|| format!("移出{kind}书单失败"))?;
        Ok(true)
    }

    /// 书单内容，最近加入的在前
    pub async fn list(&self, ctx: &SessionContext, kind: BookListKind) -> Result<Vec<BookListEntry>> {
        let user = ctx.require_user()?;
        let query = Query::new(kind.class_name())
            .equal_to_pointer("user", &user.pointer())
            .descending("createdAt");
        find_as(self.store.as_ref(), &query, Some(&user.session_token))
            .await
            .with_context(|| format!("获取{kind}书单失败"))
    }

    /// 是否在书单中；未登录或查询失败时为 false
    pub async fn contains(&self, ctx: &SessionContext, kind: BookListKind, book_id: &str) -> bool {
        let Some(user) = ctx.user() else {
            return false;
        };
        let query = Self::entry_query(user, kind, book_id);
        match self.store.count(&query, Some(&user.session_token)).await {
            Ok(count) => count > 0,
            Err(e) => {
                warn!("[BookList] ⚠️ 检查{}书单失败: {:#}", kind, e);
                false
            }
        }
    }

    /// 切换书单状态，返回切换后是否在书单中
    pub async fn toggle(&self, ctx: &SessionContext, kind: BookListKind, book: &BookDetails) -> Result<bool> {
        if self.remove(ctx, kind, &book.book_id).await? {
            Ok(false)
        } else {
            self.add(ctx, kind, book).await?;
            Ok(true)
        }
    }

    fn entry_query(user: &SessionUser, kind: BookListKind, book_id: &str) -> Query {
        Query::new(kind.class_name())
            .equal_to_pointer("user", &user.pointer())
            .equal_to("bookId", book_id)
    }

    async fn find_entry(
        &self,
        user: &SessionUser,
        kind: BookListKind,
        book_id: &str,
    ) -> Result<Option<BookListEntry>> {
        let query = Self::entry_query(user, kind, book_id);
        first_as(self.store.as_ref(), &query, Some(&user.session_token))
            .await
            .with_context(|| format!("查询{kind}书单失败"))
    }
}
