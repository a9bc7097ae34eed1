//! 书评服务

use crate::lounge::error::LoungeError;
use crate::lounge::review::models::{
    validate_rating, validate_text, NewReview, Review, ReviewUpdate, UserRef,
};
use crate::lounge::review::rating::{ratings_by_book, RatingSummary};
use crate::lounge::session::{SessionContext, SessionUser};
use crate::lounge::store::{find_as, ObjectStore, Query};
use crate::lounge::types::{decode, increment, to_record, Pointer, Record};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub const REVIEW_CLASS: &str = "Review";

/// 评分聚合时最多拉取的评论数
pub const AGGREGATE_LIMIT: usize = 1000;

pub struct ReviewService {
    store: Arc<dyn ObjectStore>,
}

impl ReviewService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// 发表评论；评分和内容在写入前校验，点赞数从 0 开始
    pub async fn create_review(&self, ctx: &SessionContext, review: NewReview) -> Result<Review> {
        let user = ctx.require_user()?;
        validate_rating(review.rating)?;
        validate_text(&review.review_text)?;

        info!(
            "[ReviewService] 📝 发表评论: book={}, rating={}",
            review.book.book_id, review.rating
        );
        let fields = to_record(json!({
            "book": review.book,
            "user": user.pointer().to_value(),
            "rating": review.rating,
            "reviewText": review.review_text.trim(),
            "likes": 0,
        }));
        let created = self
            .store
            .create(REVIEW_CLASS, fields, Some(&user.session_token))
            .await
            .context("发表评论失败")?;
        let mut saved: Review = decode(strip_user(created))?;
        saved.user = Some(UserRef::from(user));
        Ok(saved)
    }

    /// 某本书的全部评论，最新在前
    pub async fn reviews_for_book(&self, ctx: &SessionContext, book_id: &str) -> Result<Vec<Review>> {
        let query = Query::new(REVIEW_CLASS)
            .equal_to("book.bookId", book_id)
            .include("user")
            .descending("createdAt");
        find_as(self.store.as_ref(), &query, ctx.token())
            .await
            .context("获取书评失败")
    }

    /// 点赞最多的前 `limit` 条评论
    pub async fn popular_reviews_for_book(
        &self,
        ctx: &SessionContext,
        book_id: &str,
        limit: usize,
    ) -> Result<Vec<Review>> {
        let query = Query::new(REVIEW_CLASS)
            .equal_to("book.bookId", book_id)
            .include("user")
            .descending("likes")
            .limit(limit);
        find_as(self.store.as_ref(), &query, ctx.token())
            .await
            .context("获取热门书评失败")
    }

    pub async fn reviews_by_user(&self, ctx: &SessionContext, user_id: &str) -> Result<Vec<Review>> {
        let query = Query::new(REVIEW_CLASS)
            .equal_to_pointer("user", &Pointer::user(user_id))
            .include("user")
            .descending("createdAt");
        find_as(self.store.as_ref(), &query, ctx.token())
            .await
            .context("获取用户书评失败")
    }

    pub async fn current_user_reviews(&self, ctx: &SessionContext) -> Result<Vec<Review>> {
        let user = ctx.require_user()?;
        self.reviews_by_user(ctx, &user.user_id).await
    }

    /// 修改自己的评论，只校验提供了的字段
    pub async fn update_review(
        &self,
        ctx: &SessionContext,
        review_id: &str,
        update: ReviewUpdate,
    ) -> Result<Review> {
        let user = ctx.require_user()?;
        let mut fields = Record::new();
        if let Some(rating) = update.rating {
            validate_rating(rating)?;
            fields.insert("rating".to_string(), json!(rating));
        }
        if let Some(text) = update.review_text {
            validate_text(&text)?;
            fields.insert("reviewText".to_string(), Value::String(text.trim().to_string()));
        }
        if fields.is_empty() {
            return Err(LoungeError::Validation("Nothing to update".to_string()).into());
        }

        self.load_owned(user, review_id).await?;
        info!("[ReviewService] ✏️ 修改评论: {}", review_id);
        self.store
            .update(REVIEW_CLASS, review_id, fields, Some(&user.session_token))
            .await
            .context("修改评论失败")?;
        self.get_review(ctx, review_id).await
    }

    pub async fn delete_review(&self, ctx: &SessionContext, review_id: &str) -> Result<()> {
        let user = ctx.require_user()?;
        self.load_owned(user, review_id).await?;
        info!("[ReviewService] 🗑️ 删除评论: {}", review_id);
        self.store
            .destroy(REVIEW_CLASS, review_id, Some(&user.session_token))
            .await
            .context("删除评论失败")
    }

    /// 点赞：原子自增后重新读取
    pub async fn like_review(&self, ctx: &SessionContext, review_id: &str) -> Result<Review> {
        let user = ctx.require_user()?;
        let mut fields = Record::new();
        fields.insert("likes".to_string(), increment(1));
        info!("[ReviewService] 👍 点赞评论: {}", review_id);
        self.store
            .update(REVIEW_CLASS, review_id, fields, Some(&user.session_token))
            .await
            .context("点赞失败")?;
        self.get_review(ctx, review_id).await
    }

    pub async fn get_review(&self, ctx: &SessionContext, review_id: &str) -> Result<Review> {
        let record = self
            .store
            .get(REVIEW_CLASS, review_id, &["user"], ctx.token())
            .await
            .context("获取评论失败")?;
        decode(record)
    }

    pub async fn rating_summary(&self, ctx: &SessionContext, book_id: &str) -> Result<RatingSummary> {
        let query = Query::new(REVIEW_CLASS)
            .equal_to("book.bookId", book_id)
            .select_keys(&["rating", "book"])
            .limit(AGGREGATE_LIMIT);
        let reviews: Vec<Review> = find_as(self.store.as_ref(), &query, ctx.token())
            .await
            .context("获取评分失败")?;
        Ok(RatingSummary::from_ratings(reviews.iter().map(|r| r.rating)))
    }

    /// 所有书籍的评分（最多聚合 1000 条评论）
    pub async fn all_book_ratings(&self, ctx: &SessionContext) -> Result<HashMap<String, RatingSummary>> {
        let query = Query::new(REVIEW_CLASS)
            .select_keys(&["rating", "book"])
            .limit(AGGREGATE_LIMIT);
        let reviews: Vec<Review> = find_as(self.store.as_ref(), &query, ctx.token())
            .await
            .context("获取评分失败")?;
        Ok(ratings_by_book(&reviews))
    }

    async fn load_owned(&self, user: &SessionUser, review_id: &str) -> Result<Review> {
        let record = self
            .store
            .get(REVIEW_CLASS, review_id, &[], Some(&user.session_token))
            .await
            .context("获取评论失败")?;
        let review: Review = decode(record)?;
        if review.author_id() != Some(user.user_id.as_str()) {
            return Err(LoungeError::Forbidden("You can only modify your own reviews".to_string()).into());
        }
        Ok(review)
    }
}

/// 创建响应中的 user 只是指针，由调用方补全
fn strip_user(mut record: Record) -> Record {
    record.remove("user");
    record
}
