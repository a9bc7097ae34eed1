//! 图书目录 HTTP API 客户端
//!
//! 只发 GET 请求；不重试、不缓存、不处理限流

use crate::lounge::catalog::models::{CatalogBook, Volume, VolumeList};
use crate::lounge::config::LoungeConfig;
use crate::lounge::error::LoungeError;
use anyhow::{Context, Result};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, error, info};

/// 单次检索的最大条数（API 限制）
pub const MAX_RESULTS_LIMIT: u32 = 40;

/// 默认检索条数
pub const DEFAULT_MAX_RESULTS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    Relevance,
    Newest,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderBy::Relevance => "relevance",
            OrderBy::Newest => "newest",
        }
    }
}

/// 热门书籍分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PopularCategory {
    #[default]
    Bestseller,
    Fiction,
    Nonfiction,
    Mystery,
    Romance,
    Scifi,
    Fantasy,
}

impl PopularCategory {
    /// 对应的检索词和排序
    fn query(&self) -> (&'static str, OrderBy) {
        match self {
            PopularCategory::Bestseller => ("subject:fiction", OrderBy::Relevance),
            PopularCategory::Fiction => ("subject:fiction", OrderBy::Newest),
            PopularCategory::Nonfiction => ("subject:nonfiction", OrderBy::Relevance),
            PopularCategory::Mystery => ("subject:mystery", OrderBy::Relevance),
            PopularCategory::Romance => ("subject:romance", OrderBy::Relevance),
            PopularCategory::Scifi => ("subject:science fiction", OrderBy::Relevance),
            PopularCategory::Fantasy => ("subject:fantasy", OrderBy::Relevance),
        }
    }
}

/// 未知分类按 bestseller 处理
impl FromStr for PopularCategory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "fiction" => PopularCategory::Fiction,
            "nonfiction" => PopularCategory::Nonfiction,
            "mystery" => PopularCategory::Mystery,
            "romance" => PopularCategory::Romance,
            "scifi" => PopularCategory::Scifi,
            "fantasy" => PopularCategory::Fantasy,
            _ => PopularCategory::Bestseller,
        })
    }
}

impl fmt::Display for PopularCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PopularCategory::Bestseller => "bestseller",
            PopularCategory::Fiction => "fiction",
            PopularCategory::Nonfiction => "nonfiction",
            PopularCategory::Mystery => "mystery",
            PopularCategory::Romance => "romance",
            PopularCategory::Scifi => "scifi",
            PopularCategory::Fantasy => "fantasy",
        };
        f.write_str(name)
    }
}

/// 图书目录 HTTP API 客户端
pub struct CatalogApi {
    client: reqwest::Client,
    base_url: String,
}

impl CatalogApi {
    pub fn new(config: &LoungeConfig) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .timeout(config.request_timeout)
            .build()
            .context("创建 HTTP 客户端失败")?;
        Ok(Self::with_client(client, config.catalog_base_url.clone()))
    }

    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 检索书籍，`max_results` 限制在 1..=40
    pub async fn search(
        &self,
        query: &str,
        max_results: u32,
        order_by: OrderBy,
    ) -> Result<Vec<CatalogBook>> {
        let max_results = max_results.clamp(1, MAX_RESULTS_LIMIT);
        info!("[CatalogAPI] 📡 检索书籍: '{}' (最多 {} 条)", query, max_results);
        debug!("[CatalogAPI]   请求URL: {}", self.base_url);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query.to_string()),
                ("maxResults", max_results.to_string()),
                ("orderBy", order_by.as_str().to_string()),
            ])
            .send()
            .await
            .context("请求失败")?;

        let list: VolumeList = Self::read_body(response, "检索").await?;
        let mut books: Vec<CatalogBook> =
            list.items.into_iter().map(CatalogBook::from_volume).collect();
        books.truncate(max_results as usize);
        info!("[CatalogAPI] ✅ 检索返回 {} 本书", books.len());
        Ok(books)
    }

    pub async fn get_by_id(&self, book_id: &str) -> Result<CatalogBook> {
        let url = format!("{}/{}", self.base_url, book_id);
        info!("[CatalogAPI] 📡 获取书籍详情: {}", book_id);
        debug!("[CatalogAPI]   请求URL: {}", url);

        let response = self.client.get(&url).send().await.context("请求失败")?;
        let volume: Volume = Self::read_body(response, "获取详情").await?;
        Ok(CatalogBook::from_volume(volume))
    }

    pub async fn by_author(&self, author: &str, max_results: u32) -> Result<Vec<CatalogBook>> {
        self.search(&format!("inauthor:{author}"), max_results, OrderBy::Relevance)
            .await
    }

    pub async fn by_genre(&self, genre: &str, max_results: u32) -> Result<Vec<CatalogBook>> {
        self.search(&format!("subject:{genre}"), max_results, OrderBy::Relevance)
            .await
    }

    pub async fn popular(
        &self,
        category: PopularCategory,
        max_results: u32,
    ) -> Result<Vec<CatalogBook>> {
        let (query, order_by) = category.query();
        info!("[CatalogAPI] 🔥 热门书籍分类: {}", category);
        self.search(query, max_results, order_by).await
    }

    async fn read_body<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        operation_name: &str,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            error!("[CatalogAPI] {}请求失败，HTTP状态: {}", operation_name, status);
            return Err(LoungeError::Catalog {
                status: status.as_u16(),
            }
            .into());
        }
        let body_bytes = response.bytes().await.context("读取响应 body 失败")?;
        serde_json::from_slice(&body_bytes).map_err(|e| {
            error!("[CatalogAPI] {}反序列化失败: {:?}", operation_name, e);
            anyhow::anyhow!("反序列化响应失败: {:?}", e)
        })
    }
}
