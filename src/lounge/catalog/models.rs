//! 图书目录数据模型

use crate::lounge::types::deserialize_vec_or_null;
use serde::{Deserialize, Serialize};

/// 检索响应 `{"totalItems": n, "items": [...]}`，没有结果时不含 `items`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeList {
    #[serde(default)]
    pub total_items: u64,
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub items: Vec<Volume>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub volume_info: VolumeInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub description: Option<String>,
    pub categories: Option<Vec<String>>,
    pub image_links: Option<ImageLinks>,
    pub published_date: Option<String>,
    pub page_count: Option<u32>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<u32>,
    pub language: Option<String>,
    pub preview_link: Option<String>,
    pub info_link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLinks {
    pub thumbnail: Option<String>,
    pub small_thumbnail: Option<String>,
}

/// 规范化后的目录书籍，所有字段都有值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogBook {
    pub id: String,
    pub title: String,
    /// 作者列表以 ", " 连接
    pub author: String,
    pub authors: Vec<String>,
    pub description: String,
    /// 分类以 ", " 连接，没有分类时为 "General"
    pub genre: String,
    pub categories: Vec<String>,
    #[serde(rename = "imageURL")]
    pub image_url: String,
    pub published_date: String,
    pub page_count: u32,
    pub average_rating: f64,
    pub ratings_count: u32,
    pub language: String,
    pub preview_link: String,
    pub info_link: String,
}

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
pub const NO_DESCRIPTION: &str = "No description available.";
pub const DEFAULT_GENRE: &str = "General";

impl CatalogBook {
    pub fn from_volume(volume: Volume) -> Self {
        let info = volume.volume_info;

        let title = info
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
        let authors = info
            .authors
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| vec![UNKNOWN_AUTHOR.to_string()]);
        let categories = info.categories.unwrap_or_default();
        let genre = if categories.is_empty() {
            DEFAULT_GENRE.to_string()
        } else {
            categories.join(", ")
        };
        let image_url = info
            .image_links
            .and_then(|links| {
                links
                    .thumbnail
                    .filter(|u| !u.is_empty())
                    .or(links.small_thumbnail.filter(|u| !u.is_empty()))
            })
            .unwrap_or_default();

        Self {
            id: volume.id,
            author: authors.join(", "),
            authors,
            title,
            description: info
                .description
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            genre,
            categories,
            image_url,
            published_date: info.published_date.unwrap_or_default(),
            page_count: info.page_count.unwrap_or(0),
            average_rating: info.average_rating.unwrap_or(0.0),
            ratings_count: info.ratings_count.unwrap_or(0),
            language: info.language.unwrap_or_else(|| "en".to_string()),
            preview_link: info.preview_link.unwrap_or_default(),
            info_link: info.info_link.unwrap_or_default(),
        }
    }
}
