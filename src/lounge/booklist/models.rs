use crate::lounge::types::{deserialize_string_or_null, deserialize_vec_or_null};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookListKind {
    Read,
    Wishlist,
}

impl BookListKind {
    pub fn class_name(&self) -> &'static str {
        match self {
            BookListKind::Read => "ReadBook",
            BookListKind::Wishlist => "WishlistBook",
        }
    }
}

impl fmt::Display for BookListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookListKind::Read => f.write_str("read"),
            BookListKind::Wishlist => f.write_str("wishlist"),
        }
    }
}

impl FromStr for BookListKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(BookListKind::Read),
            "wishlist" | "wish" => Ok(BookListKind::Wishlist),
            other => Err(format!("未知的书单类型: {other}")),
        }
    }
}

/// 书单条目（保存时的书籍快照）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookListEntry {
    #[serde(rename = "objectId")]
    pub id: String,
    pub book_id: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub author: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub cover_image: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub genre: String,
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub categories: Vec<String>,
    /// 加入书单的时间
    #[serde(rename = "createdAt", default)]
    pub added_at: Option<DateTime<Utc>>,
}
