//! 书籍的统一表示
//!
//! 书籍数据有四个来源：图书目录、用户书单、评论中的快照以及内置的精选书目。
//! [`BookSource`] 把它们统一起来，每个来源各有一条显式的映射。

use crate::lounge::booklist::BookListEntry;
use crate::lounge::catalog::{CatalogBook, FeaturedBook};
use serde::{Deserialize, Serialize};

/// 评论中保存的书籍快照（`Review.book`）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSnapshot {
    #[serde(default)]
    pub book_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub cover_image: String,
}

/// 写入书单时保存的书籍信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookDetails {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub cover_image: String,
    pub description: String,
    pub genre: String,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum BookSource {
    Catalog(CatalogBook),
    Listed(BookListEntry),
    Reviewed(BookSnapshot),
    Featured(FeaturedBook),
}

impl BookSource {
    pub fn book_id(&self) -> &str {
        match self {
            BookSource::Catalog(book) => &book.id,
            BookSource::Listed(entry) => &entry.book_id,
            BookSource::Reviewed(snapshot) => &snapshot.book_id,
            BookSource::Featured(book) => &book.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            BookSource::Catalog(book) => &book.title,
            BookSource::Listed(entry) => &entry.title,
            BookSource::Reviewed(snapshot) => &snapshot.title,
            BookSource::Featured(book) => &book.title,
        }
    }

    /// 评论使用的快照
    pub fn snapshot(&self) -> BookSnapshot {
        match self {
            BookSource::Catalog(book) => BookSnapshot {
                book_id: book.id.clone(),
                title: book.title.clone(),
                author: book.author.clone(),
                cover_image: book.image_url.clone(),
            },
            BookSource::Listed(entry) => BookSnapshot {
                book_id: entry.book_id.clone(),
                title: entry.title.clone(),
                author: entry.author.clone(),
                cover_image: entry.cover_image.clone(),
            },
            BookSource::Reviewed(snapshot) => snapshot.clone(),
            BookSource::Featured(book) => BookSnapshot {
                book_id: book.id.clone(),
                title: book.title.clone(),
                author: book.author.clone(),
                cover_image: book.image_url.clone(),
            },
        }
    }

    /// 书单使用的完整信息，快照中没有的字段留空，类型默认为 "General"
    pub fn details(&self) -> BookDetails {
        match self {
            BookSource::Catalog(book) => BookDetails {
                book_id: book.id.clone(),
                title: book.title.clone(),
                author: book.author.clone(),
                cover_image: book.image_url.clone(),
                description: book.description.clone(),
                genre: book.genre.clone(),
                categories: book.categories.clone(),
            },
            BookSource::Listed(entry) => BookDetails {
                book_id: entry.book_id.clone(),
                title: entry.title.clone(),
                author: entry.author.clone(),
                cover_image: entry.cover_image.clone(),
                description: entry.description.clone(),
                genre: entry.genre.clone(),
                categories: entry.categories.clone(),
            },
            BookSource::Reviewed(snapshot) => BookDetails {
                book_id: snapshot.book_id.clone(),
                title: snapshot.title.clone(),
                author: snapshot.author.clone(),
                cover_image: snapshot.cover_image.clone(),
                description: String::new(),
                genre: "General".to_string(),
                categories: Vec::new(),
            },
            BookSource::Featured(book) => BookDetails {
                book_id: book.id.clone(),
                title: book.title.clone(),
                author: book.author.clone(),
                cover_image: book.image_url.clone(),
                description: book.description.clone(),
                categories: vec![book.genre.clone()],
                genre: book.genre.clone(),
            },
        }
    }
}
