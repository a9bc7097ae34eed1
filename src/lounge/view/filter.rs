//! 书籍搜索、按类型筛选与排序

use crate::lounge::book::BookDetails;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// 不按类型筛选
pub const ALL_GENRES: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Title,
    Author,
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortBy::Title => write!(f, "title"),
            SortBy::Author => write!(f, "author"),
        }
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "title" => Ok(SortBy::Title),
            "author" => Ok(SortBy::Author),
            other => Err(format!("未知排序方式: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookFilter {
    pub term: String,
    pub genre: String,
    pub sort_by: SortBy,
}

impl Default for BookFilter {
    fn default() -> Self {
        Self {
            term: String::new(),
            genre: ALL_GENRES.to_string(),
            sort_by: SortBy::Title,
        }
    }
}

impl BookFilter {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// 可选的类型：`"all"` 在前，其余为出现顺序去重后的小写类型
    pub fn genres(books: &[BookDetails]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut genres = vec![ALL_GENRES.to_string()];
        for book in books {
            let genre = book.genre.to_lowercase();
            if genre != ALL_GENRES && seen.insert(genre.clone()) {
                genres.push(genre);
            }
        }
        genres
    }

    /// 按关键词（标题/作者/类型）和类型筛选后排序
    pub fn apply(&self, books: &[BookDetails]) -> Vec<BookDetails> {
        let term = self.term.trim().to_lowercase();
        let genre = self.genre.to_lowercase();

        let mut filtered: Vec<BookDetails> = books
            .iter()
            .filter(|book| {
                term.is_empty()
                    || book.title.to_lowercase().contains(&term)
                    || book.author.to_lowercase().contains(&term)
                    || book.genre.to_lowercase().contains(&term)
            })
            .filter(|book| genre == ALL_GENRES || book.genre.to_lowercase() == genre)
            .cloned()
            .collect();

        filtered.sort_by(|a, b| match self.sort_by {
            SortBy::Title => compare_text(&a.title, &b.title),
            SortBy::Author => compare_text(&a.author, &b.author),
        });
        filtered
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
