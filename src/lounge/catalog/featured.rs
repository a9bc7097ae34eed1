//! 内置精选书目（JSON 文件）

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturedBook {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub genre: String,
    #[serde(rename = "imageURL", default)]
    pub image_url: String,
    #[serde(default)]
    pub description: String,
}

/// 文件里的 id 可能是数字
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("无效的 id: {other}"))),
    }
}

pub fn parse_featured_books(json: &str) -> Result<Vec<FeaturedBook>> {
    serde_json::from_str(json).context("解析精选书目失败")
}

/// 读取精选书目文件
pub async fn load_featured_books(path: impl AsRef<Path>) -> Result<Vec<FeaturedBook>> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("读取精选书目失败: {}", path.display()))?;
    let books = parse_featured_books(&content)?;
    info!("[Featured] 📚 已加载 {} 本精选书籍", books.len());
    Ok(books)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_numeric_ids() {
        let books = parse_featured_books(
            r#"[{"id":1,"title":"Dune","author":"Frank Herbert","genre":"Science Fiction",
                 "imageURL":"https://img/dune.jpg","description":"Spice."},
                {"id":"b2","title":"Emma"}]"#,
        )
        .unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].id, "1");
        assert_eq!(books[0].image_url, "https://img/dune.jpg");
        assert_eq!(books[1].author, "");
    }

    #[tokio::test]
    async fn loads_from_file() {
        let path = std::env::temp_dir().join(format!("featured-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, r#"[{"id":"f1","title":"Beloved","author":"Toni Morrison"}]"#)
            .await
            .unwrap();
        let books = load_featured_books(&path).await.unwrap();
        assert_eq!(books[0].title, "Beloved");
        let _ = tokio::fs::remove_file(&path).await;

        assert!(load_featured_books(&path).await.is_err());
    }
}
