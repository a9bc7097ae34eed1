use crate::lounge::book::BookSnapshot;
use crate::lounge::error::LoungeError;
use crate::lounge::session::SessionUser;
use crate::lounge::types::deserialize_string_or_null;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ANONYMOUS: &str = "Anonymous";

/// 评论作者；未 include 时只有 id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    #[serde(rename = "objectId")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub username: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub first_name: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub last_name: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub profile_picture: String,
    #[serde(default)]
    pub reviews_anonymous: bool,
}

impl From<&SessionUser> for UserRef {
    fn from(user: &SessionUser) -> Self {
        Self {
            id: user.user_id.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            profile_picture: user.profile_picture.clone(),
            reviews_anonymous: user.reviews_anonymous,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "objectId")]
    pub id: String,
    #[serde(default)]
    pub book: BookSnapshot,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub rating: u8,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub review_text: String,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Review {
    pub fn author_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    /// 作者展示名：选择匿名时为 "Anonymous"，否则为 "名 姓"（缺名时同样显示 "Anonymous"）
    pub fn author_display_name(&self) -> String {
        match &self.user {
            Some(user) if !user.reviews_anonymous => {
                let first = if user.first_name.trim().is_empty() {
                    ANONYMOUS
                } else {
                    user.first_name.trim()
                };
                format!("{} {}", first, user.last_name.trim()).trim().to_string()
            }
            _ => ANONYMOUS.to_string(),
        }
    }
}

/// 新评论
#[derive(Debug, Clone)]
pub struct NewReview {
    pub book: BookSnapshot,
    pub rating: u8,
    pub review_text: String,
}

/// 修改评论，`None` 表示不修改
#[derive(Debug, Clone, Default)]
pub struct ReviewUpdate {
    pub rating: Option<u8>,
    pub review_text: Option<String>,
}

pub(crate) fn validate_rating(rating: u8) -> Result<(), LoungeError> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(LoungeError::Validation("Please select a rating".to_string()))
    }
}

pub(crate) fn validate_text(text: &str) -> Result<(), LoungeError> {
    if text.trim().is_empty() {
        Err(LoungeError::Validation("Please write a review".to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_honors_anonymity() {
        let mut review: Review = serde_json::from_str(
            r#"{"objectId":"r1","rating":4,"reviewText":"Great","likes":2,
                "createdAt":"2024-03-01T10:00:00.000Z",
                "book":{"bookId":"b1","title":"Emma","author":"Jane Austen","coverImage":""},
                "user":{"__type":"Object","className":"_User","objectId":"u1",
                        "firstName":"Ada","lastName":"Lovelace","reviewsAnonymous":false}}"#,
        )
        .unwrap();
        assert_eq!(review.author_display_name(), "Ada Lovelace");

        if let Some(user) = review.user.as_mut() {
            user.reviews_anonymous = true;
        }
        assert_eq!(review.author_display_name(), ANONYMOUS);

        review.user = Some(UserRef {
            id: "u2".into(),
            ..Default::default()
        });
        assert_eq!(review.author_display_name(), ANONYMOUS);
    }

    #[test]
    fn pointer_only_user_decodes() {
        let review: Review = serde_json::from_str(
            r#"{"objectId":"r2","user":{"__type":"Pointer","className":"_User","objectId":"u9"}}"#,
        )
        .unwrap();
        assert_eq!(review.author_id(), Some("u9"));
        assert_eq!(review.likes, 0);
        assert!(review.created_at.is_none());
    }

    #[test]
    fn rating_bounds() {
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(6).is_err());
        assert!(validate_text("   ").is_err());
    }
}
