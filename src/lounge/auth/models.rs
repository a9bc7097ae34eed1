use crate::lounge::error::LoungeError;
use crate::lounge::session::SessionUser;
use crate::lounge::types::{deserialize_string_or_null, deserialize_vec_or_null};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// 用户名：3-20 位字母、数字或下划线
pub fn validate_username(username: &str) -> Result<(), LoungeError> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]{3,20}$").ok());
    if pattern.as_ref().is_some_and(|p| p.is_match(username)) {
        Ok(())
    } else {
        Err(LoungeError::Validation(
            "Username must be 3-20 characters and contain only letters, numbers and underscores"
                .to_string(),
        ))
    }
}

/// 用户检索结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
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
}

impl UserSummary {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// 当前用户的完整资料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "objectId")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub username: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub first_name: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub last_name: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub email: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub profile_picture: String,
    #[serde(default)]
    pub reviews_anonymous: bool,
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub favorite_genres: Vec<String>,
}

impl UserProfile {
    pub fn into_session_user(self, session_token: String) -> SessionUser {
        SessionUser {
            user_id: self.id,
            session_token,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            profile_picture: self.profile_picture,
            reviews_anonymous: self.reviews_anonymous,
        }
    }
}

/// 注册表单
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    /// 写入前的字段校验
    pub fn validate(&self) -> Result<(), LoungeError> {
        validate_username(&self.username)?;
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(LoungeError::Validation(
                "First and last name are required".to_string(),
            ));
        }
        if !self.email.contains('@') {
            return Err(LoungeError::Validation(
                "Please enter a valid email address".to_string(),
            ));
        }
        if self.password.is_empty() {
            return Err(LoungeError::Validation("Password is required".to_string()));
        }
        Ok(())
    }
}

/// 资料修改，`None` 表示不修改
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub profile_picture: Option<String>,
    pub reviews_anonymous: Option<bool>,
    pub favorite_genres: Option<Vec<String>>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.profile_picture.is_none()
            && self.reviews_anonymous.is_none()
            && self.favorite_genres.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(validate_username("reader_01").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("a_very_long_username_123").is_err());
    }

    #[test]
    fn registration_requires_all_fields() {
        let mut form = Registration {
            username: "ada_l".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            password: "engine".into(),
        };
        assert!(form.validate().is_ok());
        form.email = "ada.example.com".into();
        assert!(form.validate().is_err());
        form.email = "ada@example.com".into();
        form.last_name = " ".into();
        assert!(form.validate().is_err());
    }

    #[test]
    fn profile_tolerates_null_fields() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"objectId":"u1","username":"ada","firstName":null,"favoriteGenres":null}"#,
        )
        .unwrap();
        assert_eq!(profile.first_name, "");
        assert!(profile.favorite_genres.is_empty());
        assert!(!profile.reviews_anonymous);
    }
}
