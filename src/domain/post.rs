use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::group::GroupRef;

/// Prefix of every uploaded post image key in the content store.
pub const IMAGE_PREFIX: &str = "posts/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub author_id: Uuid,
    pub author_username: String,
    pub group: Option<GroupRef>,
    /// Content-store key, e.g. `posts/small.gif`.
    pub image: Option<String>,
    /// Presigned URL for `image` (populated at response time)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Post {
    pub fn summary(&self) -> &str {
        super::summarize(&self.text)
    }

    pub fn is_authored_by(&self, user_id: Uuid) -> bool {
        self.author_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(text: &str) -> Post {
        Post {
            id: 1,
            text: text.to_string(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            author_id: Uuid::nil(),
            author_username: "auth".to_string(),
            group: None,
            image: None,
            image_url: None,
        }
    }

    #[test]
    fn summary_is_first_fifteen_characters() {
        assert_eq!(post("test_text_min_15_symbols").summary(), "test_text_min_1");
    }

    #[test]
    fn summary_of_short_text_is_whole_text() {
        assert_eq!(post("hi").summary(), "hi");
    }

    #[test]
    fn summary_respects_multibyte_characters() {
        assert_eq!(post("Текст поста для проверки").summary(), "Текст поста для");
    }
}
