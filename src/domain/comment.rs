use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: Uuid,
    pub author_username: String,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Comment {
    pub fn summary(&self) -> &str {
        super::summarize(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::Comment;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[test]
    fn summary_is_first_fifteen_characters() {
        let comment = Comment {
            id: 1,
            post_id: 1,
            author_id: Uuid::nil(),
            author_username: "auth".into(),
            text: "a comment that runs long".into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        assert_eq!(comment.summary(), "a comment that ");
    }
}
