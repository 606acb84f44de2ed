use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// `user_id` subscribes to posts written by `author_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub user_id: Uuid,
    pub author_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
