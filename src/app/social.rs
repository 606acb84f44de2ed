use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::social_graph::Follow;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct SocialService {
    db: Db,
}

impl SocialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Subscribes `user_id` to `author_id`.
    ///
    /// Returns `false` when nothing was inserted: the pair already exists or the
    /// user targeted themselves. Concurrent duplicates are settled by the
    /// `follows_unique_pair` constraint.
    pub async fn follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO follows (user_id, author_id) \
             SELECT $1, $2 \
             WHERE $1 <> $2 \
             ON CONFLICT ON CONSTRAINT follows_unique_pair DO NOTHING",
        )
        .bind(user_id)
        .bind(author_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn unfollow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(exists)
    }

    pub async fn get_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<Option<Follow>> {
        let row = sqlx::query(
            "SELECT user_id, author_id, created_at FROM follows WHERE user_id = $1 AND author_id = $2",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| Follow {
            user_id: row.get("user_id"),
            author_id: row.get("author_id"),
            created_at: row.get("created_at"),
        }))
    }
}
