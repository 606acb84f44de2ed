use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::group::GroupRef;
use crate::domain::post::Post;
use crate::infra::db::Db;

/// Columns selected by every post query; pair with [`POST_JOINS`].
pub(crate) const POST_COLUMNS: &str = "p.id, p.text, p.created_at, p.author_id, \
     u.username AS author_username, p.group_id, g.title AS group_title, g.slug AS group_slug, p.image";

pub(crate) const POST_JOINS: &str = "JOIN users u ON u.id = p.author_id \
     LEFT JOIN groups g ON g.id = p.group_id";

pub(crate) fn post_from_row(row: &PgRow) -> Post {
    let group_id: Option<i64> = row.get("group_id");
    let group = group_id.map(|id| GroupRef {
        id,
        title: row.get("group_title"),
        slug: row.get("group_slug"),
    });

    Post {
        id: row.get("id"),
        text: row.get("text"),
        created_at: row.get("created_at"),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
        group,
        image: row.get("image"),
        image_url: None,
    }
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(
        &self,
        author_id: Uuid,
        text: String,
        group_id: Option<i64>,
        image: Option<String>,
    ) -> Result<Post> {
        let post_id: i64 = sqlx::query_scalar(
            "INSERT INTO posts (author_id, text, group_id, image) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(author_id)
        .bind(text)
        .bind(group_id)
        .bind(image)
        .fetch_one(self.db.pool())
        .await?;

        self.get_post(post_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("post {} vanished after insert", post_id))
    }

    pub async fn get_post(&self, post_id: i64) -> Result<Option<Post>> {
        let sql = format!(
            "SELECT {} FROM posts p {} WHERE p.id = $1",
            POST_COLUMNS, POST_JOINS
        );
        let row = sqlx::query(&sql)
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    /// Replaces text and group, and the image when a new one is given.
    ///
    /// Only the author's row matches, so a foreign `author_id` leaves the post
    /// untouched and yields `None`.
    pub async fn update_post(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
        group_id: Option<i64>,
        image: Option<String>,
    ) -> Result<Option<Post>> {
        let result = sqlx::query(
            "UPDATE posts \
             SET text = $3, group_id = $4, image = COALESCE($5, image) \
             WHERE id = $1 AND author_id = $2",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .bind(group_id)
        .bind(image)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_post(post_id).await
    }

    pub async fn count_by_author(&self, author_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}
