use anyhow::Result;
use uuid::Uuid;

use crate::app::pagination::{Page, Paginator};
use crate::app::posts::{post_from_row, POST_COLUMNS, POST_JOINS};
use crate::domain::post::Post;
use crate::infra::db::Db;

/// Which posts a feed is made of. Every feed is ordered newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedScope {
    All,
    Group(i64),
    Author(Uuid),
    /// Posts by every author the given user follows.
    FollowedBy(Uuid),
}

impl FeedScope {
    /// `WHERE` condition with the scope parameter bound at `$n`.
    fn condition(&self, n: usize) -> String {
        match self {
            Self::All => "TRUE".to_string(),
            Self::Group(_) => format!("p.group_id = ${}", n),
            Self::Author(_) => format!("p.author_id = ${}", n),
            Self::FollowedBy(_) => format!(
                "p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ${})",
                n
            ),
        }
    }
}

#[derive(Clone)]
pub struct FeedService {
    db: Db,
    per_page: i64,
}

impl FeedService {
    pub fn new(db: Db, per_page: i64) -> Self {
        Self { db, per_page }
    }

    pub async fn page(&self, scope: FeedScope, requested: i64) -> Result<Page<Post>> {
        let count = self.count(scope).await?;
        let paginator = Paginator::new(count, self.per_page);
        let window = paginator.window(requested);

        let sql = format!(
            "SELECT {} FROM posts p {} WHERE {} \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT $1 OFFSET $2",
            POST_COLUMNS,
            POST_JOINS,
            scope.condition(3)
        );
        let query = sqlx::query(&sql).bind(window.limit).bind(window.offset);
        let query = match scope {
            FeedScope::All => query,
            FeedScope::Group(group_id) => query.bind(group_id),
            FeedScope::Author(user_id) | FeedScope::FollowedBy(user_id) => query.bind(user_id),
        };
        let rows = query.fetch_all(self.db.pool()).await?;

        let posts = rows.iter().map(post_from_row).collect();
        Ok(paginator.page(window, posts))
    }

    async fn count(&self, scope: FeedScope) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM posts p WHERE {}",
            scope.condition(1)
        );
        let query = sqlx::query_scalar::<_, i64>(&sql);
        let query = match scope {
            FeedScope::All => query,
            FeedScope::Group(group_id) => query.bind(group_id),
            FeedScope::Author(user_id) | FeedScope::FollowedBy(user_id) => query.bind(user_id),
        };
        Ok(query.fetch_one(self.db.pool()).await?)
    }
}
