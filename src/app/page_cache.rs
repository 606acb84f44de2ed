use anyhow::Result;

use crate::infra::cache::RedisCache;

/// Key prefix shared by every cached index page.
pub const INDEX_PAGE_PREFIX: &str = "views:index_page";

/// Whole-response cache for the index feed.
///
/// Entries expire after a fixed TTL and are never invalidated by writes, so a
/// new post can take up to one TTL to show up on `/`. Redis failures degrade
/// to a cache miss.
#[derive(Clone)]
pub struct PageCache {
    cache: RedisCache,
    ttl_seconds: u64,
}

impl PageCache {
    pub fn new(cache: RedisCache, ttl_seconds: u64) -> Self {
        Self { cache, ttl_seconds }
    }

    pub fn key(page_number: i64) -> String {
        format!("{}:{}", INDEX_PAGE_PREFIX, page_number)
    }

    pub async fn get(&self, page_number: i64) -> Option<Vec<u8>> {
        match self.cache.get_bytes(&Self::key(page_number)).await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(error = ?err, page = page_number, "failed to read page cache");
                None
            }
        }
    }

    pub async fn put(&self, page_number: i64, body: &[u8]) {
        if self.ttl_seconds == 0 {
            return;
        }
        if let Err(err) = self
            .cache
            .set_bytes_ex(&Self::key(page_number), body, self.ttl_seconds)
            .await
        {
            tracing::warn!(error = ?err, page = page_number, "failed to write page cache");
        }
    }

    /// Drops every cached index page.
    pub async fn clear(&self) -> Result<usize> {
        let removed = self.cache.delete_prefix(INDEX_PAGE_PREFIX).await?;
        tracing::info!(removed, "cleared page cache");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_share_the_index_prefix() {
        assert_eq!(PageCache::key(1), "views:index_page:1");
        assert!(PageCache::key(42).starts_with(INDEX_PAGE_PREFIX));
    }
}
