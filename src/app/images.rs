use anyhow::{anyhow, Result};
use redis::AsyncCommands;
use uuid::Uuid;

use crate::domain::post::{Post, IMAGE_PREFIX};
use crate::infra::{cache::RedisCache, storage::ObjectStorage};

const IMAGE_URL_TTL_SECONDS: u64 = 14400;
const STORE_ATTEMPTS: usize = 4;

/// An uploaded image that already decoded successfully.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub filename: String,
    pub content_type: &'static str,
    pub data: bytes::Bytes,
}

#[derive(Clone)]
pub struct ImageService {
    cache: RedisCache,
    storage: ObjectStorage,
}

impl ImageService {
    pub fn new(cache: RedisCache, storage: ObjectStorage) -> Self {
        Self { cache, storage }
    }

    /// Writes the image under `posts/<filename>` and returns the key used.
    ///
    /// An existing object is never overwritten: every write is conditional,
    /// and a taken key is retried with a short random suffix on the file stem.
    pub async fn store(&self, image: ImageFile) -> Result<String> {
        let mut key = image_key(&image.filename, None);
        for _ in 0..STORE_ATTEMPTS {
            let written = self
                .storage
                .put_object_if_absent(&key, image.content_type, image.data.clone())
                .await?;
            if written {
                tracing::debug!(key = %key, "stored post image");
                return Ok(key);
            }
            let suffix = Uuid::new_v4().simple().to_string();
            key = image_key(&image.filename, Some(&suffix[..7]));
        }
        Err(anyhow!("no free image key for {}", image.filename))
    }

    /// Removes an image that no post ended up referencing.
    pub async fn discard(&self, key: &str) {
        match self.storage.delete_object(key).await {
            Ok(()) => tracing::debug!(key = %key, "discarded unused image"),
            Err(err) => tracing::warn!(error = ?err, key = %key, "failed to discard unused image"),
        }
    }

    /// Presigned URL for an image key, cached in Redis for most of its lifetime.
    pub async fn image_url(&self, key: &str) -> Option<String> {
        let cache_key = format!("presigned:{}", key);

        if let Ok(mut conn) = self.cache.client().get_multiplexed_async_connection().await {
            if let Ok(Some(cached)) = conn.get::<_, Option<String>>(&cache_key).await {
                return Some(cached);
            }
        }

        let url = match self.storage.presigned_get_url(key, IMAGE_URL_TTL_SECONDS).await {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(error = ?err, key = %key, "failed to presign image url");
                return None;
            }
        };

        // Keep a 5 minute margin so a cached URL never outlives its signature.
        let cache_ttl = IMAGE_URL_TTL_SECONDS.saturating_sub(300);
        if let Ok(mut conn) = self.cache.client().get_multiplexed_async_connection().await {
            if let Err(err) = conn.set_ex::<_, _, ()>(&cache_key, &url, cache_ttl).await {
                tracing::warn!(error = ?err, key = %key, "failed to cache image url");
            }
        }

        Some(url)
    }

    pub async fn populate_post_image_urls(&self, posts: &mut [Post]) {
        let futures: Vec<_> = posts
            .iter()
            .enumerate()
            .filter(|(_, p)| p.image.is_some())
            .map(|(i, p)| {
                let key = p.image.clone();
                async move {
                    let url = match key {
                        Some(key) => self.image_url(&key).await,
                        None => None,
                    };
                    (i, url)
                }
            })
            .collect();

        let results = futures::future::join_all(futures).await;
        for (i, url) in results {
            posts[i].image_url = url;
        }
    }
}

/// Only the final path component of a client file name is kept.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let name = raw
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    let name: String = name
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| !c.is_control())
        .collect();

    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name)
    }
}

fn image_key(filename: &str, suffix: Option<&str>) -> String {
    match suffix {
        None => format!("{}{}", IMAGE_PREFIX, filename),
        Some(suffix) => match filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                format!("{}{}_{}.{}", IMAGE_PREFIX, stem, suffix, ext)
            }
            _ => format!("{}{}_{}", IMAGE_PREFIX, filename, suffix),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_key_uses_posts_prefix() {
        assert_eq!(image_key("small.gif", None), "posts/small.gif");
    }

    #[test]
    fn suffix_goes_before_extension() {
        assert_eq!(image_key("small.gif", Some("abc1234")), "posts/small_abc1234.gif");
        assert_eq!(image_key("README", Some("abc1234")), "posts/README_abc1234");
        assert_eq!(image_key(".hidden", Some("abc1234")), "posts/.hidden_abc1234");
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename("C:\\pics\\cat.png").as_deref(), Some("cat.png"));
        assert_eq!(sanitize_filename("my cat.png").as_deref(), Some("my_cat.png"));
    }

    #[test]
    fn sanitize_rejects_empty_names() {
        assert_eq!(sanitize_filename(""), None);
        assert_eq!(sanitize_filename("dir/"), None);
        assert_eq!(sanitize_filename(".."), None);
    }
}
