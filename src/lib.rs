pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use anyhow::Result;

use crate::config::AppConfig;
use crate::infra::{cache::RedisCache, db::Db, storage::ObjectStorage};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: RedisCache,
    pub storage: ObjectStorage,
    pub admin_token: Option<String>,
    pub paseto_access_key: [u8; 32],
    pub paseto_refresh_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
    pub posts_per_page: i64,
    pub index_cache_ttl_seconds: u64,
    pub upload_max_bytes: usize,
}

impl AppState {
    /// Connects every backing store named in `config`.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let db = Db::connect(config).await?;
        let cache = RedisCache::connect(&config.redis_url).await?;
        let storage = ObjectStorage::new(config).await?;

        Ok(Self {
            db,
            cache,
            storage,
            admin_token: config.admin_token.clone(),
            paseto_access_key: config.paseto_access_key,
            paseto_refresh_key: config.paseto_refresh_key,
            access_ttl_minutes: config.access_ttl_minutes,
            refresh_ttl_days: config.refresh_ttl_days,
            posts_per_page: config.posts_per_page,
            index_cache_ttl_seconds: config.index_cache_ttl_seconds,
            upload_max_bytes: config.upload_max_bytes,
        })
    }
}
