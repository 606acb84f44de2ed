//! Index Cache Tests
//!
//! The index page is served from cache for a short TTL, so new posts only
//! appear once the entry expires or the cache is cleared.

mod common;

use axum::http::StatusCode;
use common::app;

#[tokio::test]
async fn index_is_stale_until_cache_is_cleared() {
    let app = app().await;
    let author = app.create_user("cache_author").await;
    app.create_post(&author, "already there", None).await;

    let first = app.get("/", None).await;
    assert_eq!(first.status, StatusCode::OK);

    app.create_post(&author, "cached away", None).await;

    let second = app.get("/", None).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(first.bytes(), second.bytes());
    assert_ne!(second.json()["items"][0]["text"], "cached away");

    let resp = app
        .post_admin("/admin/cache/clear/", serde_json::json!({}), Some(app.admin_token()))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.json()["removed"].as_u64().unwrap() >= 1);

    let third = app.get("/", None).await;
    assert_ne!(first.bytes(), third.bytes());
    assert!(third.json()["count"].as_i64() > first.json()["count"].as_i64());
}

#[tokio::test]
async fn pages_are_cached_separately() {
    let app = app().await;
    let author = app.create_user("cache_pages").await;
    app.create_posts(&author, 11, None).await;

    let page_one = app.get("/?page=1", None).await;
    let page_two = app.get("/?page=2", None).await;
    assert_eq!(page_one.json()["number"], 1);
    assert_eq!(page_two.json()["number"], 2);
    assert_ne!(page_one.bytes(), page_two.bytes());
}

#[tokio::test]
async fn clearing_cache_requires_admin_token() {
    let app = app().await;

    let resp = app
        .post_admin("/admin/cache/clear/", serde_json::json!({}), None)
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}
