use axum::{routing::delete, routing::get, routing::post, Router};

use crate::AppState;
use crate::http::handlers;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/signup/", post(handlers::signup))
        .route(
            "/auth/login/",
            get(handlers::login_page).post(handlers::login),
        )
        .route("/auth/refresh/", post(handlers::refresh_token))
        .route("/auth/logout/", post(handlers::logout))
}

pub fn feeds() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::index))
        .route("/group/:slug/", get(handlers::group_posts))
        .route("/profile/:username/", get(handlers::profile))
        .route("/follow/", get(handlers::follow_index))
}

/// Routes that accept post bodies, possibly carrying an image.
pub fn posts() -> Router<AppState> {
    Router::new()
        .route(
            "/create/",
            get(handlers::post_create_form).post(handlers::post_create),
        )
        .route("/posts/:id/", get(handlers::post_detail))
        .route(
            "/posts/:id/edit/",
            get(handlers::post_edit_form).post(handlers::post_edit),
        )
        .route("/post/:id/comment/", post(handlers::add_comment))
}

pub fn social() -> Router<AppState> {
    Router::new()
        .route("/profile/:username/follow/", get(handlers::profile_follow))
        .route(
            "/profile/:username/unfollow/",
            get(handlers::profile_unfollow),
        )
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route("/admin/groups/", post(handlers::create_group))
        .route("/admin/groups/:slug/", delete(handlers::delete_group))
        .route("/admin/cache/clear/", post(handlers::clear_cache))
}
