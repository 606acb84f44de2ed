use axum::extract::DefaultBodyLimit;
use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod extract;
mod handlers;
mod routes;

pub use auth::{AdminToken, AuthUser};
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    let upload_limit = state.upload_max_bytes;

    Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::feeds())
        .merge(routes::posts().layer(DefaultBodyLimit::max(upload_limit)))
        .merge(routes::social())
        .merge(routes::admin())
        .fallback(handlers::not_found)
        .with_state(state)
}
