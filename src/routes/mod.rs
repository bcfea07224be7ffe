//! API routes within the application. Each module exposes a sub-router which is
//! merged into the main Axum router by [`create_app`].
pub mod images;
pub mod stats;
pub mod upload;

use axum::{http::StatusCode, middleware::from_fn_with_state, Router};
use tower_http::trace::TraceLayer;

use crate::{middleware::stats::record_errors, state::AppState, utils::httperror::HttpError};

/// Build the complete application router.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(images::create_router())
        .merge(upload::create_router(&state))
        .merge(stats::create_router())
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), record_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> HttpError {
    HttpError::new(StatusCode::NOT_FOUND, Some("Not found".to_owned()))
}
