//! Routes which serve originals and their size derivatives.
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse as _, Response},
    routing::get,
    Router,
};
use tokio::fs;

use crate::{
    services::{derivatives::errors::CacheError, paths},
    state::AppState,
    utils::httperror::HttpError,
};

/// Create a router for image retrieval.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/images/{name}", get(serve_image))
        .route("/urifromhash/{hash}", get(uri_from_hash))
}

/// Serve `{size}.{content_id}.{ext}`, generating the derivative if needed.
async fn serve_image(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, HttpError> {
    let image = state.cache.fetch(&name).await?;
    state.stats.record_served();
    Ok(([(header::CONTENT_TYPE, image.mime)], image.bytes).into_response())
}

/// Return the URI template of a stored original as plain text.
async fn uri_from_hash(State(state): State<AppState>, Path(hash): Path<String>) -> Response {
    let exists = paths::is_content_id(&hash)
        && fs::metadata(state.paths.original_path(&hash))
            .await
            .is_ok_and(|metadata| metadata.is_file());
    if !exists {
        return (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain")],
            "Image not found",
        )
            .into_response();
    }
    (
        [(header::CONTENT_TYPE, "text/plain")],
        state.paths.uri_template(&hash),
    )
        .into_response()
}

impl From<CacheError> for HttpError {
    fn from(err: CacheError) -> Self {
        let status = match err {
            CacheError::Path(_) | CacheError::OriginalNotFound => StatusCode::NOT_FOUND,
            CacheError::Io(_)
            | CacheError::Decode(_)
            | CacheError::Resize(_)
            | CacheError::Encode(_)
            | CacheError::Write(_)
            | CacheError::Reopen(_)
            | CacheError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, Some(err.to_string()))
    }
}
