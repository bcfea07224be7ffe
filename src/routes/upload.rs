//! Routes for uploading original images.
use std::path::Path;

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, Query, State,
    },
    http::{header, HeaderMap, Method, StatusCode},
    routing::{any, get},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    constants::api::{MAX_UPLOAD_SIZE, MULTIPART_OVERHEAD, UPLOAD_FIELD},
    middleware::guard_uploads,
    services::uploads::{errors::UploadError, UploadResult},
    state::AppState,
    utils::{envelope::Envelope, httperror::HttpError},
};

/// Create a router for routes under the upload service.
pub fn create_router(state: &AppState) -> Router<AppState> {
    let authenticated = Router::new()
        .route("/upload/image", any(upload_image))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE + MULTIPART_OVERHEAD));
    let unauthenticated = Router::new().route("/local/image", get(upload_local));
    unauthenticated.merge(guard_uploads(authenticated, state))
}

/// Store the file sent in the `upload` multipart field.
async fn upload_image(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<UploadResult>>, HttpError> {
    if method != Method::POST {
        return Err(StatusCode::METHOD_NOT_ALLOWED.into());
    }
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared.is_some_and(|length| length > MAX_UPLOAD_SIZE + MULTIPART_OVERHEAD) {
        return Err(UploadError::TooLarge.into());
    }
    let mut multipart = multipart.map_err(|rejection| {
        HttpError::new(StatusCode::BAD_REQUEST, Some(rejection.body_text()))
    })?;
    let bytes = read_upload_field(&mut multipart).await?;
    let result = state.uploads.store(&bytes).await?;
    state.stats.record_uploaded();
    info!(hash = %result.hash, mime = %result.mime, "image uploaded");
    Ok(Envelope::ok(result))
}

#[derive(Deserialize)]
struct LocalUploadParameters {
    name: Option<String>,
}

/// Store a file from this host's filesystem as if it had been uploaded.
async fn upload_local(
    State(state): State<AppState>,
    Query(params): Query<LocalUploadParameters>,
) -> Result<Json<Envelope<UploadResult>>, HttpError> {
    let name = params
        .name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            HttpError::new(
                StatusCode::BAD_REQUEST,
                Some("Url Param 'name' is missing".to_owned()),
            )
        })?;
    let result = state.uploads.store_local(Path::new(&name)).await?;
    state.stats.record_uploaded();
    info!(hash = %result.hash, source = %name, "local image imported");
    Ok(Envelope::ok(result))
}

async fn read_upload_field(multipart: &mut Multipart) -> Result<Bytes, HttpError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some(UPLOAD_FIELD) {
            return field.bytes().await.map_err(multipart_error);
        }
    }
    Err(HttpError::new(
        StatusCode::BAD_REQUEST,
        Some(format!("Missing `{UPLOAD_FIELD}` field")),
    ))
}

/// Body limit overruns surface as multipart errors; report them as [`UploadError::TooLarge`].
fn multipart_error(err: MultipartError) -> HttpError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return UploadError::TooLarge.into();
    }
    HttpError::new(err.status(), Some(err.body_text()))
}

impl From<UploadError> for HttpError {
    fn from(err: UploadError) -> Self {
        let status = match err {
            UploadError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Unsupported { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            UploadError::Local(ref io) if io.kind() == std::io::ErrorKind::NotFound => {
                StatusCode::NOT_FOUND
            }
            UploadError::Local(_) | UploadError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, Some(err.to_string()))
    }
}
