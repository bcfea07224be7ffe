//! Debug-only middleware which serves a bare upload form.
use axum::{
    extract::Request,
    http::Method,
    middleware::Next,
    response::{Html, IntoResponse as _, Response},
};

use crate::constants::api::UPLOAD_FORM;

/// Render the upload form for anything but a POST.
pub async fn upload_form(req: Request, next: Next) -> Response {
    if req.method() != Method::POST {
        return Html(UPLOAD_FORM).into_response();
    }
    next.run(req).await
}
