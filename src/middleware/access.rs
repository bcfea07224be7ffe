//! Middleware which only lets authenticated requests through.
use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use tracing::debug;

use crate::{middleware::token::Claims, utils::httperror::HttpError};

/// Reject requests which the token parser did not attach claims to.
pub async fn access_check(req: Request, next: Next) -> Result<Response, HttpError> {
    let Some(claims) = req.extensions().get::<Claims>() else {
        return Err(HttpError::new(
            StatusCode::UNAUTHORIZED,
            Some("Authentication required".to_owned()),
        ));
    };
    // TODO: check individual claims (e.g. `uid`) once an authorization policy is defined.
    debug!(claims = ?claims.0.keys().collect::<Vec<_>>(), "request authenticated");
    Ok(next.run(req).await)
}
