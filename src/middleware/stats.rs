//! Middleware which counts error responses.
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

/// Record every 4xx/5xx response by status code, whichever layer produced it.
pub async fn record_errors(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        state.stats.record_error(status.as_u16());
    }
    response
}
