//! Middleware for cross-cutting request concerns.
//!
//! Every gate either forwards the request (`next.run`) or halts the chain by
//! returning an error response. No gate resumes the chain after halting.
pub mod access;
pub mod form;
pub mod stats;
pub mod token;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};

use crate::state::AppState;

/// Wrap upload routes in the authentication chain.
///
/// Layers are LIFO: the last one attached sees the request first. Requests pass
/// through the token parser, then the access check, then (in debug mode) the
/// upload form, and only then reach the handler.
pub fn guard_uploads(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    let router = if state.config.debug {
        router.layer(from_fn(form::upload_form))
    } else {
        router
    };
    router
        .layer(from_fn(access::access_check))
        .layer(from_fn_with_state(state.clone(), token::token_parser))
}
