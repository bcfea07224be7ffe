//! Route reporting request counters.
use axum::{extract::State, routing::get, Json, Router};

use crate::{services::stats::StatsReport, state::AppState, utils::envelope::Envelope};

pub fn create_router() -> Router<AppState> {
    Router::new().route("/stats", get(report))
}

/// Show short stats about the running server.
async fn report(State(state): State<AppState>) -> Json<Envelope<StatsReport>> {
    Envelope::ok(state.stats.report())
}
