mod config;
mod constants;
mod middleware;
mod routes;
mod services;
mod state;
mod utils;

use anyhow::Context as _;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{config::Config, constants::api::CONFIG_PATH, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load(&CONFIG_PATH)
        .with_context(|| format!("failed to load configuration from {}", *CONFIG_PATH))?;
    info!(
        domain = %config.domain,
        image_dir = %config.image_dir.display(),
        sizes = ?config.sizes.keys().collect::<Vec<_>>(),
        debug = config.debug,
        "configuration loaded"
    );

    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(config).context("failed to prepare image directories")?;
    let app = routes::create_app(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    info!(%listen_addr, "image server listening");
    axum::serve(listener, app)
        .await
        .context("failed to run axum service")
}
