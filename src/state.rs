//! Defines the state shared across the Axum application.
use std::sync::Arc;

use crate::{
    config::Config,
    middleware::token::TokenVerifier,
    services::{
        codec::{ImageCodec, RasterCodec},
        derivatives::DerivativeCache,
        paths::PathCodec,
        stats::Stats,
        uploads::UploadIntake,
    },
};

#[derive(Clone)]
/// The state struct shared across routers.
pub struct AppState {
    /// The configuration loaded at startup.
    pub config: Arc<Config>,
    /// Maps request names to storage locations.
    pub paths: Arc<PathCodec>,
    /// Serves and generates size derivatives.
    pub cache: DerivativeCache,
    /// Stores and signs uploaded originals.
    pub uploads: Arc<UploadIntake>,
    /// Verifies `x-token` headers.
    pub tokens: TokenVerifier,
    /// Request counters reported by `/stats`.
    pub stats: Arc<Stats>,
}

impl AppState {
    /// Build the state and create the storage directories.
    pub fn new(config: Config) -> std::io::Result<Self> {
        Self::with_codec(config, Arc::new(RasterCodec))
    }

    pub fn with_codec(config: Config, codec: Arc<dyn ImageCodec>) -> std::io::Result<Self> {
        let paths = Arc::new(PathCodec::from_config(&config));
        paths.ensure_directories()?;
        let uploads = UploadIntake::new(Arc::clone(&paths), &config.uploadable, &config.upload_secret);
        Ok(Self {
            cache: DerivativeCache::new(Arc::clone(&paths), codec),
            uploads: Arc::new(uploads),
            tokens: TokenVerifier::new(&config.secret, config.strict_tokens),
            stats: Arc::new(Stats::new()),
            paths,
            config: Arc::new(config),
        })
    }
}
