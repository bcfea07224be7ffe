//! Runtime configuration, loaded once at startup and immutable afterwards.
use std::collections::{BTreeMap, BTreeSet};
use std::env::var;
use std::path::PathBuf;

use config::{Environment, File, FileFormat};
use serde::Deserialize;

use crate::{
    constants::{api::ORIGINAL_SIZE, secrets::read_secret},
    services::paths::canonical_extension,
};

/// Environment variable prefix for overriding configuration values.
const ENV_PREFIX: &str = "IMAGESERVER";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// The full application configuration.
pub struct Config {
    /// Public domain name embedded in URI templates.
    pub domain: String,
    /// Root of the image storage tree.
    #[serde(rename = "imgdir")]
    pub image_dir: PathBuf,
    /// Socket address the HTTP server binds to.
    #[serde(rename = "listen")]
    pub listen_addr: String,
    /// Secret used to verify authentication tokens.
    pub secret: String,
    /// Secret used to sign upload result URIs. Falls back to `secret`.
    pub upload_secret: String,
    /// Enables the HTML upload form.
    pub debug: bool,
    /// Reject requests carrying an invalid token instead of ignoring the token.
    pub strict_tokens: bool,
    /// Extensions (with leading dot) which may be uploaded.
    pub uploadable: BTreeSet<String>,
    /// Extensions (with leading dot) which may be requested.
    pub readable: BTreeSet<String>,
    /// Size-class label to `[width, height]`.
    pub sizes: BTreeMap<String, [u32; 2]>,
}

impl Default for Config {
    fn default() -> Self {
        let extensions = |list: &[&str]| list.iter().map(|ext| (*ext).to_owned()).collect();
        Self {
            domain: String::new(),
            image_dir: PathBuf::from("images"),
            listen_addr: String::from("0.0.0.0:5000"),
            secret: String::new(),
            upload_secret: String::new(),
            debug: false,
            strict_tokens: true,
            uploadable: extensions(&[".jpg", ".jpeg", ".png"]),
            readable: extensions(&[".jpg", ".jpeg", ".png", ".webp"]),
            sizes: [
                (ORIGINAL_SIZE, [0, 0]),
                ("d", [16, 9]),
                ("xs", [64, 36]),
                ("sm", [384, 216]),
                ("md", [768, 432]),
                ("lg", [1280, 720]),
                ("xl", [1920, 1080]),
            ]
            .into_iter()
            .map(|(label, dimensions)| (label.to_owned(), dimensions))
            .collect(),
        }
    }
}

impl Config {
    /// Load the configuration from an optional YAML file, overridden by
    /// `IMAGESERVER_*` environment variables.
    pub fn load(path: &str) -> Result<Self, errors::ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(File::new(path, FileFormat::Yaml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("uploadable")
                    .with_list_parse_key("readable"),
            )
            .build()?
            .try_deserialize()?;
        config.finalise()
    }

    /// Resolve secrets, normalise extension sets and check required values.
    fn finalise(mut self) -> Result<Self, errors::ConfigError> {
        self.secret = resolve_secret(self.secret, "APP_SECRET")?;
        self.upload_secret = resolve_secret(self.upload_secret, "UPLOAD_SECRET")?;
        if self.upload_secret.is_empty() {
            self.upload_secret.clone_from(&self.secret);
        }
        self.uploadable = self.uploadable.iter().map(|ext| canonical_extension(ext)).collect();
        self.readable = self.readable.iter().map(|ext| canonical_extension(ext)).collect();
        if self.domain.is_empty() {
            return Err(errors::ConfigError::MissingDomain);
        }
        if self.secret.is_empty() {
            return Err(errors::ConfigError::MissingSecret);
        }
        if self.sizes.get(ORIGINAL_SIZE) != Some(&[0, 0]) {
            return Err(errors::ConfigError::MissingOriginalSize);
        }
        Ok(self)
    }
}

/// Use the configured value if set, otherwise the named environment variable,
/// otherwise the docker secret named by `{env_name}_DOCKER_SECRET`.
fn resolve_secret(configured: String, env_name: &str) -> Result<String, errors::ConfigError> {
    if !configured.is_empty() {
        return Ok(configured);
    }
    if let Ok(value) = var(env_name) {
        return Ok(value);
    }
    match var(format!("{env_name}_DOCKER_SECRET")) {
        Ok(secret_name) => Ok(read_secret(&secret_name)?),
        Err(_) => Ok(String::new()),
    }
}

pub mod errors {
    use thiserror::Error;

    use crate::constants::api::ORIGINAL_SIZE;

    #[derive(Debug, Error)]
    pub enum ConfigError {
        #[error(transparent)]
        Load(#[from] config::ConfigError),
        #[error("Failed to read docker secret: {0}")]
        Secret(#[from] std::io::Error),
        #[error("domain unspecified, can't continue")]
        MissingDomain,
        #[error("secret unspecified, can't continue")]
        MissingSecret,
        #[error("size table must map `{ORIGINAL_SIZE}` to [0, 0]")]
        MissingOriginalSize,
    }
}
