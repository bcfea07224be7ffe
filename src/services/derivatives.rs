//! The on-demand derivative cache.
//!
//! A request for `{size}.{id}.{ext}` is served from `root/{size}/{id}{ext}` if present.
//! Otherwise the original is resized and re-encoded, written to that location,
//! and served from there. Originals are only ever written by uploads.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::{
    fs,
    sync::{Mutex, OwnedMutexGuard},
    task,
};
use tracing::{debug, info};

use crate::services::{
    codec::ImageCodec,
    files::{persist, read_optional},
    media,
    paths::{errors::PathError, ImageKey, PathCodec, SizeClass},
};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Bytes ready to be served.
pub struct CachedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

#[derive(Clone)]
pub struct DerivativeCache {
    paths: Arc<PathCodec>,
    codec: Arc<dyn ImageCodec>,
    locks: GenerationLocks,
}

impl DerivativeCache {
    pub fn new(paths: Arc<PathCodec>, codec: Arc<dyn ImageCodec>) -> Self {
        Self {
            paths,
            codec,
            locks: GenerationLocks::default(),
        }
    }

    /// Serve the image named by a request path, generating the derivative on a miss.
    pub async fn fetch(&self, name: &str) -> Result<CachedImage, errors::CacheError> {
        let key = self.paths.decode(name)?;
        let path = self.paths.cache_path(&key.size, &key.content_id, &key.ext);
        if key.is_original() {
            let bytes = read_optional(&path)
                .await
                .map_err(errors::CacheError::Io)?
                .ok_or(errors::CacheError::OriginalNotFound)?;
            // Originals have no extension to go by.
            let mime = media::sniff_mime(&bytes);
            return Ok(CachedImage { bytes, mime });
        }
        let bytes = match read_optional(&path).await.map_err(errors::CacheError::Io)? {
            Some(bytes) => bytes,
            None => self.generate(&key, &path).await?,
        };
        Ok(CachedImage {
            bytes,
            mime: media::mime_for_extension(&key.ext),
        })
    }

    async fn generate(&self, key: &ImageKey, path: &Path) -> Result<Vec<u8>, errors::CacheError> {
        let _guard = self.locks.acquire(path).await;
        // Another request may have generated it while this one waited for the lock.
        if let Some(bytes) = read_optional(path).await.map_err(errors::CacheError::Io)? {
            debug!(path = %path.display(), "derivative generated by concurrent request");
            return Ok(bytes);
        }
        let size = self
            .paths
            .size(&key.size)
            .ok_or_else(|| PathError::BadSize(key.size.clone()))?;
        let original = read_optional(&self.paths.original_path(&key.content_id))
            .await
            .map_err(errors::CacheError::Io)?
            .ok_or(errors::CacheError::OriginalNotFound)?;

        let codec = Arc::clone(&self.codec);
        let ext = key.ext.clone();
        let encoded = task::spawn_blocking(move || render(codec.as_ref(), &original, size, &ext))
            .await??;

        persist(path, &encoded)
            .await
            .map_err(errors::CacheError::Write)?;
        info!(
            path = %path.display(),
            size = %key.size,
            bytes = encoded.len(),
            "derivative cached"
        );
        fs::read(path).await.map_err(errors::CacheError::Reopen)
    }
}

/// Decode the original, scale it to the size class and encode it for `ext`.
fn render(
    codec: &dyn ImageCodec,
    original: &[u8],
    size: SizeClass,
    ext: &str,
) -> Result<Vec<u8>, errors::CacheError> {
    let image = codec.decode(original).map_err(errors::CacheError::Decode)?;
    let image = codec
        .resize(image, size.width)
        .map_err(errors::CacheError::Resize)?;
    codec.encode(&image, ext).map_err(errors::CacheError::Encode)
}

/// One async mutex per cache path that is currently being generated.
#[derive(Clone, Default)]
struct GenerationLocks {
    inner: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl GenerationLocks {
    async fn acquire(&self, path: &Path) -> GenerationGuard {
        let lock = self.inner.entry(path.to_path_buf()).or_default().clone();
        let guard = lock.lock_owned().await;
        GenerationGuard {
            key: path.to_path_buf(),
            guard: Some(guard),
            inner: Arc::clone(&self.inner),
        }
    }
}

struct GenerationGuard {
    key: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
    inner: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map still holds the lock once nobody is waiting on it.
        self.inner
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub mod errors {
    use thiserror::Error;

    use crate::services::{codec::errors::CodecError, paths::errors::PathError};

    #[derive(Debug, Error)]
    pub enum CacheError {
        #[error(transparent)]
        Path(#[from] PathError),
        #[error("Image not found")]
        OriginalNotFound,
        #[error("Failed to open image: {0}")]
        Io(#[source] std::io::Error),
        #[error("Failed to decode original image: {0}")]
        Decode(#[source] CodecError),
        #[error("Failed to resize image: {0}")]
        Resize(#[source] CodecError),
        #[error("Failed to encode image: {0}")]
        Encode(#[source] CodecError),
        #[error("Failed to write image: {0}")]
        Write(#[source] std::io::Error),
        #[error("Failed to reopen image: {0}")]
        Reopen(#[source] std::io::Error),
        #[error("Image generation task failed: {0}")]
        Task(#[from] tokio::task::JoinError),
    }
}
