//! Intake of original images: validation, content addressing, persistence and signing.
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tokio::fs;

use crate::{
    constants::api::{MAX_UPLOAD_SIZE, ORIGINAL_SIZE},
    services::{
        files, media,
        paths::{canonical_extension, PathCodec},
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// What an uploader gets back. Nothing beyond the file itself is stored.
pub struct UploadResult {
    pub hash: String,
    pub ext: String,
    pub uri: String,
    pub mime: String,
    pub signature: String,
}

pub struct UploadIntake {
    paths: Arc<PathCodec>,
    uploadable: BTreeSet<String>,
    upload_key: Vec<u8>,
}

impl UploadIntake {
    pub fn new(paths: Arc<PathCodec>, uploadable: &BTreeSet<String>, upload_secret: &str) -> Self {
        Self {
            paths,
            uploadable: uploadable.iter().map(|ext| canonical_extension(ext)).collect(),
            upload_key: upload_secret.as_bytes().to_vec(),
        }
    }

    /// Validate and store an original, returning its signed URI template.
    pub async fn store(&self, bytes: &[u8]) -> Result<UploadResult, errors::UploadError> {
        if bytes.len() > MAX_UPLOAD_SIZE {
            return Err(errors::UploadError::TooLarge);
        }
        let sniffed = media::sniff(bytes)
            .filter(|sniffed| self.uploadable.contains(&sniffed.ext))
            .ok_or_else(|| errors::UploadError::Unsupported {
                mime: media::sniff_mime(bytes),
            })?;
        let hash = media::content_id(bytes);
        // The name is derived from the content, so replacing an existing
        // original swaps in identical bytes.
        files::persist(&self.paths.cache_path(ORIGINAL_SIZE, &hash, &sniffed.ext), bytes)
            .await
            .map_err(errors::UploadError::Persist)?;
        let uri = self.paths.uri_template(&hash);
        let signature = sign_uri(&uri, &self.upload_key);
        Ok(UploadResult {
            hash,
            ext: sniffed.ext,
            uri,
            mime: sniffed.mime,
            signature,
        })
    }

    /// Store a file which already lives on this host as if it had been uploaded.
    pub async fn store_local(&self, path: &Path) -> Result<UploadResult, errors::UploadError> {
        let metadata = fs::metadata(path)
            .await
            .map_err(errors::UploadError::Local)?;
        if metadata.len() > MAX_UPLOAD_SIZE as u64 {
            return Err(errors::UploadError::TooLarge);
        }
        let bytes = fs::read(path).await.map_err(errors::UploadError::Local)?;
        self.store(&bytes).await
    }
}

/// Hex encoded HMAC-SHA256 of a URI.
pub fn sign_uri(uri: &str, key: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("hmac can take key of any size");
    mac.update(uri.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub mod errors {
    use thiserror::Error;

    use crate::constants::api::MAX_UPLOAD_SIZE;

    #[derive(Debug, Error)]
    pub enum UploadError {
        #[error("File exceeds the allowed size of {MAX_UPLOAD_SIZE} bytes")]
        TooLarge,
        #[error("Unsupported file type: {mime}")]
        Unsupported { mime: String },
        #[error("Failed to read local file: {0}")]
        Local(#[source] std::io::Error),
        #[error("Failed to store image: {0}")]
        Persist(#[source] std::io::Error),
    }
}

#[cfg(test)]
mod tests {
    use super::errors::UploadError;
    use super::*;
    use crate::{
        config::Config,
        services::codec::{ImageCodec as _, RasterCodec},
    };
    use image::{DynamicImage, Rgb, RgbImage};
    use tempfile::{tempdir, TempDir};

    fn intake() -> (TempDir, UploadIntake) {
        let dir = tempdir().unwrap();
        let config = Config {
            domain: "media.example.com".to_owned(),
            image_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let paths = Arc::new(PathCodec::from_config(&config));
        paths.ensure_directories().unwrap();
        let intake = UploadIntake::new(paths, &config.uploadable, "upload-key");
        (dir, intake)
    }

    fn png() -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([1, 2, 3])));
        RasterCodec.encode(&image, ".png").unwrap()
    }

    fn originals(dir: &TempDir) -> Vec<std::path::PathBuf> {
        std::fs::read_dir(dir.path().join(ORIGINAL_SIZE))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[test]
    fn signature_is_hmac_sha256_hex() {
        assert_eq!(
            sign_uri("The quick brown fox jumps over the lazy dog", b"key"),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[tokio::test]
    async fn stores_original_without_extension() {
        let (dir, intake) = intake();
        let bytes = png();
        let result = intake.store(&bytes).await.unwrap();
        assert_eq!(result.hash, media::content_id(&bytes));
        assert_eq!(result.ext, ".png");
        assert_eq!(result.mime, "image/png");
        assert_eq!(
            result.uri,
            format!("//media.example.com/images/[size].{}.[ext]", result.hash)
        );
        assert_eq!(result.signature, sign_uri(&result.uri, b"upload-key"));
        let stored = dir.path().join(ORIGINAL_SIZE).join(&result.hash);
        assert_eq!(std::fs::read(stored).unwrap(), bytes);
    }

    #[tokio::test]
    async fn repeated_uploads_are_idempotent() {
        let (dir, intake) = intake();
        let bytes = png();
        let first = intake.store(&bytes).await.unwrap();
        let second = intake.store(&bytes).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(originals(&dir).len(), 1);
    }

    #[tokio::test]
    async fn readers_never_see_a_partial_original_during_reuploads() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let (dir, intake) = intake();
        let mut bytes = png();
        bytes.resize(4_000_000, 7);
        let result = intake.store(&bytes).await.unwrap();
        let stored = dir.path().join(ORIGINAL_SIZE).join(&result.hash);

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let done = Arc::clone(&done);
            let expected = bytes.len();
            std::thread::spawn(move || {
                let mut short_reads = 0_usize;
                while !done.load(Ordering::SeqCst) {
                    if std::fs::read(&stored).unwrap().len() != expected {
                        short_reads += 1;
                    }
                }
                short_reads
            })
        };
        for _ in 0..20 {
            assert_eq!(intake.store(&bytes).await.unwrap(), result);
        }
        done.store(true, Ordering::SeqCst);
        assert_eq!(reader.join().unwrap(), 0);
        assert_eq!(originals(&dir).len(), 1);
    }

    #[tokio::test]
    async fn unsupported_types_are_never_written() {
        let (dir, intake) = intake();
        let webp = RasterCodec
            .encode(&DynamicImage::ImageRgb8(RgbImage::new(4, 4)), ".webp")
            .unwrap();
        let err = intake.store(&webp).await.unwrap_err();
        assert!(matches!(err, UploadError::Unsupported { ref mime } if mime == "image/webp"));
        let err = intake.store(b"%PDF-1.4 not an image").await.unwrap_err();
        assert!(matches!(err, UploadError::Unsupported { ref mime } if mime == "application/pdf"));
        assert!(originals(&dir).is_empty());
    }

    #[tokio::test]
    async fn oversized_uploads_are_rejected() {
        let (dir, intake) = intake();
        let mut bytes = png();
        bytes.resize(MAX_UPLOAD_SIZE + 1, 0);
        assert!(matches!(intake.store(&bytes).await, Err(UploadError::TooLarge)));
        assert!(originals(&dir).is_empty());
    }

    #[tokio::test]
    async fn local_files_use_the_same_pipeline() {
        let (dir, intake) = intake();
        let source = dir.path().join("local.png");
        std::fs::write(&source, png()).unwrap();
        let local = intake.store_local(&source).await.unwrap();
        assert_eq!(local, intake.store(&png()).await.unwrap());

        let err = intake.store_local(&dir.path().join("missing.png")).await.unwrap_err();
        assert!(matches!(err, UploadError::Local(ref io) if io.kind() == std::io::ErrorKind::NotFound));
    }
}
