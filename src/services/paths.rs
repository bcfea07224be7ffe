//! The addressing scheme shared by uploads and the derivative cache.
//!
//! Public request names take the form `{size}.{content_id}.{ext}`. On disk, every
//! size class has its own directory under the storage root. Originals are stored
//! without an extension, derivatives with one.
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use tracing::info;

use crate::{
    config::Config,
    constants::api::{MIN_CONTENT_ID_LEN, ORIGINAL_SIZE},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Target dimensions for a size class. `0x0` means the original is passed through.
pub struct SizeClass {
    /// The width derivatives are scaled to. Zero keeps the original.
    pub width: u32,
    /// Nominal height from the size table. Informational only: derivatives keep
    /// the aspect ratio of their original, so only `width` drives resizing.
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A decoded request name.
pub struct ImageKey {
    /// The size-class label.
    pub size: String,
    /// The content identifier of the original.
    pub content_id: String,
    /// The canonical extension, including the leading dot.
    pub ext: String,
}

impl ImageKey {
    /// Whether the original itself was requested.
    pub fn is_original(&self) -> bool {
        self.size == ORIGINAL_SIZE
    }
}

#[derive(Debug, Clone)]
pub struct PathCodec {
    root: PathBuf,
    domain: String,
    sizes: BTreeMap<String, SizeClass>,
    readable: BTreeSet<String>,
}

impl PathCodec {
    pub fn new(
        root: PathBuf,
        domain: String,
        sizes: &BTreeMap<String, [u32; 2]>,
        readable: &BTreeSet<String>,
    ) -> Self {
        Self {
            root,
            domain,
            sizes: sizes
                .iter()
                .map(|(label, &[width, height])| (label.clone(), SizeClass { width, height }))
                .collect(),
            readable: readable.iter().map(|ext| canonical_extension(ext)).collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.image_dir.clone(),
            config.domain.clone(),
            &config.sizes,
            &config.readable,
        )
    }

    /// Split a request name into its size class, content id and extension.
    pub fn decode(&self, name: &str) -> Result<ImageKey, errors::PathError> {
        let parts: Vec<&str> = name.split('.').collect();
        let [size, content_id, ext] = parts.as_slice() else {
            return Err(errors::PathError::BadName);
        };
        let ext = canonical_extension(ext);
        if !self.readable.contains(&ext) {
            return Err(errors::PathError::BadExtension(ext));
        }
        if !is_content_id(content_id) {
            return Err(errors::PathError::BadContentId);
        }
        if !self.sizes.contains_key(*size) {
            return Err(errors::PathError::BadSize((*size).to_owned()));
        }
        Ok(ImageKey {
            size: (*size).to_owned(),
            content_id: (*content_id).to_owned(),
            ext,
        })
    }

    pub fn size(&self, label: &str) -> Option<SizeClass> {
        self.sizes.get(label).copied()
    }

    /// Where the given cache entry lives on disk.
    pub fn cache_path(&self, size: &str, content_id: &str, ext: &str) -> PathBuf {
        let dir = self.root.join(size);
        if size == ORIGINAL_SIZE {
            // Originals are content-sniffed on read, so they carry no extension.
            dir.join(content_id)
        } else {
            dir.join(format!("{content_id}{ext}"))
        }
    }

    pub fn original_path(&self, content_id: &str) -> PathBuf {
        self.cache_path(ORIGINAL_SIZE, content_id, "")
    }

    /// The public URI template for an original. `[size]` and `[ext]` are filled in by clients.
    pub fn uri_template(&self, content_id: &str) -> String {
        format!("//{}/images/[size].{content_id}.[ext]", self.domain)
    }

    /// Create one directory per size class under the storage root.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for size in self.sizes.keys() {
            let dir = self.root.join(size);
            if !dir.is_dir() {
                std::fs::create_dir_all(&dir)?;
                info!(dir = %dir.display(), "directory created");
            }
        }
        Ok(())
    }
}

/// Whether a candidate could name an original: long enough and free of path syntax.
pub fn is_content_id(candidate: &str) -> bool {
    candidate.len() >= MIN_CONTENT_ID_LEN && candidate.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Lower-case an extension, ensure a leading dot and fold JPEG aliases into `.jpg`.
pub fn canonical_extension(ext: &str) -> String {
    let ext = ext.to_ascii_lowercase();
    let ext = if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    };
    match ext.as_str() {
        ".jpeg" | ".jpe" => ".jpg".to_owned(),
        _ => ext,
    }
}

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error, PartialEq, Eq)]
    pub enum PathError {
        #[error("bad name")]
        BadName,
        #[error("bad image type requested: {0}")]
        BadExtension(String),
        #[error("bad image name requested")]
        BadContentId,
        #[error("bad image size requested: {0}")]
        BadSize(String),
    }
}

#[cfg(test)]
mod tests {
    use super::errors::PathError;
    use super::*;

    const HASH: &str = "9f86d081884c7d659a2feaa0c55ad015";

    fn codec() -> PathCodec {
        let config = Config {
            domain: "media.example.com".to_owned(),
            image_dir: PathBuf::from("/srv/images"),
            ..Config::default()
        };
        PathCodec::from_config(&config)
    }

    #[test]
    fn decodes_valid_names() {
        let key = codec().decode(&format!("sm.{HASH}.png")).unwrap();
        assert_eq!(
            key,
            ImageKey {
                size: "sm".to_owned(),
                content_id: HASH.to_owned(),
                ext: ".png".to_owned(),
            }
        );
        assert!(!key.is_original());
        assert!(codec().decode(&format!("o.{HASH}.webp")).unwrap().is_original());
    }

    #[test]
    fn jpeg_aliases_become_jpg() {
        for alias in ["jpeg", "jpe", "JPG", "Jpeg"] {
            let key = codec().decode(&format!("md.{HASH}.{alias}")).unwrap();
            assert_eq!(key.ext, ".jpg", "alias {alias}");
        }
    }

    #[test]
    fn rejects_wrong_component_count() {
        let names = [
            String::new(),
            "sm".to_owned(),
            format!("sm.{HASH}"),
            format!("sm.{HASH}.png.png"),
            "...".to_owned(),
        ];
        for name in names {
            assert_eq!(codec().decode(&name), Err(PathError::BadName), "name {name:?}");
        }
    }

    #[test]
    fn rejects_unreadable_extension() {
        assert_eq!(
            codec().decode(&format!("sm.{HASH}.gif")),
            Err(PathError::BadExtension(".gif".to_owned()))
        );
    }

    #[test]
    fn rejects_short_or_forged_ids() {
        assert_eq!(codec().decode("sm.abcd.png"), Err(PathError::BadContentId));
        assert_eq!(codec().decode("sm.ab-cd_ef.png"), Err(PathError::BadContentId));
    }

    #[test]
    fn unknown_size_is_a_path_error() {
        assert_eq!(
            codec().decode(&format!("huge.{HASH}.png")),
            Err(PathError::BadSize("huge".to_owned()))
        );
    }

    #[test]
    fn size_table_entries_are_looked_up_by_label() {
        let codec = codec();
        assert_eq!(codec.size("sm"), Some(SizeClass { width: 384, height: 216 }));
        assert_eq!(codec.size(ORIGINAL_SIZE), Some(SizeClass { width: 0, height: 0 }));
        assert_eq!(codec.size("huge"), None);
    }

    #[test]
    fn originals_are_stored_without_extension() {
        let codec = codec();
        assert_eq!(
            codec.cache_path(ORIGINAL_SIZE, HASH, ".png"),
            PathBuf::from(format!("/srv/images/o/{HASH}"))
        );
        assert_eq!(
            codec.cache_path("sm", HASH, ".png"),
            PathBuf::from(format!("/srv/images/sm/{HASH}.png"))
        );
        assert_eq!(codec.original_path(HASH), codec.cache_path(ORIGINAL_SIZE, HASH, ".jpg"));
    }

    #[test]
    fn uri_template_keeps_placeholders() {
        assert_eq!(
            codec().uri_template(HASH),
            format!("//media.example.com/images/[size].{HASH}.[ext]")
        );
    }

    #[test]
    fn creates_size_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            image_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        PathCodec::from_config(&config).ensure_directories().unwrap();
        for size in config.sizes.keys() {
            assert!(dir.path().join(size).is_dir());
        }
    }
}
