//! Content sniffing and content addressing of image bytes.
use sha2::{Digest as _, Sha256};

use crate::{constants::api::SNIFF_LEN, services::paths::canonical_extension};

/// Reported when the leading bytes match no known signature.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq)]
/// The type detected from the leading bytes of a file.
pub struct SniffedType {
    pub mime: String,
    /// Canonical extension with a leading dot.
    pub ext: String,
}

/// Detect the file type from the first [`SNIFF_LEN`] bytes, ignoring any
/// client-supplied name or content type.
pub fn sniff(bytes: &[u8]) -> Option<SniffedType> {
    let head = bytes.get(..SNIFF_LEN).unwrap_or(bytes);
    infer::get(head).map(|kind| SniffedType {
        mime: kind.mime_type().to_owned(),
        ext: canonical_extension(kind.extension()),
    })
}

/// The sniffed MIME type, or [`UNKNOWN_MIME`].
pub fn sniff_mime(bytes: &[u8]) -> String {
    sniff(bytes).map_or_else(|| UNKNOWN_MIME.to_owned(), |sniffed| sniffed.mime)
}

/// The MIME type served for a canonical extension.
pub fn mime_for_extension(ext: &str) -> String {
    mime_guess::from_ext(ext.trim_start_matches('.'))
        .first_or_octet_stream()
        .to_string()
}

/// The content identifier of some bytes: a lowercase hex SHA-256 digest.
pub fn content_id(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let hash = hasher.finalize();
    format!("{hash:x}")
}
