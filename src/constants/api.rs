//! Constants related to the general configuration of the image API and its deployment.

use std::{env::var, sync::LazyLock};

/// Path of the YAML configuration file read at startup.
pub static CONFIG_PATH: LazyLock<String> =
    LazyLock::new(|| var("IMAGESERVER_CONFIG").unwrap_or_else(|_| String::from("config.yml")));

/// The size-class label reserved for originals, which are never resized.
pub const ORIGINAL_SIZE: &str = "o";

/// Content identifiers shorter than this are rejected as forged.
pub const MIN_CONTENT_ID_LEN: usize = 5;

/// The largest accepted upload payload, in bytes.
pub const MAX_UPLOAD_SIZE: usize = 8_000_000;

/// Allowance for multipart framing on top of [`MAX_UPLOAD_SIZE`].
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// How many leading bytes are inspected when sniffing a MIME type.
pub const SNIFF_LEN: usize = 512;

/// The request header carrying an authentication token.
pub const TOKEN_HEADER: &str = "x-token";

/// The multipart field which holds the uploaded file.
pub const UPLOAD_FIELD: &str = "upload";

/// Served instead of the upload handler for non-POST requests in debug mode.
pub const UPLOAD_FORM: &str = r#"<form action="/upload/image" method="POST" enctype="multipart/form-data"> <input type="file" name="upload"> <input type="submit" value="Upload"></form>"#;
