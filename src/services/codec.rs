//! Decoding, resizing and encoding of raster images.
//!
//! The derivative cache only talks to [`ImageCodec`], so tests can count or fail
//! individual steps without touching the `image` crate.
use std::borrow::Cow;
use std::io::Cursor;

use image::{imageops::FilterType, DynamicImage, ImageFormat};

pub trait ImageCodec: Send + Sync {
    /// Decode encoded bytes of any supported format.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, errors::CodecError>;
    /// Scale to `width`, deriving the height from the aspect ratio. A zero width keeps the image as is.
    fn resize(&self, image: DynamicImage, width: u32) -> Result<DynamicImage, errors::CodecError>;
    /// Encode into the format named by a canonical extension such as `.png`.
    fn encode(&self, image: &DynamicImage, ext: &str) -> Result<Vec<u8>, errors::CodecError>;
}

#[derive(Debug, Clone, Copy, Default)]
/// The default codec, backed by the `image` crate with Lanczos resampling.
pub struct RasterCodec;

impl ImageCodec for RasterCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, errors::CodecError> {
        Ok(image::load_from_memory(bytes)?)
    }

    fn resize(&self, image: DynamicImage, width: u32) -> Result<DynamicImage, errors::CodecError> {
        if width == 0 {
            return Ok(image);
        }
        let height = proportional_height(image.width(), image.height(), width)?;
        Ok(image.resize_exact(width, height, FilterType::Lanczos3))
    }

    fn encode(&self, image: &DynamicImage, ext: &str) -> Result<Vec<u8>, errors::CodecError> {
        let format = ImageFormat::from_extension(ext.trim_start_matches('.'))
            .ok_or_else(|| errors::CodecError::UnsupportedFormat(ext.to_owned()))?;
        let mut bytes = Vec::new();
        encodable(image, format).write_to(&mut Cursor::new(&mut bytes), format)?;
        Ok(bytes)
    }
}

/// The height which keeps the aspect ratio of `src_width x src_height` at `width`.
fn proportional_height(src_width: u32, src_height: u32, width: u32) -> Result<u32, errors::CodecError> {
    if src_width == 0 || src_height == 0 {
        return Err(errors::CodecError::Dimensions {
            width: src_width,
            height: src_height,
        });
    }
    let scaled = (u64::from(src_height) * u64::from(width) + u64::from(src_width) / 2)
        / u64::from(src_width);
    u32::try_from(scaled.max(1)).map_err(|_err| errors::CodecError::Dimensions {
        width,
        height: u32::MAX,
    })
}

/// Convert to a pixel layout the target encoder accepts. JPEG has no alpha channel
/// and WebP/GIF only take 8-bit colour.
fn encodable(image: &DynamicImage, format: ImageFormat) -> Cow<'_, DynamicImage> {
    match (format, image) {
        (ImageFormat::Jpeg, DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_))
        | (ImageFormat::WebP, DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_))
        | (ImageFormat::Gif, DynamicImage::ImageRgba8(_))
        | (ImageFormat::Png, _) => Cow::Borrowed(image),
        (ImageFormat::Jpeg, _) => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
        _ => Cow::Owned(DynamicImage::ImageRgba8(image.to_rgba8())),
    }
}

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum CodecError {
        #[error(transparent)]
        Image(#[from] image::ImageError),
        #[error("no encoder for extension {0}")]
        UnsupportedFormat(String),
        #[error("invalid image dimensions {width}x{height}")]
        Dimensions { width: u32, height: u32 },
    }
}
