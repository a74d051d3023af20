//! Image file decoding.
//!
//! Supported containers:
//! - PNG: every color type the `image` crate reads; palette images without
//!   a `tRNS` chunk get index 0 keyed out when loaded as transparent
//! - BMP: 8-bit palette, uncompressed, top-down or bottom-up
//! - XYZ: `XYZ1` header followed by a zlib stream holding a 256-entry RGB
//!   palette and the index data
//!
//! Decoders produce tightly packed RGBA which [`Bitmap::from_rgba`] converts
//! into the render context's format.

mod bmp;
mod png;
mod xyz;

use std::path::Path;

use thiserror::Error;

use crate::graphics::bitmap::{Bitmap, BitmapError, Result};
use crate::graphics::render_context::RenderContext;

/// Malformed or unsupported image data.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unrecognized image format")]
    UnknownFormat,

    #[error("bad {0} signature")]
    BadMagic(&'static str),

    #[error("truncated image data: need {expected} bytes, have {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("unsupported bit depth {0}")]
    UnsupportedBitDepth(u16),

    #[error("unsupported compression {0}")]
    UnsupportedCompression(u32),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("palette image has no PLTE chunk")]
    MissingPalette,

    #[error("zlib stream is corrupt: {0}")]
    Inflate(String),

    #[error("png: {0}")]
    Png(String),

    #[error("pixel data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Container detected from the leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Bmp,
    Xyz,
}

impl ImageKind {
    pub fn detect(bytes: &[u8]) -> Option<ImageKind> {
        if bytes.starts_with(png::SIGNATURE) {
            Some(ImageKind::Png)
        } else if bytes.starts_with(b"BM") {
            Some(ImageKind::Bmp)
        } else if bytes.starts_with(xyz::MAGIC) {
            Some(ImageKind::Xyz)
        } else {
            None
        }
    }
}

/// Decoded image as tightly packed `R, G, B, A` rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Decode any supported container.
///
/// With `transparent == false` every pixel comes out opaque.
pub fn decode(bytes: &[u8], transparent: bool) -> std::result::Result<DecodedImage, DecodeError> {
    let kind = ImageKind::detect(bytes).ok_or(DecodeError::UnknownFormat)?;
    log::debug!("decoding {:?} image ({} bytes)", kind, bytes.len());
    match kind {
        ImageKind::Png => png::decode(bytes, transparent),
        ImageKind::Bmp => bmp::decode(bytes, transparent),
        ImageKind::Xyz => xyz::decode(bytes, transparent),
    }
}

/// Expand palette indices to RGBA; index 0 becomes transparent when requested.
///
/// Indices past the end of the palette read as black.
fn expand_indexed(palette: &[[u8; 3]], indices: &[u8], transparent: bool) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(indices.len() * 4);
    for &index in indices {
        let [r, g, b] = palette.get(index as usize).copied().unwrap_or([0, 0, 0]);
        let a = if transparent && index == 0 { 0 } else { 255 };
        rgba.extend_from_slice(&[r, g, b, a]);
    }
    rgba
}

impl Bitmap {
    /// Decode an in-memory image into the context's pixel format.
    pub fn from_image_bytes(ctx: &RenderContext, bytes: &[u8], transparent: bool) -> Result<Bitmap> {
        let image = decode(bytes, transparent)?;
        let (width, height) = match (i32::try_from(image.width), i32::try_from(image.height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(BitmapError::InvalidDimensions {
                    width: i32::MAX,
                    height: i32::MAX,
                })
            }
        };
        Bitmap::from_rgba(ctx.format(), width, height, &image.rgba)
    }

    /// Read and decode an image file.
    pub fn load(ctx: &RenderContext, path: impl AsRef<Path>, transparent: bool) -> Result<Bitmap> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| BitmapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bitmap = Bitmap::from_image_bytes(ctx, &bytes, transparent)?;
        log::debug!(
            "loaded {} ({}x{})",
            path.display(),
            bitmap.width(),
            bitmap.height()
        );
        Ok(bitmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(ImageKind::detect(b"\x89PNG\r\n\x1a\n...."), Some(ImageKind::Png));
        assert_eq!(ImageKind::detect(b"BM......"), Some(ImageKind::Bmp));
        assert_eq!(ImageKind::detect(b"XYZ1...."), Some(ImageKind::Xyz));
        assert_eq!(ImageKind::detect(b"GIF89a"), None);
    }

    #[test]
    fn test_unknown_format() {
        assert!(matches!(decode(b"nope", true), Err(DecodeError::UnknownFormat)));
    }

    #[test]
    fn test_expand_indexed() {
        let palette = [[1, 2, 3], [4, 5, 6]];
        assert_eq!(
            expand_indexed(&palette, &[0, 1, 9], true),
            vec![1, 2, 3, 0, 4, 5, 6, 255, 0, 0, 0, 255]
        );
        assert_eq!(expand_indexed(&palette, &[0], false), vec![1, 2, 3, 255]);
    }

    #[test]
    fn test_load_missing_file() {
        let ctx = RenderContext::default();
        let err = Bitmap::load(&ctx, "/nonexistent/picture.png", true).unwrap_err();
        assert!(matches!(err, BitmapError::Io { .. }));
    }
}
