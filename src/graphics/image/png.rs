//! PNG decoding via the `image` crate.
//!
//! Palette images loaded as transparent use index 0 as the color key unless
//! the file carries its own `tRNS` chunk. The key is applied by splicing a
//! one-entry `tRNS` chunk after `PLTE` before handing the stream to the
//! decoder.

use std::borrow::Cow;

use ::image::ImageFormat;

use super::{DecodeError, DecodedImage};

pub(super) const SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const COLOR_TYPE_PALETTE: u8 = 3;

/// One chunk: its type, where its data begins and where the chunk ends.
struct Chunk {
    end: usize,
    kind: [u8; 4],
    data_start: usize,
}

fn chunks(bytes: &[u8]) -> Result<Vec<Chunk>, DecodeError> {
    let mut out = Vec::new();
    let mut pos = SIGNATURE.len();
    while pos < bytes.len() {
        let header = bytes.get(pos..pos + 8).ok_or(DecodeError::Truncated {
            expected: pos + 8,
            actual: bytes.len(),
        })?;
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let kind = [header[4], header[5], header[6], header[7]];
        let end = pos + 12 + len;
        if end > bytes.len() {
            return Err(DecodeError::Truncated {
                expected: end,
                actual: bytes.len(),
            });
        }
        out.push(Chunk {
            end,
            kind,
            data_start: pos + 8,
        });
        pos = end;
        if &kind == b"IEND" {
            break;
        }
    }
    Ok(out)
}

fn trns_chunk() -> Vec<u8> {
    let body = [b't', b'R', b'N', b'S', 0];
    let mut chunk = 1u32.to_be_bytes().to_vec();
    chunk.extend_from_slice(&body);
    chunk.extend_from_slice(&crc32fast::hash(&body).to_be_bytes());
    chunk
}

/// Return the stream with index 0 keyed out, or the input unchanged when no
/// key is needed.
fn with_index0_key(bytes: &[u8]) -> Result<Cow<'_, [u8]>, DecodeError> {
    let chunks = chunks(bytes)?;
    let ihdr = chunks
        .first()
        .filter(|c| &c.kind == b"IHDR" && c.end - c.data_start >= 17)
        .ok_or_else(|| DecodeError::InvalidHeader("first chunk is not IHDR".into()))?;
    if bytes[ihdr.data_start + 9] != COLOR_TYPE_PALETTE {
        return Ok(Cow::Borrowed(bytes));
    }
    if chunks.iter().any(|c| &c.kind == b"tRNS") {
        return Ok(Cow::Borrowed(bytes));
    }
    let plte = chunks
        .iter()
        .find(|c| &c.kind == b"PLTE")
        .ok_or(DecodeError::MissingPalette)?;

    log::debug!("palette png without tRNS, keying index 0");
    let mut out = Vec::with_capacity(bytes.len() + 13);
    out.extend_from_slice(&bytes[..plte.end]);
    out.extend_from_slice(&trns_chunk());
    out.extend_from_slice(&bytes[plte.end..]);
    Ok(Cow::Owned(out))
}

pub(super) fn decode(bytes: &[u8], transparent: bool) -> Result<DecodedImage, DecodeError> {
    if !bytes.starts_with(SIGNATURE) {
        return Err(DecodeError::BadMagic("PNG"));
    }
    let stream = if transparent {
        with_index0_key(bytes)?
    } else {
        Cow::Borrowed(bytes)
    };

    let image = ::image::load_from_memory_with_format(&stream, ImageFormat::Png)
        .map_err(|err| DecodeError::Png(err.to_string()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    let mut rgba = image.into_raw();
    if !transparent {
        for px in rgba.chunks_exact_mut(4) {
            px[3] = 255;
        }
    }
    Ok(DecodedImage {
        width,
        height,
        rgba,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut body = kind.to_vec();
        body.extend_from_slice(data);
        let mut out = (data.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(&body);
        out.extend_from_slice(&crc32fast::hash(&body).to_be_bytes());
        out
    }

    /// 2x1 palette PNG: pixel 0 uses index 0 (red), pixel 1 index 1 (green).
    fn palette_png(with_plte: bool) -> Vec<u8> {
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&2u32.to_be_bytes());
        ihdr.extend_from_slice(&1u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, COLOR_TYPE_PALETTE, 0, 0, 0]);
        // one scanline: filter byte 0, then the indices
        let idat = miniz_oxide::deflate::compress_to_vec_zlib(&[0, 0, 1], 6);

        let mut out = SIGNATURE.to_vec();
        out.extend_from_slice(&chunk(b"IHDR", &ihdr));
        if with_plte {
            out.extend_from_slice(&chunk(b"PLTE", &[255, 0, 0, 0, 255, 0]));
        }
        out.extend_from_slice(&chunk(b"IDAT", &idat));
        out.extend_from_slice(&chunk(b"IEND", &[]));
        out
    }

    #[test]
    fn test_palette_index0_keyed() {
        let image = decode(&palette_png(true), true).unwrap();
        assert_eq!(image.rgba, vec![255, 0, 0, 0, 0, 255, 0, 255]);
    }

    #[test]
    fn test_palette_opaque() {
        let image = decode(&palette_png(true), false).unwrap();
        assert_eq!(image.rgba, vec![255, 0, 0, 255, 0, 255, 0, 255]);
    }

    #[test]
    fn test_missing_palette() {
        assert!(matches!(
            decode(&palette_png(false), true),
            Err(DecodeError::MissingPalette)
        ));
    }

    #[test]
    fn test_truncated_chunk() {
        let mut png = palette_png(true);
        png.truncate(20);
        assert!(matches!(decode(&png, true), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_trns_chunk_layout() {
        let chunk = trns_chunk();
        assert_eq!(chunk.len(), 13);
        assert_eq!(&chunk[..9], &[0, 0, 0, 1, b't', b'R', b'N', b'S', 0]);
    }
}
