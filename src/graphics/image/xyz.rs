//! XYZ reader: `XYZ1`, u16 LE width, u16 LE height, then zlib data holding a
//! 256 x RGB palette followed by one index byte per pixel.

use miniz_oxide::inflate::{decompress_to_vec_zlib_with_limit, TINFLStatus};

use super::{expand_indexed, DecodeError, DecodedImage};

pub(super) const MAGIC: &[u8] = b"XYZ1";
const HEADER_LEN: usize = 8;
const PALETTE_LEN: usize = 256 * 3;

pub(super) fn decode(bytes: &[u8], transparent: bool) -> Result<DecodedImage, DecodeError> {
    if !bytes.starts_with(MAGIC) {
        return Err(DecodeError::BadMagic("XYZ"));
    }
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            expected: HEADER_LEN,
            actual: bytes.len(),
        });
    }
    let width = u16::from_le_bytes([bytes[4], bytes[5]]) as usize;
    let height = u16::from_le_bytes([bytes[6], bytes[7]]) as usize;
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidHeader(format!(
            "dimensions {}x{}",
            width, height
        )));
    }

    let expected = PALETTE_LEN + width * height;
    let data = decompress_to_vec_zlib_with_limit(&bytes[HEADER_LEN..], expected).map_err(|err| match err.status {
        TINFLStatus::HasMoreOutput => DecodeError::Inflate(format!("payload exceeds {} bytes", expected)),
        status => DecodeError::Inflate(format!("{:?}", status)),
    })?;
    if data.len() != expected {
        return Err(DecodeError::SizeMismatch {
            expected,
            actual: data.len(),
        });
    }

    let (palette_bytes, indices) = data.split_at(PALETTE_LEN);
    let palette: Vec<[u8; 3]> = palette_bytes
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();

    Ok(DecodedImage {
        width: width as u32,
        height: height as u32,
        rgba: expand_indexed(&palette, indices, transparent),
    })
}
