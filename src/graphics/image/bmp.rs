//! 8-bit palette BMP reader.

use super::{expand_indexed, DecodeError, DecodedImage};

const FILE_HEADER_LEN: usize = 14;
const INFO_HEADER_MIN: usize = 40;
const BI_RGB: u32 = 0;

fn u16_at(bytes: &[u8], at: usize) -> Result<u16, DecodeError> {
    bytes
        .get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or(DecodeError::Truncated {
            expected: at + 2,
            actual: bytes.len(),
        })
}

fn u32_at(bytes: &[u8], at: usize) -> Result<u32, DecodeError> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(DecodeError::Truncated {
            expected: at + 4,
            actual: bytes.len(),
        })
}

pub(super) fn decode(bytes: &[u8], transparent: bool) -> Result<DecodedImage, DecodeError> {
    if !bytes.starts_with(b"BM") {
        return Err(DecodeError::BadMagic("BMP"));
    }
    let data_offset = u32_at(bytes, 10)? as usize;
    let info_len = u32_at(bytes, 14)? as usize;
    if info_len < INFO_HEADER_MIN {
        return Err(DecodeError::InvalidHeader(format!(
            "info header of {} bytes",
            info_len
        )));
    }
    let width = u32_at(bytes, 18)? as i32;
    let raw_height = u32_at(bytes, 22)? as i32;
    let bits = u16_at(bytes, 28)?;
    let compression = u32_at(bytes, 30)?;
    let colors_used = u32_at(bytes, 46)? as usize;

    if bits != 8 {
        return Err(DecodeError::UnsupportedBitDepth(bits));
    }
    if compression != BI_RGB {
        return Err(DecodeError::UnsupportedCompression(compression));
    }
    if width <= 0 || raw_height == 0 || raw_height == i32::MIN {
        return Err(DecodeError::InvalidHeader(format!(
            "dimensions {}x{}",
            width, raw_height
        )));
    }
    let top_down = raw_height < 0;
    let (width, height) = (width as usize, raw_height.unsigned_abs() as usize);

    let num_colors = if colors_used == 0 { 256 } else { colors_used.min(256) };
    let palette_start = FILE_HEADER_LEN + info_len;
    let palette_end = palette_start + num_colors * 4;
    let palette_bytes = bytes.get(palette_start..palette_end).ok_or(DecodeError::Truncated {
        expected: palette_end,
        actual: bytes.len(),
    })?;
    // entries are stored B, G, R, reserved
    let palette: Vec<[u8; 3]> = palette_bytes
        .chunks_exact(4)
        .map(|e| [e[2], e[1], e[0]])
        .collect();

    let stride = (width + 3) & !3;
    let data_end = data_offset + stride * height;
    let data = bytes.get(data_offset..data_end).ok_or(DecodeError::Truncated {
        expected: data_end,
        actual: bytes.len(),
    })?;

    let mut indices = Vec::with_capacity(width * height);
    for y in 0..height {
        let row = if top_down { y } else { height - 1 - y };
        indices.extend_from_slice(&data[row * stride..row * stride + width]);
    }

    Ok(DecodedImage {
        width: width as u32,
        height: height as u32,
        rgba: expand_indexed(&palette, &indices, transparent),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an 8-bit BMP with a two-color palette.
    fn build_bmp(width: i32, height: i32, bits: u16, rows: &[&[u8]]) -> Vec<u8> {
        let stride = ((width as usize) + 3) & !3;
        let palette: [[u8; 4]; 2] = [[0, 0, 255, 0], [0, 255, 0, 0]];
        let data_offset = FILE_HEADER_LEN + INFO_HEADER_MIN + palette.len() * 4;
        let mut out = Vec::new();
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&((data_offset + stride * rows.len()) as u32).to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&(data_offset as u32).to_le_bytes());
        out.extend_from_slice(&(INFO_HEADER_MIN as u32).to_le_bytes());
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&bits.to_le_bytes());
        out.extend_from_slice(&BI_RGB.to_le_bytes());
        out.extend_from_slice(&[0; 12]);
        out.extend_from_slice(&(palette.len() as u32).to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        for entry in palette {
            out.extend_from_slice(&entry);
        }
        for row in rows {
            let mut padded = row.to_vec();
            padded.resize(stride, 0);
            out.extend_from_slice(&padded);
        }
        out
    }

    #[test]
    fn test_bottom_up() {
        // stored bottom row first
        let bmp = build_bmp(2, 2, 8, &[&[1, 1], &[0, 1]]);
        let image = decode(&bmp, true).unwrap();
        assert_eq!((image.width, image.height), (2, 2));
        assert_eq!(&image.rgba[0..4], &[255, 0, 0, 0]);
        assert_eq!(&image.rgba[4..8], &[0, 255, 0, 255]);
        assert_eq!(&image.rgba[8..12], &[0, 255, 0, 255]);
    }

    #[test]
    fn test_top_down() {
        let bmp = build_bmp(2, -2, 8, &[&[1, 1], &[0, 1]]);
        let image = decode(&bmp, false).unwrap();
        assert_eq!(&image.rgba[0..4], &[0, 255, 0, 255]);
        assert_eq!(&image.rgba[8..12], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_rejects_other_bit_depths() {
        let bmp = build_bmp(2, 2, 24, &[&[1, 1], &[0, 1]]);
        assert!(matches!(decode(&bmp, true), Err(DecodeError::UnsupportedBitDepth(24))));
    }

    #[test]
    fn test_rejects_compression() {
        let mut bmp = build_bmp(2, 2, 8, &[&[1, 1], &[0, 1]]);
        bmp[30] = 1;
        assert!(matches!(decode(&bmp, true), Err(DecodeError::UnsupportedCompression(1))));
    }

    #[test]
    fn test_truncated_pixels() {
        let mut bmp = build_bmp(2, 2, 8, &[&[1, 1], &[0, 1]]);
        bmp.truncate(bmp.len() - 2);
        assert!(matches!(decode(&bmp, true), Err(DecodeError::Truncated { .. })));
    }
}
