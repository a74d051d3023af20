//! Blit engine: row-level compositing and format-pair dispatch.
//!
//! Every bitmap operation resolves its `(source, destination)` format pair
//! once through [`BlitPath::select`] and then runs a monomorphized
//! [`RowOps`] over each row. Pairs of identical canonical 32-bit layouts get
//! a zero-sized format with constant channel offsets; everything else falls
//! back to [`DynamicFormat`] mask arithmetic.

pub mod hsl;
mod ops;

pub use ops::{flip_h, flip_hv, flip_v, RowOps, FRAC_BITS};

use crate::graphics::pixel_format::DynamicFormat;

/// Which row implementation a format pair runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlitPath {
    Rgba8888,
    Bgra8888,
    Abgr8888,
    Argb8888,
    Dynamic,
}

impl BlitPath {
    /// Pick the fast path when source and destination share a canonical
    /// 32-bit alpha layout.
    pub fn select(src: &DynamicFormat, dst: &DynamicFormat) -> Self {
        if src != dst {
            return BlitPath::Dynamic;
        }
        if *src == DynamicFormat::rgba8888() {
            BlitPath::Rgba8888
        } else if *src == DynamicFormat::bgra8888() {
            BlitPath::Bgra8888
        } else if *src == DynamicFormat::abgr8888() {
            BlitPath::Abgr8888
        } else if *src == DynamicFormat::argb8888() {
            BlitPath::Argb8888
        } else {
            BlitPath::Dynamic
        }
    }

    pub fn is_fast(&self) -> bool {
        *self != BlitPath::Dynamic
    }
}

/// Run `$body` with `$ops` bound to the `RowOps` for a format pair.
///
/// ```ignore
/// with_row_ops!(src.format(), dst.format(), |ops| {
///     ops.copy_blit(dst_row, src_row, n);
/// });
/// ```
macro_rules! with_row_ops {
    ($src:expr, $dst:expr, |$ops:ident| $body:expr) => {{
        use $crate::graphics::bitmap_utils::{BlitPath, RowOps};
        use $crate::graphics::pixel_format as pf;
        let (src_format, dst_format): (pf::DynamicFormat, pf::DynamicFormat) = ($src, $dst);
        match BlitPath::select(&src_format, &dst_format) {
            BlitPath::Rgba8888 => {
                let $ops = RowOps::new(pf::Rgba8888, pf::Rgba8888);
                $body
            }
            BlitPath::Bgra8888 => {
                let $ops = RowOps::new(pf::Bgra8888, pf::Bgra8888);
                $body
            }
            BlitPath::Abgr8888 => {
                let $ops = RowOps::new(pf::Abgr8888, pf::Abgr8888);
                $body
            }
            BlitPath::Argb8888 => {
                let $ops = RowOps::new(pf::Argb8888, pf::Argb8888);
                $body
            }
            BlitPath::Dynamic => {
                let $ops = RowOps::new(src_format, dst_format);
                $body
            }
        }
    }};
}

pub(crate) use with_row_ops;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::pixel_format::PixelFormat;

    #[test]
    fn test_select_fast_paths() {
        let rgba = DynamicFormat::rgba8888();
        assert_eq!(BlitPath::select(&rgba, &rgba), BlitPath::Rgba8888);
        let bgra = DynamicFormat::bgra8888();
        assert_eq!(BlitPath::select(&bgra, &bgra), BlitPath::Bgra8888);
        let abgr = DynamicFormat::abgr8888();
        assert_eq!(BlitPath::select(&abgr, &abgr), BlitPath::Abgr8888);
        let argb = DynamicFormat::argb8888();
        assert_eq!(BlitPath::select(&argb, &argb), BlitPath::Argb8888);
    }

    #[test]
    fn test_select_falls_back_to_dynamic() {
        let rgba = DynamicFormat::rgba8888();
        let bgra = DynamicFormat::bgra8888();
        assert_eq!(BlitPath::select(&rgba, &bgra), BlitPath::Dynamic);
        let rgb565 = DynamicFormat::rgb565();
        assert_eq!(BlitPath::select(&rgb565, &rgb565), BlitPath::Dynamic);
        assert!(!BlitPath::Dynamic.is_fast());
    }

    #[test]
    fn test_fast_and_dynamic_paths_agree() {
        let format = DynamicFormat::bgra8888();
        let src: Vec<u8> = (0..64u8).map(|i| i.wrapping_mul(37)).collect();
        let base: Vec<u8> = (0..64u8).map(|i| i.wrapping_mul(11).wrapping_add(5)).collect();

        let mut fast = base.clone();
        with_row_ops!(format, format, |ops| ops.opacity_blit(&mut fast, &src, 16, 170));

        let mut slow = base.clone();
        RowOps::new(format, format).opacity_blit(&mut slow, &src, 16, 170);
        assert_eq!(fast, slow);
        assert_eq!(format.bytes(), 4);
    }
}
