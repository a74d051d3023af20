//! Per-row compositing primitives, generic over source and destination format.
//!
//! Every function works on raw row slices plus a pixel count. Callers clip
//! rectangles first; slices shorter than `n` pixels panic rather than write
//! out of bounds.

use crate::graphics::bitmap_utils::hsl;
use crate::graphics::pixel_format::{PixelFormat, ONE};
use crate::graphics::types::{Color, Matrix, Rect, Tone};

/// Fractional bits of the fixed-point source coordinate used by scale blits.
pub const FRAC_BITS: u32 = 16;

/// Row operations for one `(source, destination)` format pair.
#[derive(Debug, Clone, Copy)]
pub struct RowOps<S: PixelFormat, D: PixelFormat> {
    pub src: S,
    pub dst: D,
}

#[inline]
fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

impl<S: PixelFormat, D: PixelFormat> RowOps<S, D> {
    pub fn new(src: S, dst: D) -> Self {
        Self { src, dst }
    }

    /// Source-over compositing of one pixel at global `opacity`.
    #[inline]
    fn blend_pixel(&self, d: &mut [u8], s: &[u8], opacity: u32) {
        let (sr, sg, sb, sa) = self.src.get_rgba(s);
        let srca = sa as u32 * opacity / ONE;
        if srca == 0 {
            return;
        }
        if srca >= self.src.opaque() as u32 {
            self.dst.set_rgba(d, sr, sg, sb, 255);
            return;
        }

        let (dr, dg, db, da) = self.dst.get_rgba(d);
        let (da, inv) = (da as u32, ONE - srca);
        if da == 0 {
            self.dst.set_rgba(d, sr, sg, sb, srca as u8);
        } else if da >= self.dst.opaque() as u32 {
            let mix = |dc: u8, sc: u8| ((dc as u32 * inv + sc as u32 * srca) / ONE) as u8;
            let a = da * inv / ONE + srca;
            self.dst
                .set_rgba(d, mix(dr, sr), mix(dg, sg), mix(db, sb), a.min(255) as u8);
        } else {
            let resa = ONE - (ONE - da) * inv / ONE;
            let mix = |dc: u8, sc: u8| {
                ((dc as u32 * da * inv / ONE + sc as u32 * srca) / resa).min(255) as u8
            };
            self.dst
                .set_rgba(d, mix(dr, sr), mix(dg, sg), mix(db, sb), resa as u8);
        }
    }

    /// Apply `f` to each source pixel and store the result; `None` leaves the
    /// destination pixel untouched.
    #[inline]
    fn map_pixels<F>(&self, dst: &mut [u8], src: &[u8], n: usize, f: F)
    where
        F: Fn(u8, u8, u8, u8) -> Option<(u8, u8, u8, u8)>,
    {
        let (sb, db) = (self.src.bytes(), self.dst.bytes());
        for i in 0..n {
            let (r, g, b, a) = self.src.get_rgba(&src[i * sb..]);
            if let Some((r, g, b, a)) = f(r, g, b, a) {
                self.dst.set_rgba(&mut dst[i * db..], r, g, b, a);
            }
        }
    }

    /// Same as `map_pixels` but reads and writes one buffer in the destination format.
    #[inline]
    fn map_in_place<F>(&self, buf: &mut [u8], n: usize, f: F)
    where
        F: Fn(u8, u8, u8, u8) -> Option<(u8, u8, u8, u8)>,
    {
        let db = self.dst.bytes();
        for i in 0..n {
            let px = &mut buf[i * db..];
            let (r, g, b, a) = self.dst.get_rgba(px);
            if let Some((r, g, b, a)) = f(r, g, b, a) {
                self.dst.set_rgba(px, r, g, b, a);
            }
        }
    }

    pub fn copy_blit(&self, dst: &mut [u8], src: &[u8], n: usize) {
        let (sb, db) = (self.src.bytes(), self.dst.bytes());
        for i in 0..n {
            let (r, g, b, a) = self.src.get_rgba(&src[i * sb..]);
            self.dst.set_rgba(&mut dst[i * db..], r, g, b, a);
        }
    }

    pub fn overlay_blit(&self, dst: &mut [u8], src: &[u8], n: usize) {
        self.opacity_blit(dst, src, n, 255);
    }

    pub fn opacity_blit(&self, dst: &mut [u8], src: &[u8], n: usize, opacity: u8) {
        let (sb, db) = (self.src.bytes(), self.dst.bytes());
        let opacity = opacity as u32;
        for i in 0..n {
            self.blend_pixel(&mut dst[i * db..], &src[i * sb..], opacity);
        }
    }

    /// `dst.alpha = min(dst.alpha, src.alpha)`.
    pub fn mask_blit(&self, dst: &mut [u8], src: &[u8], n: usize) {
        let (sb, db) = (self.src.bytes(), self.dst.bytes());
        for i in 0..n {
            let sa = self.src.get_alpha(&src[i * sb..]);
            let d = &mut dst[i * db..];
            if sa < self.dst.get_alpha(d) {
                self.dst.set_alpha(d, sa);
            }
        }
    }

    /// Copy `n` pixels, reading the source row from its last pixel backwards.
    pub fn flip_h_blit(&self, dst: &mut [u8], src: &[u8], n: usize) {
        let (sb, db) = (self.src.bytes(), self.dst.bytes());
        for i in 0..n {
            let (r, g, b, a) = self.src.get_rgba(&src[(n - 1 - i) * sb..]);
            self.dst.set_rgba(&mut dst[i * db..], r, g, b, a);
        }
    }

    /// Nearest-neighbour copy; source pixel of output `i` is `(x + i*step) >> FRAC_BITS`.
    pub fn copy_scale_blit(&self, dst: &mut [u8], src: &[u8], n: usize, x: u32, step: u32) {
        let (sb, db) = (self.src.bytes(), self.dst.bytes());
        let mut acc = x;
        for i in 0..n {
            let sx = (acc >> FRAC_BITS) as usize;
            let (r, g, b, a) = self.src.get_rgba(&src[sx * sb..]);
            self.dst.set_rgba(&mut dst[i * db..], r, g, b, a);
            acc += step;
        }
    }

    pub fn overlay_scale_blit(&self, dst: &mut [u8], src: &[u8], n: usize, x: u32, step: u32) {
        self.opacity_scale_blit(dst, src, n, x, step, 255);
    }

    pub fn opacity_scale_blit(
        &self,
        dst: &mut [u8],
        src: &[u8],
        n: usize,
        x: u32,
        step: u32,
        opacity: u8,
    ) {
        let (sb, db) = (self.src.bytes(), self.dst.bytes());
        let opacity = opacity as u32;
        let mut acc = x;
        for i in 0..n {
            let sx = (acc >> FRAC_BITS) as usize;
            self.blend_pixel(&mut dst[i * db..], &src[sx * sb..], opacity);
            acc += step;
        }
    }

    /// Inverse-map every destination pixel of `dst_rect` through `inverse` and
    /// blend the source pixel it lands on; pixels mapping outside `src_rect`
    /// are skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn transform_blit(
        &self,
        dst: &mut [u8],
        dst_pitch: usize,
        dst_rect: Rect,
        src: &[u8],
        src_pitch: usize,
        src_rect: Rect,
        inverse: &Matrix,
        opacity: u8,
    ) {
        let (sb, db) = (self.src.bytes(), self.dst.bytes());
        let opacity = opacity as u32;
        for y in dst_rect.y..dst_rect.bottom() {
            let row = y as usize * dst_pitch;
            for x in dst_rect.x..dst_rect.right() {
                let (fx, fy) = inverse.transform(x as f64 + 0.5, y as f64 + 0.5);
                let (sx, sy) = (fx.floor() as i32, fy.floor() as i32);
                if !src_rect.contains(sx, sy) {
                    continue;
                }
                let s = sy as usize * src_pitch + sx as usize * sb;
                self.blend_pixel(&mut dst[row + x as usize * db..], &src[s..], opacity);
            }
        }
    }

    /// HSL adjustment; fully transparent pixels are skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn hsl_blit(
        &self,
        dst: &mut [u8],
        src: &[u8],
        n: usize,
        hue: i32,
        sat: f64,
        lum: f64,
        loff: f64,
    ) {
        self.map_pixels(dst, src, n, |r, g, b, a| hsl_pixel(r, g, b, a, hue, sat, lum, loff));
    }

    pub fn hsl_in_place(&self, buf: &mut [u8], n: usize, hue: i32, sat: f64, lum: f64, loff: f64) {
        self.map_in_place(buf, n, |r, g, b, a| hsl_pixel(r, g, b, a, hue, sat, lum, loff));
    }

    pub fn tone_blit(&self, dst: &mut [u8], src: &[u8], n: usize, tone: Tone) {
        self.map_pixels(dst, src, n, |r, g, b, a| tone_pixel(r, g, b, a, tone));
    }

    pub fn tone_in_place(&self, buf: &mut [u8], n: usize, tone: Tone) {
        self.map_in_place(buf, n, |r, g, b, a| tone_pixel(r, g, b, a, tone));
    }

    /// Scale only the alpha channel by `opacity / 255`.
    pub fn opacity_change_blit(&self, dst: &mut [u8], src: &[u8], n: usize, opacity: u8) {
        self.map_pixels(dst, src, n, |r, g, b, a| {
            Some((r, g, b, (a as u32 * opacity as u32 / ONE) as u8))
        });
    }

    pub fn opacity_change_in_place(&self, buf: &mut [u8], n: usize, opacity: u8) {
        let db = self.dst.bytes();
        for i in 0..n {
            let px = &mut buf[i * db..];
            let a = self.dst.get_alpha(px);
            self.dst.set_alpha(px, (a as u32 * opacity as u32 / ONE) as u8);
        }
    }

    /// Mix RGB toward `color` by `color.alpha / 255`, keeping alpha.
    pub fn blend_color_in_place(&self, buf: &mut [u8], n: usize, color: Color) {
        let k = color.alpha as i32;
        if k == 0 {
            return;
        }
        let mix = move |c: u8, t: u8| (c as i32 + (t as i32 - c as i32) * k / 255) as u8;
        self.map_in_place(buf, n, |r, g, b, a| {
            if a == 0 {
                return None;
            }
            Some((mix(r, color.red), mix(g, color.green), mix(b, color.blue), a))
        });
    }

    /// Additive blend: `dst.rgb += src.rgb * srca / 255`.
    pub fn add_blit(&self, dst: &mut [u8], src: &[u8], n: usize, opacity: u8) {
        self.arith_blit(dst, src, n, opacity, 1);
    }

    /// Subtractive blend: `dst.rgb -= src.rgb * srca / 255`.
    pub fn sub_blit(&self, dst: &mut [u8], src: &[u8], n: usize, opacity: u8) {
        self.arith_blit(dst, src, n, opacity, -1);
    }

    fn arith_blit(&self, dst: &mut [u8], src: &[u8], n: usize, opacity: u8, sign: i32) {
        let (sb, db) = (self.src.bytes(), self.dst.bytes());
        for i in 0..n {
            let (sr, sg, sbl, sa) = self.src.get_rgba(&src[i * sb..]);
            let srca = (sa as u32 * opacity as u32 / ONE) as i32;
            if srca == 0 {
                continue;
            }
            let d = &mut dst[i * db..];
            let (dr, dg, dbl, da) = self.dst.get_rgba(d);
            let apply = |dc: u8, sc: u8| clamp_u8(dc as i32 + sign * (sc as i32 * srca / 255));
            self.dst.set_rgba(
                d,
                apply(dr, sr),
                apply(dg, sg),
                apply(dbl, sbl),
                da.max(srca as u8),
            );
        }
    }
}

#[inline]
#[allow(clippy::too_many_arguments)]
fn hsl_pixel(
    r: u8,
    g: u8,
    b: u8,
    a: u8,
    hue: i32,
    sat: f64,
    lum: f64,
    loff: f64,
) -> Option<(u8, u8, u8, u8)> {
    if a == 0 {
        return None;
    }
    let (r, g, b) = hsl::hsl_to_rgb(hsl::adjust(hsl::rgb_to_hsl(r, g, b), hue, sat, lum, loff));
    Some((r, g, b, a))
}

#[inline]
fn tone_pixel(r: u8, g: u8, b: u8, a: u8, tone: Tone) -> Option<(u8, u8, u8, u8)> {
    if a == 0 {
        return None;
    }
    if tone.gray == 0 {
        return Some((
            clamp_u8(r as i32 + tone.red as i32),
            clamp_u8(g as i32 + tone.green as i32),
            clamp_u8(b as i32 + tone.blue as i32),
            a,
        ));
    }
    let factor = (255 - tone.gray as i32) as f64 / 255.0;
    let gray = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    let channel = |c: u8, shift: i16| {
        clamp_u8((c as f64 * factor + gray * (1.0 - factor) + shift as f64 + 0.5) as i32)
    };
    Some((
        channel(r, tone.red),
        channel(g, tone.green),
        channel(b, tone.blue),
        a,
    ))
}

// ==============================================================================
// In-place mirroring
// ==============================================================================

fn swap_pixels(row: &mut [u8], i: usize, j: usize, bpp: usize) {
    for k in 0..bpp {
        row.swap(i * bpp + k, j * bpp + k);
    }
}

/// Mirror each row of a `width x height` buffer horizontally.
pub fn flip_h(buf: &mut [u8], pitch: usize, width: usize, height: usize, bpp: usize) {
    for y in 0..height {
        let row = &mut buf[y * pitch..y * pitch + width * bpp];
        for i in 0..width / 2 {
            swap_pixels(row, i, width - 1 - i, bpp);
        }
    }
}

/// Mirror a `width x height` buffer vertically by swapping whole rows.
pub fn flip_v(buf: &mut [u8], pitch: usize, width: usize, height: usize, bpp: usize) {
    let row_len = width * bpp;
    for y in 0..height / 2 {
        let (top, bottom) = buf.split_at_mut((height - 1 - y) * pitch);
        top[y * pitch..y * pitch + row_len].swap_with_slice(&mut bottom[..row_len]);
    }
}

/// Mirror on both axes (a 180 degree rotation).
pub fn flip_hv(buf: &mut [u8], pitch: usize, width: usize, height: usize, bpp: usize) {
    flip_v(buf, pitch, width, height, bpp);
    flip_h(buf, pitch, width, height, bpp);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::pixel_format::{Bgra8888, DynamicFormat, Rgba8888};
    use proptest::prelude::*;

    fn px(r: u8, g: u8, b: u8, a: u8) -> [u8; 4] {
        [r, g, b, a]
    }

    const OPS: RowOps<Rgba8888, Rgba8888> = RowOps {
        src: Rgba8888,
        dst: Rgba8888,
    };

    #[test]
    fn test_half_opacity_red_over_blue() {
        let src = px(255, 0, 0, 255);
        let mut dst = px(0, 0, 255, 255);
        OPS.opacity_blit(&mut dst, &src, 1, 128);
        assert_eq!(dst, px(128, 0, 127, 255));
    }

    #[test]
    fn test_blend_onto_transparent_copies_scaled_alpha() {
        let src = px(10, 20, 30, 200);
        let mut dst = px(99, 99, 99, 0);
        OPS.opacity_blit(&mut dst, &src, 1, 255);
        assert_eq!(dst, px(10, 20, 30, 200));
    }

    #[test]
    fn test_blend_onto_translucent() {
        let src = px(255, 255, 255, 128);
        let mut dst = px(0, 0, 0, 128);
        OPS.overlay_blit(&mut dst, &src, 1);
        // resa = 255 - 127*127/255 = 192
        assert_eq!(dst[3], 192);
        // (0 + 255*128) / 192
        assert_eq!(dst[0], 170);
    }

    #[test]
    fn test_mask_blit_takes_minimum() {
        let src = [px(0, 0, 0, 10), px(0, 0, 0, 250)].concat();
        let mut dst = [px(1, 2, 3, 100), px(4, 5, 6, 100)].concat();
        OPS.mask_blit(&mut dst, &src, 2);
        assert_eq!(dst, [px(1, 2, 3, 10), px(4, 5, 6, 100)].concat());
    }

    #[test]
    fn test_flip_h_blit_reverses() {
        let src = [px(1, 0, 0, 255), px(2, 0, 0, 255), px(3, 0, 0, 255)].concat();
        let mut dst = vec![0u8; 12];
        OPS.flip_h_blit(&mut dst, &src, 3);
        assert_eq!(dst, [px(3, 0, 0, 255), px(2, 0, 0, 255), px(1, 0, 0, 255)].concat());
    }

    #[test]
    fn test_copy_scale_blit_doubles() {
        let src = [px(1, 0, 0, 255), px(2, 0, 0, 255)].concat();
        let mut dst = vec![0u8; 16];
        OPS.copy_scale_blit(&mut dst, &src, 4, 0, 1 << (FRAC_BITS - 1));
        let reds: Vec<u8> = dst.chunks(4).map(|c| c[0]).collect();
        assert_eq!(reds, vec![1, 1, 2, 2]);
    }

    #[test]
    fn test_opacity_scale_blit_fractional_step() {
        let src = [px(255, 0, 0, 255), px(0, 255, 0, 255), px(0, 0, 255, 255)].concat();
        let mut dst = [px(0, 0, 0, 255), px(0, 0, 0, 255)].concat();
        // start at 0.5, advance 1.5 source pixels per output pixel
        OPS.opacity_scale_blit(&mut dst, &src, 2, 1 << (FRAC_BITS - 1), 3 << (FRAC_BITS - 1), 128);
        assert_eq!(dst, [px(128, 0, 0, 255), px(0, 0, 128, 255)].concat());
    }

    #[test]
    fn test_overlay_scale_blit_skips_transparent() {
        let src = [px(10, 20, 30, 255), px(0, 0, 0, 0)].concat();
        let mut dst = [px(1, 1, 1, 255); 4].concat();
        OPS.overlay_scale_blit(&mut dst, &src, 4, 0, 1 << (FRAC_BITS - 1));
        assert_eq!(
            dst,
            [px(10, 20, 30, 255), px(10, 20, 30, 255), px(1, 1, 1, 255), px(1, 1, 1, 255)].concat()
        );
    }

    #[test]
    fn test_tone_blit_gray_rounds_across_formats() {
        let ops = RowOps::new(Rgba8888, Bgra8888);
        let src = [px(200, 100, 50, 255), px(9, 9, 9, 0)].concat();
        let mut dst = [px(7, 7, 7, 7); 2].concat();
        ops.tone_blit(&mut dst, &src, 2, Tone::new(10, -20, 0, 128));
        // red: 161.95 + 10 rounds up to 172
        assert_eq!(dst, [[87u8, 92, 172, 255], px(7, 7, 7, 7)].concat());

        let ops = RowOps::new(DynamicFormat::bgra8888(), Rgba8888);
        let src = [0, 255, 255, 255];
        let mut dst = [0u8; 4];
        ops.tone_blit(&mut dst, &src, 1, Tone::new(0, 0, 40, 64));
        assert_eq!(dst, px(248, 248, 97, 255));
    }

    #[test]
    fn test_copy_blit_converts_format() {
        let ops = RowOps::new(Rgba8888, Bgra8888);
        let src = px(10, 20, 30, 40);
        let mut dst = [0u8; 4];
        ops.copy_blit(&mut dst, &src, 1);
        assert_eq!(dst, [30, 20, 10, 40]);
    }

    #[test]
    fn test_copy_blit_into_rgb565() {
        let ops = RowOps::new(Rgba8888, DynamicFormat::rgb565());
        let src = px(255, 255, 255, 255);
        let mut dst = [0u8; 2];
        ops.copy_blit(&mut dst, &src, 1);
        assert_eq!(dst, [0xFF, 0xFF]);
    }

    #[test]
    fn test_tone_additive_clamps() {
        let mut buf = px(250, 5, 100, 255);
        OPS.tone_in_place(&mut buf, 1, Tone::new(20, -20, 0, 0));
        assert_eq!(buf, px(255, 0, 100, 255));
    }

    #[test]
    fn test_tone_full_gray() {
        let mut buf = px(255, 0, 0, 255);
        OPS.tone_in_place(&mut buf, 1, Tone::new(0, 0, 0, 255));
        // 0.299 * 255 = 76.245 -> 76
        assert_eq!(buf, px(76, 76, 76, 255));
    }

    #[test]
    fn test_tone_skips_transparent() {
        let mut buf = px(1, 2, 3, 0);
        OPS.tone_in_place(&mut buf, 1, Tone::new(100, 100, 100, 0));
        assert_eq!(buf, px(1, 2, 3, 0));
    }

    #[test]
    fn test_hsl_skips_transparent() {
        let src = px(200, 10, 10, 0);
        let mut dst = px(7, 7, 7, 7);
        OPS.hsl_blit(&mut dst, &src, 1, 120, 1.0, 1.0, 0.0);
        assert_eq!(dst, px(7, 7, 7, 7));
    }

    #[test]
    fn test_opacity_change() {
        let src = px(1, 2, 3, 200);
        let mut dst = [0u8; 4];
        OPS.opacity_change_blit(&mut dst, &src, 1, 128);
        assert_eq!(dst, px(1, 2, 3, 100));
    }

    #[test]
    fn test_add_and_sub_blit() {
        let src = px(100, 100, 100, 255);
        let mut dst = px(200, 50, 0, 255);
        OPS.add_blit(&mut dst, &src, 1, 255);
        assert_eq!(dst, px(255, 150, 100, 255));
        OPS.sub_blit(&mut dst, &src, 1, 255);
        assert_eq!(dst, px(155, 50, 0, 255));
    }

    #[test]
    fn test_blend_color_full_strength() {
        let mut buf = px(0, 0, 0, 255);
        OPS.blend_color_in_place(&mut buf, 1, Color::new(255, 128, 0, 255));
        assert_eq!(buf, px(255, 128, 0, 255));
    }

    #[test]
    fn test_transform_blit_identity() {
        let src = [px(1, 0, 0, 255), px(2, 0, 0, 255)].concat();
        let mut dst = vec![0u8; 8];
        OPS.transform_blit(
            &mut dst,
            8,
            Rect::new(0, 0, 2, 1),
            &src,
            8,
            Rect::new(0, 0, 2, 1),
            &Matrix::identity(),
            255,
        );
        assert_eq!(dst, src);
    }

    #[test]
    fn test_flip_in_place() {
        // 2x2 image, pixel value = index
        let mut buf: Vec<u8> = (0..4u8).flat_map(|i| px(i, 0, 0, 255)).collect();
        flip_h(&mut buf, 8, 2, 2, 4);
        let reds: Vec<u8> = buf.chunks(4).map(|c| c[0]).collect();
        assert_eq!(reds, vec![1, 0, 3, 2]);
        flip_v(&mut buf, 8, 2, 2, 4);
        let reds: Vec<u8> = buf.chunks(4).map(|c| c[0]).collect();
        assert_eq!(reds, vec![3, 2, 1, 0]);
        flip_hv(&mut buf, 8, 2, 2, 4);
        let reds: Vec<u8> = buf.chunks(4).map(|c| c[0]).collect();
        assert_eq!(reds, vec![0, 1, 2, 3]);
    }

    proptest! {
        #[test]
        fn prop_opaque_source_at_full_opacity_replaces(
            s in any::<[u8; 3]>(),
            d in any::<[u8; 4]>(),
        ) {
            let src = px(s[0], s[1], s[2], 255);
            let mut dst = d;
            OPS.opacity_blit(&mut dst, &src, 1, 255);
            prop_assert_eq!(dst, src);
        }

        #[test]
        fn prop_zero_opacity_is_identity(s in any::<[u8; 4]>(), d in any::<[u8; 4]>()) {
            let mut dst = d;
            OPS.opacity_blit(&mut dst, &s, 1, 0);
            prop_assert_eq!(dst, d);
        }

        #[test]
        fn prop_mask_is_lower_bound(s in any::<[u8; 4]>(), d in any::<[u8; 4]>()) {
            let mut dst = d;
            OPS.mask_blit(&mut dst, &s, 1);
            prop_assert!(dst[3] <= d[3]);
            prop_assert!(dst[3] <= s[3]);
        }

        #[test]
        fn prop_tone_identity(d in any::<[u8; 4]>()) {
            let mut buf = d;
            OPS.tone_in_place(&mut buf, 1, Tone::default());
            prop_assert_eq!(buf, d);
        }
    }
}
