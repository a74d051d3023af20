//! Owned pixel buffer and every drawing operation on it.
//!
//! A [`Bitmap`] stores `width x height` pixels in one [`DynamicFormat`] and
//! routes all per-pixel work through the row engine in
//! [`bitmap_utils`](crate::graphics::bitmap_utils). Writes go through a
//! [`PixelLock`] guard; dropping the guard marks every attached observer
//! dirty.
//!
//! Blit-family operations never fail: empty, degenerate or fully clipped
//! rectangles are silent no-ops. Factories return [`BitmapError`].

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use thiserror::Error;

use crate::graphics::bitmap_utils::{flip_h, flip_hv, flip_v, with_row_ops, FRAC_BITS};
use crate::graphics::font::FontRenderer;
use crate::graphics::image::DecodeError;
use crate::graphics::pixel_format::{DynamicFormat, PixelFormat};
use crate::graphics::render_context::RenderContext;
use crate::graphics::types::{Color, Matrix, Rect, Tone};

/// Errors from bitmap factories.
#[derive(Debug, Error)]
pub enum BitmapError {
    #[error("invalid bitmap dimensions {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image decode failed: {0}")]
    Decode(#[from] DecodeError),
}

pub type Result<T> = std::result::Result<T, BitmapError>;

/// A bitmap shared between drawing code and any number of screens.
pub type SharedBitmap = Arc<Mutex<Bitmap>>;

/// Dirty bit shared between a bitmap and one of its observers.
#[derive(Debug, Default)]
pub struct DirtyFlag(AtomicBool);

impl DirtyFlag {
    pub fn new(dirty: bool) -> Self {
        Self(AtomicBool::new(dirty))
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Scoped write access to a bitmap's pixels.
///
/// Observers are notified when the guard is dropped, on every exit path.
pub struct PixelLock<'a> {
    bitmap: &'a mut Bitmap,
}

impl PixelLock<'_> {
    pub fn pitch(&self) -> usize {
        self.bitmap.pitch
    }

    pub fn width(&self) -> i32 {
        self.bitmap.width
    }

    pub fn height(&self) -> i32 {
        self.bitmap.height
    }

    pub fn format(&self) -> DynamicFormat {
        self.bitmap.format
    }

    /// Bytes of row `y`, `width * bpp` long.
    pub fn row_mut(&mut self, y: i32) -> &mut [u8] {
        let start = y as usize * self.bitmap.pitch;
        let len = self.bitmap.width as usize * self.bitmap.format.bytes();
        &mut self.bitmap.pixels[start..start + len]
    }
}

impl Deref for PixelLock<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bitmap.pixels
    }
}

impl DerefMut for PixelLock<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bitmap.pixels
    }
}

impl Drop for PixelLock<'_> {
    fn drop(&mut self) {
        self.bitmap.notify_dirty();
    }
}

#[derive(Clone, Copy)]
enum RowMode {
    Opacity(u8),
    Add(u8),
    Sub(u8),
    Mask,
}

#[derive(Clone, Copy)]
enum RegionOp {
    Hsl {
        hue: i32,
        sat: f64,
        lum: f64,
        loff: f64,
    },
    Tone(Tone),
    Opacity(u8),
    BlendColor(Color),
}

/// Clip a blit of `src_rect` placed at `(x, y)` against both bitmaps.
///
/// Returns the destination and source rects, equal in size, or `None` when
/// nothing is left.
fn clip_blit(x: i32, y: i32, src_rect: Rect, src_bounds: Rect, dst_bounds: Rect) -> Option<(Rect, Rect)> {
    // widened so extreme offsets cannot wrap
    let (mut x, mut y) = (x as i64, y as i64);
    let (mut sx, mut sy) = (src_rect.x as i64, src_rect.y as i64);
    let (mut sw, mut sh) = (src_rect.width as i64, src_rect.height as i64);

    if sx < 0 {
        x -= sx;
        sw += sx;
        sx = 0;
    }
    if sy < 0 {
        y -= sy;
        sh += sy;
        sy = 0;
    }
    sw = sw.min(src_bounds.width as i64 - sx);
    sh = sh.min(src_bounds.height as i64 - sy);

    if x < 0 {
        sx -= x;
        sw += x;
        x = 0;
    }
    if y < 0 {
        sy -= y;
        sh += y;
        y = 0;
    }
    sw = sw.min(dst_bounds.width as i64 - x);
    sh = sh.min(dst_bounds.height as i64 - y);

    if sw <= 0 || sh <= 0 {
        return None;
    }
    // a non-empty result lies inside both bounds
    let (w, h) = (sw as i32, sh as i32);
    Some((Rect::new(x as i32, y as i32, w, h), Rect::new(sx as i32, sy as i32, w, h)))
}

/// Pixel buffer in a fixed format with an optional font and dirty observers.
pub struct Bitmap {
    width: i32,
    height: i32,
    pitch: usize,
    format: DynamicFormat,
    pixels: Vec<u8>,
    font: Option<Arc<dyn FontRenderer>>,
    observers: Vec<Weak<DirtyFlag>>,
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pitch", &self.pitch)
            .field("format", &self.format)
            .field("has_font", &self.font.is_some())
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Clones pixels and font; observers stay with the original.
impl Clone for Bitmap {
    fn clone(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            pitch: self.pitch,
            format: self.format,
            pixels: self.pixels.clone(),
            font: self.font.clone(),
            observers: Vec::new(),
        }
    }
}

impl Bitmap {
    // ==========================================================================
    // Factories
    // ==========================================================================

    /// Bitmap in the context's pixel format. Transparent bitmaps start fully
    /// transparent, opaque ones start black.
    pub fn new(ctx: &RenderContext, width: i32, height: i32, transparent: bool) -> Result<Self> {
        let mut bitmap = Self::with_format(ctx.format(), width, height)?;
        if !transparent {
            bitmap.fill(Color::BLACK);
        }
        Ok(bitmap)
    }

    /// Zero-initialized bitmap in an explicit format.
    pub fn with_format(format: DynamicFormat, width: i32, height: i32) -> Result<Self> {
        if width <= 0 || height <= 0 {
            return Err(BitmapError::InvalidDimensions { width, height });
        }
        let pitch = width as usize * format.bytes();
        Ok(Self {
            width,
            height,
            pitch,
            format,
            pixels: vec![0; pitch * height as usize],
            font: None,
            observers: Vec::new(),
        })
    }

    /// Bitmap built from tightly packed `R, G, B, A` bytes.
    pub fn from_rgba(format: DynamicFormat, width: i32, height: i32, rgba: &[u8]) -> Result<Self> {
        let mut bitmap = Self::with_format(format, width, height)?;
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(BitmapError::BufferSize {
                expected,
                actual: rgba.len(),
            });
        }
        let (w, pitch) = (width as usize, bitmap.pitch);
        with_row_ops!(DynamicFormat::rgba8888(), format, |ops| {
            let mut px = bitmap.lock();
            for (y, src) in rgba.chunks_exact(w * 4).enumerate() {
                ops.copy_blit(&mut px[y * pitch..], src, w);
            }
        });
        Ok(bitmap)
    }

    /// Copy of `rect` from `source`, clipped to its bounds.
    pub fn from_region(source: &Bitmap, rect: Rect) -> Result<Self> {
        Self::from_region_flipped(source, rect, false, false)
    }

    /// Copy of `rect` from `source`, mirrored on the requested axes.
    pub fn from_region_flipped(source: &Bitmap, rect: Rect, flip_x: bool, flip_y: bool) -> Result<Self> {
        let clipped = rect.get_sub_rect(source.rect());
        if clipped.is_empty() {
            return Err(BitmapError::InvalidDimensions {
                width: clipped.width,
                height: clipped.height,
            });
        }
        let mut bitmap = Self::with_format(source.format, clipped.width, clipped.height)?;
        bitmap.font = source.font.clone();

        let (w, h) = (clipped.width as usize, clipped.height as usize);
        let (sp, dp, bpp) = (source.pitch, bitmap.pitch, source.bpp());
        with_row_ops!(source.format, source.format, |ops| {
            let mut px = bitmap.lock();
            for row in 0..h {
                let sy = if flip_y { h - 1 - row } else { row } + clipped.y as usize;
                let src = &source.pixels[sy * sp + clipped.x as usize * bpp..];
                let dst = &mut px[row * dp..];
                if flip_x {
                    ops.flip_h_blit(dst, src, w);
                } else {
                    ops.copy_blit(dst, src, w);
                }
            }
        });
        Ok(bitmap)
    }

    // ==========================================================================
    // Accessors
    // ==========================================================================

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Bytes per row.
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    /// Bytes per pixel.
    pub fn bpp(&self) -> usize {
        self.format.bytes()
    }

    pub fn format(&self) -> DynamicFormat {
        self.format
    }

    pub fn rect(&self) -> Rect {
        Rect::sized(self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn font(&self) -> Option<&Arc<dyn FontRenderer>> {
        self.font.as_ref()
    }

    pub fn set_font(&mut self, font: Option<Arc<dyn FontRenderer>>) {
        self.font = font;
    }

    /// Wrap into a handle that screens can share.
    pub fn into_shared(self) -> SharedBitmap {
        Arc::new(Mutex::new(self))
    }

    /// Write access to the raw pixels; observers are notified on drop.
    pub fn lock(&mut self) -> PixelLock<'_> {
        PixelLock { bitmap: self }
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> Option<Color> {
        if !self.rect().contains(x, y) {
            return None;
        }
        let (r, g, b, a) = self.format.get_rgba(&self.pixels[self.offset(x, y)..]);
        Some(Color::new(r, g, b, a))
    }

    /// Out-of-bounds writes are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        if !self.rect().contains(x, y) {
            return;
        }
        let (offset, format) = (self.offset(x, y), self.format);
        let mut px = self.lock();
        format.set_rgba(&mut px[offset..], color.red, color.green, color.blue, color.alpha);
    }

    /// Pixels as tightly packed `R, G, B, A` bytes.
    pub fn to_rgba(&self) -> Vec<u8> {
        let w = self.width as usize;
        let mut out = vec![0u8; w * self.height as usize * 4];
        with_row_ops!(self.format, DynamicFormat::rgba8888(), |ops| {
            for (y, dst) in out.chunks_exact_mut(w * 4).enumerate() {
                ops.copy_blit(dst, &self.pixels[y * self.pitch..], w);
            }
        });
        out
    }

    #[inline]
    fn offset(&self, x: i32, y: i32) -> usize {
        y as usize * self.pitch + x as usize * self.bpp()
    }

    // ==========================================================================
    // Observers
    // ==========================================================================

    /// Register a flag to be set whenever the pixels change.
    pub fn attach_observer(&mut self, flag: &Arc<DirtyFlag>) {
        self.observers.retain(|w| w.strong_count() > 0);
        if !self.observers.iter().any(|w| w.as_ptr() == Arc::as_ptr(flag)) {
            self.observers.push(Arc::downgrade(flag));
        }
    }

    pub fn detach_observer(&mut self, flag: &Arc<DirtyFlag>) {
        self.observers
            .retain(|w| w.strong_count() > 0 && w.as_ptr() != Arc::as_ptr(flag));
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.observers.iter().filter(|w| w.strong_count() > 0).count()
    }

    fn notify_dirty(&mut self) {
        self.observers.retain(|w| match w.upgrade() {
            Some(flag) => {
                flag.set();
                true
            }
            None => false,
        });
    }

    fn replace_pixels(&mut self, other: Bitmap) {
        self.width = other.width;
        self.height = other.height;
        self.pitch = other.pitch;
        self.pixels = other.pixels;
        self.notify_dirty();
    }

    // ==========================================================================
    // Blits
    // ==========================================================================

    fn composite(&mut self, x: i32, y: i32, src: &Bitmap, src_rect: Rect, mode: RowMode) {
        let Some((dst_rect, src_rect)) = clip_blit(x, y, src_rect, src.rect(), self.rect()) else {
            return;
        };
        let (w, h) = (dst_rect.width as usize, dst_rect.height as usize);
        let (sp, dp, sb, db) = (src.pitch, self.pitch, src.bpp(), self.bpp());

        with_row_ops!(src.format, self.format, |ops| {
            let mut px = self.lock();
            for row in 0..h {
                let s = (src_rect.y as usize + row) * sp + src_rect.x as usize * sb;
                let d = (dst_rect.y as usize + row) * dp + dst_rect.x as usize * db;
                let (d_row, s_row) = (&mut px[d..], &src.pixels[s..]);
                match mode {
                    RowMode::Opacity(opacity) => ops.opacity_blit(d_row, s_row, w, opacity),
                    RowMode::Add(opacity) => ops.add_blit(d_row, s_row, w, opacity),
                    RowMode::Sub(opacity) => ops.sub_blit(d_row, s_row, w, opacity),
                    RowMode::Mask => ops.mask_blit(d_row, s_row, w),
                }
            }
        });
    }

    /// Alpha-composite `src_rect` of `src` at `(x, y)`.
    pub fn blit(&mut self, x: i32, y: i32, src: &Bitmap, src_rect: Rect, opacity: u8) {
        if opacity > 0 {
            self.composite(x, y, src, src_rect, RowMode::Opacity(opacity));
        }
    }

    pub fn add_blit(&mut self, x: i32, y: i32, src: &Bitmap, src_rect: Rect, opacity: u8) {
        if opacity > 0 {
            self.composite(x, y, src, src_rect, RowMode::Add(opacity));
        }
    }

    pub fn sub_blit(&mut self, x: i32, y: i32, src: &Bitmap, src_rect: Rect, opacity: u8) {
        if opacity > 0 {
            self.composite(x, y, src, src_rect, RowMode::Sub(opacity));
        }
    }

    /// Lower destination alpha to the source alpha wherever the source is
    /// more transparent.
    pub fn mask_blit(&mut self, x: i32, y: i32, src: &Bitmap, src_rect: Rect) {
        self.composite(x, y, src, src_rect, RowMode::Mask);
    }

    /// Blit `src_rect` scaled to fill `dst_rect`, nearest neighbour.
    pub fn stretch_blit(&mut self, dst_rect: Rect, src: &Bitmap, src_rect: Rect, opacity: u8) {
        if dst_rect.is_empty() || opacity == 0 {
            return;
        }
        let src_rect = src_rect.get_sub_rect(src.rect());
        let mut clip = dst_rect;
        if src_rect.is_empty() || !clip.adjust(self.width, self.height) {
            return;
        }

        let step = (((src_rect.width as u64) << FRAC_BITS) / dst_rect.width as u64) as u32;
        let skip_x = (clip.x as i64 - dst_rect.x as i64) as u64;
        let start = (skip_x * step as u64) as u32;
        let (w, dh) = (clip.width as usize, dst_rect.height as i64);
        let (sp, dp, sb, db) = (src.pitch, self.pitch, src.bpp(), self.bpp());

        with_row_ops!(src.format, self.format, |ops| {
            let mut px = self.lock();
            for y in clip.y..clip.y + clip.height {
                let row = y as i64 - dst_rect.y as i64;
                let sy = (src_rect.y as i64 + row * src_rect.height as i64 / dh) as usize;
                let s = sy * sp + src_rect.x as usize * sb;
                let d = y as usize * dp + clip.x as usize * db;
                ops.opacity_scale_blit(&mut px[d..], &src.pixels[s..], w, start, step, opacity);
            }
        });
    }

    /// Repeat `src_rect` of `src` across `dst_rect`, scrolled by `(ox, oy)`.
    pub fn tiled_blit(&mut self, src_rect: Rect, src: &Bitmap, dst_rect: Rect, ox: i32, oy: i32, opacity: u8) {
        let mut src_rect = src_rect;
        if opacity == 0 || !src_rect.adjust(src.width, src.height) {
            return;
        }
        let clip = dst_rect.get_sub_rect(self.rect());
        if clip.is_empty() {
            return;
        }

        let (sw, sh) = (src_rect.width as i64, src_rect.height as i64);
        let (cx, cy) = (clip.x as i64, clip.y as i64);
        let (cr, cb) = (cx + clip.width as i64, cy + clip.height as i64);
        let start_x = dst_rect.x as i64 - (ox as i64).rem_euclid(sw);
        let start_y = dst_rect.y as i64 - (oy as i64).rem_euclid(sh);
        let first_x = start_x + (cx - start_x) / sw * sw;
        let mut ty = start_y + (cy - start_y) / sh * sh;

        while ty < cb {
            let mut tx = first_x;
            while tx < cr {
                let (x0, y0) = (tx.max(cx), ty.max(cy));
                let (x1, y1) = ((tx + sw).min(cr), (ty + sh).min(cb));
                if x1 > x0 && y1 > y0 {
                    let part = Rect::new(
                        (src_rect.x as i64 + x0 - tx) as i32,
                        (src_rect.y as i64 + y0 - ty) as i32,
                        (x1 - x0) as i32,
                        (y1 - y0) as i32,
                    );
                    self.blit(x0 as i32, y0 as i32, src, part, opacity);
                }
                tx += sw;
            }
            ty += sh;
        }
    }

    /// Draw `src_rect` of `src` into `dst_rect` through an affine map.
    ///
    /// `inverse` maps destination coordinates back into source space.
    pub fn transform_blit(&mut self, dst_rect: Rect, src: &Bitmap, src_rect: Rect, inverse: &Matrix, opacity: u8) {
        let (mut dst_rect, mut src_rect) = (dst_rect, src_rect);
        if opacity == 0 || !dst_rect.adjust(self.width, self.height) || !src_rect.adjust(src.width, src.height) {
            return;
        }
        with_row_ops!(src.format, self.format, |ops| {
            let pitch = self.pitch;
            let mut px = self.lock();
            ops.transform_blit(&mut px[..], pitch, dst_rect, &src.pixels, src.pitch, src_rect, inverse, opacity);
        });
    }

    // ==========================================================================
    // Fills
    // ==========================================================================

    pub fn fill(&mut self, color: Color) {
        self.fill_rect(self.rect(), color);
    }

    /// Replace every pixel of `rect` with `color`; no blending.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        let mut rect = rect;
        if !rect.adjust(self.width, self.height) {
            return;
        }
        let (bpp, pitch) = (self.bpp(), self.pitch);
        let mut pattern = [0u8; 4];
        self.format
            .set_rgba(&mut pattern, color.red, color.green, color.blue, color.alpha);
        let pattern = &pattern[..bpp];

        let mut px = self.lock();
        for y in rect.y..rect.bottom() {
            let start = y as usize * pitch + rect.x as usize * bpp;
            let row = &mut px[start..start + rect.width as usize * bpp];
            for dst in row.chunks_exact_mut(bpp) {
                dst.copy_from_slice(pattern);
            }
        }
    }

    pub fn clear(&mut self) {
        self.fill(Color::TRANSPARENT);
    }

    pub fn clear_rect(&mut self, rect: Rect) {
        self.fill_rect(rect, Color::TRANSPARENT);
    }

    // ==========================================================================
    // Color effects
    // ==========================================================================

    fn apply_in_place(&mut self, rect: Rect, op: RegionOp) {
        let mut rect = rect;
        if !rect.adjust(self.width, self.height) {
            return;
        }
        let (w, pitch, bpp, format) = (rect.width as usize, self.pitch, self.bpp(), self.format);
        with_row_ops!(format, format, |ops| {
            let mut px = self.lock();
            for y in rect.y..rect.bottom() {
                let row = &mut px[y as usize * pitch + rect.x as usize * bpp..];
                match op {
                    RegionOp::Hsl {
                        hue,
                        sat,
                        lum,
                        loff,
                    } => ops.hsl_in_place(row, w, hue, sat, lum, loff),
                    RegionOp::Tone(tone) => ops.tone_in_place(row, w, tone),
                    RegionOp::Opacity(opacity) => ops.opacity_change_in_place(row, w, opacity),
                    RegionOp::BlendColor(color) => ops.blend_color_in_place(row, w, color),
                }
            }
        });
    }

    /// Rotate hue by `hue` degrees, scale saturation and lightness, and add
    /// `loff` to lightness, within `rect`.
    pub fn hsl_change(&mut self, hue: i32, sat: f64, lum: f64, loff: f64, rect: Rect) {
        if hue.rem_euclid(360) == 0 && sat == 1.0 && lum == 1.0 && loff == 0.0 {
            return;
        }
        self.apply_in_place(
            rect,
            RegionOp::Hsl {
                hue,
                sat,
                lum,
                loff,
            },
        );
    }

    pub fn hue_change(&mut self, hue: i32) {
        self.hsl_change(hue, 1.0, 1.0, 0.0, self.rect());
    }

    pub fn sat_change(&mut self, sat: f64) {
        self.hsl_change(0, sat, 1.0, 0.0, self.rect());
    }

    pub fn lum_change(&mut self, lum: f64) {
        self.hsl_change(0, 1.0, lum, 0.0, self.rect());
    }

    pub fn tone_change(&mut self, tone: Tone) {
        self.tone_change_rect(tone, self.rect());
    }

    pub fn tone_change_rect(&mut self, tone: Tone, rect: Rect) {
        if !tone.is_identity() {
            self.apply_in_place(rect, RegionOp::Tone(tone));
        }
    }

    /// Mix every visible pixel toward `color` by `color.alpha / 255`.
    pub fn blend_color(&mut self, color: Color) {
        if color.alpha > 0 {
            self.apply_in_place(self.rect(), RegionOp::BlendColor(color));
        }
    }

    /// Make every pixel whose RGB equals `color` fully transparent.
    pub fn set_transparent(&mut self, color: Color) {
        let (w, h, pitch, bpp, format) = (self.width, self.height, self.pitch, self.bpp(), self.format);
        let mut px = self.lock();
        for y in 0..h as usize {
            for x in 0..w as usize {
                let p = &mut px[y * pitch + x * bpp..];
                let (r, g, b, _) = format.get_rgba(p);
                if color.same_rgb(Color::rgb(r, g, b)) {
                    format.set_alpha(p, 0);
                }
            }
        }
    }

    /// Scale alpha by `opacity`; the bottom `bush_depth` rows use half of it.
    pub fn opacity_change(&mut self, opacity: u8, bush_depth: i32) {
        self.opacity_change_bands(opacity, opacity / 2, bush_depth);
    }

    /// Scale alpha by `top` above the bush band and by `bush` inside it.
    pub fn opacity_change_bands(&mut self, top: u8, bush: u8, bush_depth: i32) {
        let start = (self.height - bush_depth.max(0)).clamp(0, self.height);
        if top < 255 && start > 0 {
            self.apply_in_place(Rect::new(0, 0, self.width, start), RegionOp::Opacity(top));
        }
        if bush < 255 && start < self.height {
            self.apply_in_place(
                Rect::new(0, start, self.width, self.height - start),
                RegionOp::Opacity(bush),
            );
        }
    }

    // ==========================================================================
    // Geometry
    // ==========================================================================

    /// Mirror the whole bitmap in place.
    pub fn flip(&mut self, flip_x: bool, flip_y: bool) {
        if !flip_x && !flip_y {
            return;
        }
        let (w, h, pitch, bpp) = (self.width as usize, self.height as usize, self.pitch, self.bpp());
        let mut px = self.lock();
        match (flip_x, flip_y) {
            (true, false) => flip_h(&mut px[..], pitch, w, h, bpp),
            (false, true) => flip_v(&mut px[..], pitch, w, h, bpp),
            _ => flip_hv(&mut px[..], pitch, w, h, bpp),
        }
    }

    /// Nearest-neighbour copy of `src_rect` scaled to `width x height`.
    pub fn resample(&self, width: i32, height: i32, src_rect: Rect) -> Result<Bitmap> {
        let mut out = Bitmap::with_format(self.format, width, height)?;
        out.font = self.font.clone();
        let src_rect = src_rect.get_sub_rect(self.rect());
        if src_rect.is_empty() {
            return Ok(out);
        }

        let step = (((src_rect.width as u64) << FRAC_BITS) / width as u64) as u32;
        let (sp, op, bpp) = (self.pitch, out.pitch, self.bpp());
        let (w, h) = (width as usize, height as i64);
        with_row_ops!(self.format, self.format, |ops| {
            let mut px = out.lock();
            for y in 0..h {
                let sy = (src_rect.y as i64 + y * src_rect.height as i64 / h) as usize;
                let src = &self.pixels[sy * sp + src_rect.x as usize * bpp..];
                ops.copy_scale_blit(&mut px[y as usize * op..], src, w, 0, step);
            }
        });
        Ok(out)
    }

    /// Scale in place; factors that round to an empty size are ignored.
    pub fn zoom(&mut self, zoom_x: f64, zoom_y: f64) {
        let width = (self.width as f64 * zoom_x).round() as i32;
        let height = (self.height as f64 * zoom_y).round() as i32;
        if width <= 0 || height <= 0 || (width == self.width && height == self.height) {
            return;
        }
        match self.resample(width, height, self.rect()) {
            Ok(scaled) => self.replace_pixels(scaled),
            Err(err) => log::debug!("zoom skipped: {}", err),
        }
    }

    /// Rotate by `angle` radians and scale, producing a bitmap sized to the
    /// transformed bounding box with the image centred in it.
    pub fn rotate_scale(&self, angle: f64, zoom_x: f64, zoom_y: f64) -> Result<Bitmap> {
        let m = Matrix::rotate_scale(angle, zoom_x, zoom_y, self.width, self.height, 0.0, 0.0);
        let (w, h) = (self.width as f64, self.height as f64);
        let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)].map(|(x, y)| m.transform(x, y));
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        for (x, y) in corners {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let new_w = (max_x - min_x).round() as i32;
        let new_h = (max_y - min_y).round() as i32;

        let forward = Matrix::rotate_scale(
            angle,
            zoom_x,
            zoom_y,
            self.width,
            self.height,
            new_w as f64 / 2.0,
            new_h as f64 / 2.0,
        );
        let inverse = forward.inverse().ok_or(BitmapError::InvalidDimensions {
            width: new_w,
            height: new_h,
        })?;
        let mut out = Bitmap::with_format(self.format, new_w, new_h)?;
        out.font = self.font.clone();
        out.transform_blit(out.rect(), self, self.rect(), &inverse, 255);
        Ok(out)
    }

    /// Rotate in place by `angle` radians; the bitmap grows to fit.
    pub fn rotate(&mut self, angle: f64) {
        if angle == 0.0 {
            return;
        }
        match self.rotate_scale(angle, 1.0, 1.0) {
            Ok(rotated) => self.replace_pixels(rotated),
            Err(err) => log::debug!("rotate skipped: {}", err),
        }
    }

    /// Horizontal sine-wave distortion.
    ///
    /// The result is `2 * depth` pixels wider; row `y` is shifted right by
    /// `depth + round(depth * sin(phase + 11.25 * y))` with angles in degrees.
    pub fn waver(&self, depth: i32, phase: f64) -> Result<Bitmap> {
        if depth <= 0 {
            return Ok(self.clone());
        }
        let mut out = Bitmap::with_format(self.format, self.width + 2 * depth, self.height)?;
        out.font = self.font.clone();
        let (w, sp, op, bpp) = (self.width as usize, self.pitch, out.pitch, self.bpp());
        with_row_ops!(self.format, self.format, |ops| {
            let mut px = out.lock();
            for y in 0..self.height as usize {
                let shift = (depth as f64 * (phase + 11.25 * y as f64).to_radians().sin()).round() as i32;
                let offset = (depth + shift) as usize;
                ops.copy_blit(&mut px[y * op + offset * bpp..], &self.pixels[y * sp..], w);
            }
        });
        Ok(out)
    }
}
