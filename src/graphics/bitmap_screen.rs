//! Effects stack over a shared bitmap with a lazily rebuilt composite.
//!
//! A `BitmapScreen` registers a [`DirtyFlag`] with its source bitmap. The
//! flag is raised when the source pixels change or when an effect setter
//! stores a different value; the next blit rebuilds the composite once:
//!
//! 1. crop to `src_rect` and mirror
//! 2. tone, then blend color
//! 3. opacity with the bush band
//! 4. rotate and zoom (or zoom alone)
//! 5. wave distortion
//!
//! Rotation and waving shift the composite's origin; blits subtract it so
//! the sprite stays anchored.

use std::sync::Arc;

use crate::graphics::bitmap::{Bitmap, DirtyFlag, SharedBitmap};
use crate::graphics::types::{Color, Rect, Tone};

/// How the composite is combined with the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendType {
    #[default]
    Normal,
    Additive,
    Subtractive,
}

/// Every effect a screen applies.
#[derive(Debug, Clone, PartialEq)]
pub struct Effects {
    /// `None` uses the whole bitmap.
    pub src_rect: Option<Rect>,
    pub opacity_top: u8,
    pub opacity_bottom: u8,
    pub bush_depth: i32,
    pub tone: Tone,
    pub flip_x: bool,
    pub flip_y: bool,
    pub zoom_x: f64,
    pub zoom_y: f64,
    /// Radians.
    pub angle: f64,
    pub blend_type: BlendType,
    pub blend_color: Color,
    pub waver_depth: i32,
    /// Degrees.
    pub waver_phase: f64,
}

impl Default for Effects {
    fn default() -> Self {
        Self {
            src_rect: None,
            opacity_top: 255,
            opacity_bottom: 128,
            bush_depth: 0,
            tone: Tone::default(),
            flip_x: false,
            flip_y: false,
            zoom_x: 1.0,
            zoom_y: 1.0,
            angle: 0.0,
            blend_type: BlendType::Normal,
            blend_color: Color::TRANSPARENT,
            waver_depth: 0,
            waver_phase: 0.0,
        }
    }
}

/// Generates a setter that only raises the dirty flag on change, plus a getter.
macro_rules! effect_accessors {
    ($($(#[$doc:meta])* $field:ident: $ty:ty => $set:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $set(&mut self, value: $ty) {
                if self.effects.$field != value {
                    self.effects.$field = value;
                    self.dirty.set();
                }
            }

            pub fn $field(&self) -> $ty {
                self.effects.$field
            }
        )*
    };
}

/// A bitmap plus the effects it is drawn with.
pub struct BitmapScreen {
    bitmap: Option<SharedBitmap>,
    dirty: Arc<DirtyFlag>,
    effects: Effects,
    composite: Option<Bitmap>,
    origin_x: i32,
    origin_y: i32,
    refresh_count: u64,
}

impl std::fmt::Debug for BitmapScreen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitmapScreen")
            .field("has_bitmap", &self.bitmap.is_some())
            .field("dirty", &self.dirty.is_set())
            .field("effects", &self.effects)
            .field("origin", &(self.origin_x, self.origin_y))
            .field("refresh_count", &self.refresh_count)
            .finish()
    }
}

impl Default for BitmapScreen {
    fn default() -> Self {
        Self::new(None)
    }
}

impl BitmapScreen {
    pub fn new(bitmap: Option<SharedBitmap>) -> Self {
        let mut screen = Self {
            bitmap: None,
            dirty: Arc::new(DirtyFlag::new(true)),
            effects: Effects::default(),
            composite: None,
            origin_x: 0,
            origin_y: 0,
            refresh_count: 0,
        };
        screen.set_bitmap(bitmap);
        screen
    }

    /// Screen that exclusively owns `bitmap`.
    pub fn from_bitmap(bitmap: Bitmap) -> Self {
        Self::new(Some(bitmap.into_shared()))
    }

    pub fn bitmap(&self) -> Option<&SharedBitmap> {
        self.bitmap.as_ref()
    }

    /// Swap the source bitmap, moving the dirty registration along.
    pub fn set_bitmap(&mut self, bitmap: Option<SharedBitmap>) {
        if let Some(old) = self.bitmap.take() {
            old.lock().detach_observer(&self.dirty);
        }
        if let Some(new) = &bitmap {
            new.lock().attach_observer(&self.dirty);
        }
        self.bitmap = bitmap;
        self.dirty.set();
    }

    pub fn effects(&self) -> &Effects {
        &self.effects
    }

    /// Restore every effect to its default.
    pub fn clear_effects(&mut self) {
        if self.effects != Effects::default() {
            self.effects = Effects::default();
            self.dirty.set();
        }
    }

    pub fn needs_refresh(&self) -> bool {
        self.dirty.is_set()
    }

    /// Force a rebuild on the next blit.
    pub fn set_dirty(&mut self) {
        self.dirty.set();
    }

    /// Number of composite rebuilds so far.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    pub fn origin(&self) -> (i32, i32) {
        (self.origin_x, self.origin_y)
    }

    effect_accessors! {
        src_rect: Option<Rect> => set_src_rect;
        opacity_top: u8 => set_opacity_top_effect;
        /// Opacity factor applied inside the bush band, relative to the top.
        opacity_bottom: u8 => set_opacity_bottom_effect;
        bush_depth: i32 => set_bush_depth_effect;
        tone: Tone => set_tone_effect;
        flip_x: bool => set_flip_x_effect;
        flip_y: bool => set_flip_y_effect;
        zoom_x: f64 => set_zoom_x_effect;
        zoom_y: f64 => set_zoom_y_effect;
        /// Rotation in radians.
        angle: f64 => set_angle_effect;
        blend_type: BlendType => set_blend_type_effect;
        blend_color: Color => set_blend_color_effect;
        waver_depth: i32 => set_waver_depth_effect;
        /// Wave phase in degrees.
        waver_phase: f64 => set_waver_phase_effect;
    }

    pub fn set_opacity_effect(&mut self, top: u8, bottom: u8) {
        self.set_opacity_top_effect(top);
        self.set_opacity_bottom_effect(bottom);
    }

    pub fn set_zoom_effect(&mut self, zoom_x: f64, zoom_y: f64) {
        self.set_zoom_x_effect(zoom_x);
        self.set_zoom_y_effect(zoom_y);
    }

    pub fn set_flip_effect(&mut self, flip_x: bool, flip_y: bool) {
        self.set_flip_x_effect(flip_x);
        self.set_flip_y_effect(flip_y);
    }

    /// The composite, rebuilt first if anything changed. `None` when there is
    /// nothing to draw.
    pub fn composited(&mut self) -> Option<&Bitmap> {
        self.refresh_if_dirty();
        self.composite.as_ref()
    }

    /// Draw the composite with its top-left at `(x, y)` minus the origin.
    ///
    /// The source bitmap is locked during a rebuild, so `dst` must not be the
    /// same bitmap.
    pub fn blit_screen(&mut self, dst: &mut Bitmap, x: i32, y: i32) {
        self.refresh_if_dirty();
        let Some(composite) = &self.composite else {
            return;
        };
        let (x, y) = (x - self.origin_x, y - self.origin_y);
        let rect = composite.rect();
        match self.effects.blend_type {
            BlendType::Normal => dst.blit(x, y, composite, rect, 255),
            BlendType::Additive => dst.add_blit(x, y, composite, rect, 255),
            BlendType::Subtractive => dst.sub_blit(x, y, composite, rect, 255),
        }
    }

    /// Tile the composite across `dst_rect`, scrolled by `(ox, oy)`.
    pub fn blit_screen_tiled(&mut self, dst: &mut Bitmap, src_rect: Rect, dst_rect: Rect, ox: i32, oy: i32) {
        self.refresh_if_dirty();
        if let Some(composite) = &self.composite {
            dst.tiled_blit(src_rect, composite, dst_rect, ox, oy, 255);
        }
    }

    fn refresh_if_dirty(&mut self) {
        if self.dirty.take() {
            self.refresh();
        }
    }

    fn refresh(&mut self) {
        self.refresh_count += 1;
        self.origin_x = 0;
        self.origin_y = 0;
        self.composite = self.build_composite();
        log::debug!(
            "bitmap screen rebuilt (#{}, origin {},{})",
            self.refresh_count,
            self.origin_x,
            self.origin_y
        );
    }

    fn build_composite(&mut self) -> Option<Bitmap> {
        let fx = self.effects.clone();
        let mut bitmap = {
            let source = self.bitmap.as_ref()?.lock();
            let src_rect = fx.src_rect.unwrap_or_else(|| source.rect());
            Bitmap::from_region_flipped(&source, src_rect, fx.flip_x, fx.flip_y).ok()?
        };

        bitmap.tone_change(fx.tone);
        bitmap.blend_color(fx.blend_color);

        let bush = (fx.opacity_top as u32 * fx.opacity_bottom as u32 / 255) as u8;
        bitmap.opacity_change_bands(fx.opacity_top, bush, fx.bush_depth);

        let zoomed_w = (bitmap.width() as f64 * fx.zoom_x.abs()).round() as i32;
        let zoomed_h = (bitmap.height() as f64 * fx.zoom_y.abs()).round() as i32;
        if zoomed_w <= 0 || zoomed_h <= 0 {
            return None;
        }
        if fx.angle != 0.0 {
            bitmap = bitmap.rotate_scale(fx.angle, fx.zoom_x, fx.zoom_y).ok()?;
            self.origin_x = (bitmap.width() - zoomed_w) / 2;
            self.origin_y = (bitmap.height() - zoomed_h) / 2;
        } else if zoomed_w != bitmap.width() || zoomed_h != bitmap.height() {
            bitmap = bitmap.resample(zoomed_w, zoomed_h, bitmap.rect()).ok()?;
        }

        if fx.waver_depth > 0 {
            bitmap = bitmap.waver(fx.waver_depth, fx.waver_phase).ok()?;
            self.origin_x += fx.waver_depth;
        }
        Some(bitmap)
    }
}

impl Drop for BitmapScreen {
    fn drop(&mut self) {
        if let Some(bitmap) = &self.bitmap {
            // a dead flag is pruned on the next notify anyway
            if let Some(mut bitmap) = bitmap.try_lock() {
                bitmap.detach_observer(&self.dirty);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::pixel_format::DynamicFormat;

    fn shared(width: i32, height: i32, color: Color) -> SharedBitmap {
        let mut bitmap = Bitmap::with_format(DynamicFormat::rgba8888(), width, height).unwrap();
        bitmap.fill(color);
        bitmap.into_shared()
    }

    fn canvas(width: i32, height: i32) -> Bitmap {
        Bitmap::with_format(DynamicFormat::rgba8888(), width, height).unwrap()
    }

    #[test]
    fn test_new_screen_is_dirty() {
        let screen = BitmapScreen::new(Some(shared(2, 2, Color::WHITE)));
        assert!(screen.needs_refresh());
        assert_eq!(screen.refresh_count(), 0);
    }

    #[test]
    fn test_same_value_does_not_dirty() {
        let mut screen = BitmapScreen::new(Some(shared(2, 2, Color::WHITE)));
        screen.composited();
        assert!(!screen.needs_refresh());

        screen.set_opacity_top_effect(255);
        screen.set_zoom_effect(1.0, 1.0);
        screen.set_tone_effect(Tone::default());
        screen.set_flip_effect(false, false);
        screen.set_src_rect(None);
        screen.clear_effects();
        assert!(!screen.needs_refresh());

        screen.set_angle_effect(0.5);
        assert!(screen.needs_refresh());
        assert_eq!(screen.angle(), 0.5);
    }

    #[test]
    fn test_source_mutation_dirties() {
        let bitmap = shared(2, 2, Color::WHITE);
        let mut screen = BitmapScreen::new(Some(bitmap.clone()));
        screen.composited();
        bitmap.lock().fill(Color::BLACK);
        assert!(screen.needs_refresh());
        assert_eq!(screen.composited().and_then(|b| b.get_pixel(0, 0)), Some(Color::BLACK));
    }

    #[test]
    fn test_drop_detaches() {
        let bitmap = shared(2, 2, Color::WHITE);
        let screen = BitmapScreen::new(Some(bitmap.clone()));
        assert_eq!(bitmap.lock().observer_count(), 1);
        drop(screen);
        assert_eq!(bitmap.lock().observer_count(), 0);
    }

    #[test]
    fn test_set_bitmap_moves_registration() {
        let a = shared(2, 2, Color::WHITE);
        let b = shared(2, 2, Color::BLACK);
        let mut screen = BitmapScreen::new(Some(a.clone()));
        screen.set_bitmap(Some(b.clone()));
        assert_eq!(a.lock().observer_count(), 0);
        assert_eq!(b.lock().observer_count(), 1);
        screen.set_bitmap(None);
        assert!(screen.composited().is_none());
    }

    #[test]
    fn test_src_rect_and_flip() {
        let bitmap = shared(4, 1, Color::WHITE);
        bitmap.lock().set_pixel(1, 0, Color::rgb(1, 0, 0));
        bitmap.lock().set_pixel(2, 0, Color::rgb(2, 0, 0));
        let mut screen = BitmapScreen::new(Some(bitmap));
        screen.set_src_rect(Some(Rect::new(1, 0, 2, 1)));
        screen.set_flip_x_effect(true);
        let out = screen.composited().unwrap();
        assert_eq!(out.width(), 2);
        assert_eq!(out.get_pixel(0, 0), Some(Color::rgb(2, 0, 0)));
    }

    #[test]
    fn test_bush_band_uses_bottom_factor() {
        let mut screen = BitmapScreen::new(Some(shared(1, 4, Color::WHITE)));
        screen.set_opacity_effect(200, 128);
        screen.set_bush_depth_effect(2);
        let out = screen.composited().unwrap();
        let alphas: Vec<u8> = (0..4).map(|y| out.get_pixel(0, y).unwrap().alpha).collect();
        // 200 * 128 / 255 = 100
        assert_eq!(alphas, vec![200, 200, 100, 100]);
    }

    #[test]
    fn test_degenerate_zoom_draws_nothing() {
        let mut screen = BitmapScreen::new(Some(shared(4, 4, Color::WHITE)));
        screen.set_zoom_effect(0.0, 1.0);
        assert!(screen.composited().is_none());
        let mut dst = canvas(4, 4);
        screen.blit_screen(&mut dst, 0, 0);
        assert!(dst.to_rgba().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_rotation_recenters() {
        let mut screen = BitmapScreen::new(Some(shared(4, 2, Color::WHITE)));
        screen.set_angle_effect(std::f64::consts::FRAC_PI_2);
        let (w, h) = screen.composited().map(|b| (b.width(), b.height())).unwrap();
        assert_eq!((w, h), (2, 4));
        assert_eq!(screen.origin(), (-1, 1));
    }

    #[test]
    fn test_waver_shifts_origin() {
        let mut screen = BitmapScreen::new(Some(shared(4, 2, Color::WHITE)));
        screen.set_waver_depth_effect(3);
        assert_eq!(screen.composited().map(|b| b.width()), Some(10));
        assert_eq!(screen.origin(), (3, 0));

        let mut dst = canvas(10, 2);
        screen.blit_screen(&mut dst, 3, 0);
        assert_eq!(dst.get_pixel(3, 0), Some(Color::WHITE));
        assert_eq!(dst.get_pixel(2, 0), Some(Color::TRANSPARENT));
    }

    #[test]
    fn test_blend_types() {
        let mut screen = BitmapScreen::new(Some(shared(1, 1, Color::rgb(50, 50, 50))));
        let mut dst = canvas(1, 1);
        dst.fill(Color::rgb(100, 100, 100));

        screen.set_blend_type_effect(BlendType::Additive);
        screen.blit_screen(&mut dst, 0, 0);
        assert_eq!(dst.get_pixel(0, 0), Some(Color::rgb(150, 150, 150)));

        screen.set_blend_type_effect(BlendType::Subtractive);
        screen.blit_screen(&mut dst, 0, 0);
        screen.blit_screen(&mut dst, 0, 0);
        assert_eq!(dst.get_pixel(0, 0), Some(Color::rgb(50, 50, 50)));
    }

    #[test]
    fn test_tiled_blit_screen() {
        let mut screen = BitmapScreen::new(Some(shared(2, 2, Color::WHITE)));
        let mut dst = canvas(5, 5);
        screen.blit_screen_tiled(&mut dst, Rect::sized(2, 2), Rect::sized(5, 5), 0, 0);
        assert_eq!(dst.get_pixel(4, 4), Some(Color::WHITE));
        assert_eq!(screen.refresh_count(), 1);
    }
}
