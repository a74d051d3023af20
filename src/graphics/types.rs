//! Geometry and color value types shared by the bitmap engine.
//!
//! - `Rect`: integer rectangle with clipping helpers
//! - `Color`: non-premultiplied RGBA8 color
//! - `Tone`: additive RGB shift plus gray desaturation
//! - `Matrix`: 2D affine transform used by rotation/scale blits

use std::ops::Mul;

// ==============================================================================
// Rect
// ==============================================================================

/// Integer rectangle.
///
/// A rect with a non-positive width or height is empty; every operation that
/// takes an empty rect does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rect covering `(0, 0)..(width, height)`.
    pub const fn sized(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Exclusive right edge, saturating at `i32::MAX`.
    pub const fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge, saturating at `i32::MAX`.
    pub const fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    const fn right_wide(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    const fn bottom_wide(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && (x as i64) < self.right_wide() && y >= self.y && (y as i64) < self.bottom_wide()
    }

    /// True when no part of the rect lies inside `(0, 0)..(max_width, max_height)`.
    pub const fn is_out_of_bounds(&self, max_width: i32, max_height: i32) -> bool {
        self.is_empty()
            || self.x >= max_width
            || self.y >= max_height
            || self.right_wide() <= 0
            || self.bottom_wide() <= 0
    }

    /// Clamp the rect in place to `(0, 0)..(max_width, max_height)`.
    ///
    /// Returns false if nothing is left to draw.
    pub fn adjust(&mut self, max_width: i32, max_height: i32) -> bool {
        if self.is_out_of_bounds(max_width, max_height) {
            return false;
        }
        let left = self.x.max(0);
        let top = self.y.max(0);
        let right = self.right_wide().min(max_width as i64);
        let bottom = self.bottom_wide().min(max_height as i64);
        // both edges now lie within 0..=max, so the spans fit in i32
        *self = Rect::new(left, top, (right - left as i64) as i32, (bottom - top as i64) as i32);
        !self.is_empty()
    }

    /// Intersection of `self` with `other`. Empty when they do not overlap.
    pub fn get_sub_rect(&self, other: Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right_wide().min(other.right_wide());
        let bottom = self.bottom_wide().min(other.bottom_wide());
        let span = |from: i32, to: i64| (to - from as i64).clamp(0, i32::MAX as i64) as i32;
        Rect::new(x, y, span(x, right), span(y, bottom))
    }
}

// ==============================================================================
// Color
// ==============================================================================

/// Non-premultiplied RGBA color. Alpha 0 is fully transparent, 255 opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl Color {
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const WHITE: Self = Self::new(255, 255, 255, 255);

    pub const fn new(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self::new(red, green, blue, 255)
    }

    pub const fn to_rgba(self) -> (u8, u8, u8, u8) {
        (self.red, self.green, self.blue, self.alpha)
    }

    pub const fn same_rgb(self, other: Color) -> bool {
        self.red == other.red && self.green == other.green && self.blue == other.blue
    }
}

// ==============================================================================
// Tone
// ==============================================================================

/// Color adjustment: additive RGB shift then a blend toward gray.
///
/// `Tone::default()` is the identity and is skipped by every tone operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tone {
    /// -255..=255
    pub red: i16,
    /// -255..=255
    pub green: i16,
    /// -255..=255
    pub blue: i16,
    /// 0 keeps colors, 255 is full grayscale.
    pub gray: u8,
}

impl Tone {
    pub fn new(red: i16, green: i16, blue: i16, gray: u8) -> Self {
        Self {
            red: red.clamp(-255, 255),
            green: green.clamp(-255, 255),
            blue: blue.clamp(-255, 255),
            gray,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Tone::default()
    }
}

// ==============================================================================
// Matrix
// ==============================================================================

/// 2D affine transform.
///
/// ```text
///   | xx  xy  x0 |
///   | yx  yy  y0 |
///   |  0   0   1 |
/// ```
///
/// `x' = xx*x + xy*y + x0`, `y' = yx*x + yy*y + y0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub xx: f64,
    pub yx: f64,
    pub xy: f64,
    pub yy: f64,
    pub x0: f64,
    pub y0: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub const fn new(xx: f64, yx: f64, xy: f64, yy: f64, x0: f64, y0: f64) -> Self {
        Self {
            xx,
            yx,
            xy,
            yy,
            x0,
            y0,
        }
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub const fn translation(dx: f64, dy: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, dx, dy)
    }

    pub const fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation by `angle` radians (clockwise on screen, y axis down).
    pub fn rotation(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// Apply `self` first, then `next`.
    pub fn then(&self, next: &Matrix) -> Matrix {
        Matrix {
            xx: next.xx * self.xx + next.xy * self.yx,
            yx: next.yx * self.xx + next.yy * self.yx,
            xy: next.xx * self.xy + next.xy * self.yy,
            yy: next.yx * self.xy + next.yy * self.yy,
            x0: next.xx * self.x0 + next.xy * self.y0 + next.x0,
            y0: next.yx * self.x0 + next.yy * self.y0 + next.y0,
        }
    }

    pub fn determinant(&self) -> f64 {
        self.xx * self.yy - self.xy * self.yx
    }

    /// Inverse transform, or `None` for a degenerate (zero-scale) matrix.
    pub fn inverse(&self) -> Option<Matrix> {
        let det = self.determinant();
        if det.abs() < 1e-12 {
            return None;
        }
        let inv = 1.0 / det;
        let xx = self.yy * inv;
        let yx = -self.yx * inv;
        let xy = -self.xy * inv;
        let yy = self.xx * inv;
        Some(Matrix {
            xx,
            yx,
            xy,
            yy,
            x0: -(xx * self.x0 + xy * self.y0),
            y0: -(yx * self.x0 + yy * self.y0),
        })
    }

    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.xx * x + self.xy * y + self.x0,
            self.yx * x + self.yy * y + self.y0,
        )
    }

    /// Transform that scales and rotates a `width x height` image about its
    /// center and places that center at `(dst_cx, dst_cy)`.
    pub fn rotate_scale(
        angle: f64,
        zoom_x: f64,
        zoom_y: f64,
        width: i32,
        height: i32,
        dst_cx: f64,
        dst_cy: f64,
    ) -> Matrix {
        Matrix::translation(-(width as f64) / 2.0, -(height as f64) / 2.0)
            .then(&Matrix::scale(zoom_x, zoom_y))
            .then(&Matrix::rotation(angle))
            .then(&Matrix::translation(dst_cx, dst_cy))
    }
}

impl Mul for Matrix {
    type Output = Matrix;

    /// `a * b` applies `b` first, then `a`.
    fn mul(self, rhs: Matrix) -> Matrix {
        rhs.then(&self)
    }
}
