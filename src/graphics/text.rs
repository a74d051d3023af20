//! Text drawing and measurement on bitmaps.
//!
//! Glyph colors come from the "system" graphic: color `c` is the 6x12 swatch
//! at `(8 + 16 * (c % 10), 52 + 16 * (c / 10))`, tiled across the glyph, and
//! the shadow uses the swatch at `(16, 32)`. Without a system graphic text is
//! white on a black shadow.
//!
//! `$` followed by an ASCII letter draws a 12x12 icon from the ExFont sheet
//! (13 icons per row, `A`-`Z` then `a`-`z`) instead of text.

use crate::graphics::bitmap::{Bitmap, Result};
use crate::graphics::font::{FontRenderer, Glyph, UniChar};
use crate::graphics::pixel_format::DynamicFormat;
use crate::graphics::types::{Color, Rect};

/// Side of one ExFont icon.
pub const EXFONT_SIZE: i32 = 12;
/// Icons per row of the ExFont sheet.
pub const EXFONT_COLUMNS: i32 = 13;
/// Shrunk text never gets narrower than this share of its natural width.
pub const DEFAULT_SHRINK_RATIO: f64 = 0.4;

const SWATCH_WIDTH: i32 = 6;
const SWATCH_HEIGHT: i32 = 12;
const SHADOW_SWATCH: Rect = Rect::new(16, 32, SWATCH_WIDTH, SWATCH_HEIGHT);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Shared graphics text drawing reads from.
#[derive(Debug, Clone, Copy)]
pub struct TextResources<'a> {
    pub system: Option<&'a Bitmap>,
    pub exfont: Option<&'a Bitmap>,
    pub shrink_ratio: f64,
}

impl<'a> TextResources<'a> {
    pub fn new(system: Option<&'a Bitmap>, exfont: Option<&'a Bitmap>) -> Self {
        Self {
            system,
            exfont,
            shrink_ratio: DEFAULT_SHRINK_RATIO,
        }
    }

    pub fn with_shrink_ratio(mut self, ratio: f64) -> Self {
        self.shrink_ratio = ratio;
        self
    }
}

impl Default for TextResources<'_> {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Swatch of the system graphic for text color `color`.
pub fn color_swatch(color: u8) -> Rect {
    let c = color as i32;
    Rect::new(8 + 16 * (c % 10), 4 + 48 + 16 * (c / 10), SWATCH_WIDTH, SWATCH_HEIGHT)
}

/// Icon index for the letter following `$`.
pub fn exfont_index(letter: char) -> Option<i32> {
    match letter {
        'A'..='Z' => Some(letter as i32 - 'A' as i32),
        'a'..='z' => Some(letter as i32 - 'a' as i32 + 26),
        _ => None,
    }
}

/// Location of icon `index` on the ExFont sheet.
pub fn exfont_rect(index: i32) -> Rect {
    Rect::new(
        (index % EXFONT_COLUMNS) * EXFONT_SIZE,
        (index / EXFONT_COLUMNS) * EXFONT_SIZE,
        EXFONT_SIZE,
        EXFONT_SIZE,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece {
    Char(char),
    ExFont(i32),
}

fn pieces(text: &str) -> Vec<Piece> {
    let mut out = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '$' {
            if let Some(index) = chars.peek().copied().and_then(exfont_index) {
                chars.next();
                out.push(Piece::ExFont(index));
                continue;
            }
        }
        out.push(Piece::Char(ch));
    }
    out
}

fn missing_advance(font: &dyn FontRenderer) -> i32 {
    font.height() / 2
}

/// Size of `text` drawn with `font`, without drawing it.
pub fn text_size(font: &dyn FontRenderer, text: &str) -> Rect {
    let mut width = 0;
    let mut height = if text.is_empty() { 0 } else { font.height() };
    for piece in pieces(text) {
        match piece {
            Piece::ExFont(_) => {
                width += EXFONT_SIZE;
                height = height.max(EXFONT_SIZE);
            }
            Piece::Char(ch) => match font.render(ch as UniChar) {
                Some(glyph) => {
                    width += glyph.advance();
                    height = height.max(glyph.height());
                }
                None => width += missing_advance(font),
            },
        }
    }
    Rect::sized(width, height)
}

/// Glyph as a white bitmap whose alpha is the glyph coverage.
fn glyph_mask(glyph: &Glyph, format: DynamicFormat) -> Result<Bitmap> {
    let (w, h) = (glyph.width(), glyph.height());
    let mut rgba = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        for x in 0..w {
            rgba.extend_from_slice(&[255, 255, 255, glyph.coverage(x, y)]);
        }
    }
    Bitmap::from_rgba(format, w, h, &rgba)
}

/// Paint the glyph shape with a system swatch or a solid color.
fn tinted(mask: &Bitmap, system: Option<&Bitmap>, swatch: Rect, fallback: Color) -> Result<Bitmap> {
    let mut out = Bitmap::with_format(mask.format(), mask.width(), mask.height())?;
    match system {
        Some(system) => out.tiled_blit(swatch, system, out.rect(), 0, 0, 255),
        None => out.fill(fallback),
    }
    out.mask_blit(0, 0, mask, mask.rect());
    Ok(out)
}

fn draw_glyph(canvas: &mut Bitmap, x: i32, glyph: &Glyph, color: u8, res: &TextResources<'_>) -> Result<()> {
    if glyph.width() == 0 || glyph.height() == 0 {
        return Ok(());
    }
    let mask = glyph_mask(glyph, canvas.format())?;
    let shadow = tinted(&mask, res.system, SHADOW_SWATCH, Color::BLACK)?;
    canvas.blit(x + 1, 1, &shadow, shadow.rect(), 255);
    let fore = tinted(&mask, res.system, color_swatch(color), Color::WHITE)?;
    canvas.blit(x, 0, &fore, fore.rect(), 255);
    Ok(())
}

impl Bitmap {
    /// Size `text` would occupy in this bitmap's font; empty without a font.
    pub fn text_size(&self, text: &str) -> Rect {
        match self.font() {
            Some(font) => text_size(font.as_ref(), text),
            None => Rect::default(),
        }
    }

    /// Draw `text` into `rect` using this bitmap's font.
    ///
    /// Text wider than `rect` is squeezed horizontally, but never below
    /// `res.shrink_ratio` of its natural width. Nothing is drawn without a
    /// font, for empty text, or for an empty rect.
    pub fn text_draw(&mut self, rect: Rect, text: &str, align: TextAlign, color: u8, res: &TextResources<'_>) {
        let Some(font) = self.font().cloned() else {
            log::debug!("text_draw without a font: {:?}", text);
            return;
        };
        if text.is_empty() || rect.is_empty() {
            return;
        }
        let size = text_size(font.as_ref(), text);
        if size.is_empty() {
            return;
        }
        match self.render_text(font.as_ref(), size, text, color, res) {
            Ok(canvas) => self.place_text(rect, canvas, size.width, align, res.shrink_ratio),
            Err(err) => log::warn!("text_draw failed: {}", err),
        }
    }

    fn render_text(
        &self,
        font: &dyn FontRenderer,
        size: Rect,
        text: &str,
        color: u8,
        res: &TextResources<'_>,
    ) -> Result<Bitmap> {
        // one extra pixel each way for the shadow
        let mut canvas = Bitmap::with_format(self.format(), size.width + 1, size.height + 1)?;
        let mut x = 0;
        for piece in pieces(text) {
            match piece {
                Piece::ExFont(index) => {
                    if let Some(sheet) = res.exfont {
                        canvas.blit(x, 0, sheet, exfont_rect(index), 255);
                    }
                    x += EXFONT_SIZE;
                }
                Piece::Char(ch) => match font.render(ch as UniChar) {
                    Some(glyph) => {
                        draw_glyph(&mut canvas, x, &glyph, color, res)?;
                        x += glyph.advance();
                    }
                    None => {
                        log::warn!("no glyph for {:?} in {}", ch, font.descriptor().name);
                        x += missing_advance(font);
                    }
                },
            }
        }
        Ok(canvas)
    }

    fn place_text(&mut self, rect: Rect, canvas: Bitmap, natural: i32, align: TextAlign, ratio: f64) {
        let mut canvas = canvas;
        if natural > rect.width {
            let width = rect.width.max((natural as f64 * ratio) as i32);
            match canvas.resample(width + 1, canvas.height(), canvas.rect()) {
                Ok(shrunk) => canvas = shrunk,
                Err(err) => log::debug!("text shrink skipped: {}", err),
            }
        }
        let width = canvas.width() - 1;
        let x = match align {
            TextAlign::Left => rect.x,
            TextAlign::Center => rect.x.saturating_add(rect.width.saturating_sub(width) / 2),
            TextAlign::Right => rect.right().saturating_sub(width),
        };
        self.blit(x, rect.y, &canvas, canvas.rect(), 255);
    }
}
