//! Font boundary used by text rendering.
//!
//! - `Font`: the request descriptor (name, pixel size, style)
//! - `FontRenderer`: anything that can rasterize a code point and report a
//!   line height
//! - `Glyph`: one rasterized character, 1bpp or 8bpp coverage
//! - `BitmapFont`: a pre-rasterized font stored in pages of 2048 code points
//!
//! A renderer backed by a TrueType library plugs in by implementing
//! `FontRenderer`.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Unicode code point.
pub type UniChar = u32;

/// Extracts the page a code point belongs to.
const CHARACTER_PAGE_MASK: UniChar = 0xffff_f800;

/// Code points per page.
const CHARACTER_PAGE_SIZE: usize = 2048;

/// Errors building fonts and glyphs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FontError {
    #[error("character 0x{0:04X} is outside the page")]
    CharOutOfRange(UniChar),

    #[error("glyph data holds {actual} bytes, expected {expected}")]
    DataSize { expected: usize, actual: usize },

    #[error("invalid glyph size {width}x{height}")]
    InvalidSize { width: i32, height: i32 },
}

/// Font request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Font {
    pub name: String,
    /// Pixel height.
    pub size: u16,
    pub bold: bool,
    pub italic: bool,
}

impl Font {
    pub fn new(name: impl Into<String>, size: u16) -> Self {
        Self {
            name: name.into(),
            size,
            bold: false,
            italic: false,
        }
    }
}

/// Bits per coverage sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphDepth {
    /// One bit per pixel, rows padded to whole bytes, most significant bit first.
    Mono,
    /// One byte of coverage per pixel.
    Gray,
}

/// A rasterized character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glyph {
    width: i32,
    height: i32,
    advance: i32,
    depth: GlyphDepth,
    data: Arc<[u8]>,
}

impl Glyph {
    fn build(width: i32, height: i32, advance: i32, depth: GlyphDepth, data: Vec<u8>) -> Result<Self, FontError> {
        if width < 0 || height < 0 {
            return Err(FontError::InvalidSize { width, height });
        }
        let pitch = match depth {
            GlyphDepth::Mono => (width as usize).div_ceil(8),
            GlyphDepth::Gray => width as usize,
        };
        let expected = pitch * height as usize;
        if data.len() != expected {
            return Err(FontError::DataSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            advance,
            depth,
            data: data.into(),
        })
    }

    pub fn mono(width: i32, height: i32, advance: i32, bits: Vec<u8>) -> Result<Self, FontError> {
        Self::build(width, height, advance, GlyphDepth::Mono, bits)
    }

    pub fn gray(width: i32, height: i32, advance: i32, coverage: Vec<u8>) -> Result<Self, FontError> {
        Self::build(width, height, advance, GlyphDepth::Gray, coverage)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Horizontal pen movement after drawing this glyph.
    pub fn advance(&self) -> i32 {
        self.advance
    }

    pub fn depth(&self) -> GlyphDepth {
        self.depth
    }

    /// Coverage at `(x, y)` as 0..=255; 0 outside the glyph.
    pub fn coverage(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return 0;
        }
        let (x, y) = (x as usize, y as usize);
        match self.depth {
            GlyphDepth::Gray => self.data[y * self.width as usize + x],
            GlyphDepth::Mono => {
                let pitch = (self.width as usize).div_ceil(8);
                let byte = self.data[y * pitch + x / 8];
                if byte & (0x80 >> (x % 8)) != 0 {
                    255
                } else {
                    0
                }
            }
        }
    }
}

/// Rasterizer for one font.
pub trait FontRenderer: Send + Sync {
    fn descriptor(&self) -> &Font;

    /// Line height in pixels.
    fn height(&self) -> i32;

    /// Rasterize `ch`, or `None` when the font has no glyph for it.
    fn render(&self, ch: UniChar) -> Option<Glyph>;
}

impl fmt::Debug for dyn FontRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontRenderer")
            .field("descriptor", self.descriptor())
            .field("height", &self.height())
            .finish()
    }
}

// ==============================================================================
// Paged bitmap font
// ==============================================================================

/// Glyphs for one aligned block of 2048 code points.
#[derive(Debug, Clone)]
pub struct FontPage {
    page_start: UniChar,
    glyphs: Box<[Option<Glyph>]>,
}

impl FontPage {
    /// Empty page containing `ch`.
    pub fn new(ch: UniChar) -> Self {
        Self {
            page_start: ch & CHARACTER_PAGE_MASK,
            glyphs: vec![None; CHARACTER_PAGE_SIZE].into_boxed_slice(),
        }
    }

    #[must_use]
    pub const fn page_start(&self) -> UniChar {
        self.page_start
    }

    #[must_use]
    pub const fn contains_char(&self, ch: UniChar) -> bool {
        ch & CHARACTER_PAGE_MASK == self.page_start
    }

    #[must_use]
    pub fn get(&self, ch: UniChar) -> Option<&Glyph> {
        if !self.contains_char(ch) {
            return None;
        }
        self.glyphs[(ch - self.page_start) as usize].as_ref()
    }

    pub fn set(&mut self, ch: UniChar, glyph: Glyph) -> Result<(), FontError> {
        if !self.contains_char(ch) {
            return Err(FontError::CharOutOfRange(ch));
        }
        self.glyphs[(ch - self.page_start) as usize] = Some(glyph);
        Ok(())
    }

    /// Number of glyphs present.
    pub fn len(&self) -> usize {
        self.glyphs.iter().filter(|g| g.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pre-rasterized font.
#[derive(Debug, Clone)]
pub struct BitmapFont {
    descriptor: Font,
    height: i32,
    pages: Vec<FontPage>,
}

impl BitmapFont {
    pub fn new(descriptor: Font, height: i32) -> Self {
        Self {
            descriptor,
            height,
            pages: Vec::new(),
        }
    }

    /// Add or replace a whole page.
    pub fn add_page(&mut self, page: FontPage) {
        match self
            .pages
            .iter_mut()
            .find(|p| p.page_start == page.page_start)
        {
            Some(existing) => *existing = page,
            None => self.pages.push(page),
        }
    }

    /// Store a glyph, creating its page on first use.
    pub fn insert(&mut self, ch: char, glyph: Glyph) {
        let ch = ch as UniChar;
        let page_start = ch & CHARACTER_PAGE_MASK;
        let index = match self.pages.iter().position(|p| p.page_start == page_start) {
            Some(index) => index,
            None => {
                self.pages.push(FontPage::new(ch));
                self.pages.len() - 1
            }
        };
        self.pages[index].glyphs[(ch - page_start) as usize] = Some(glyph);
    }

    #[must_use]
    pub fn lookup(&self, ch: UniChar) -> Option<&Glyph> {
        let page_start = ch & CHARACTER_PAGE_MASK;
        self.pages
            .iter()
            .find(|p| p.page_start == page_start)
            .and_then(|p| p.get(ch))
    }

    pub fn pages(&self) -> impl Iterator<Item = &FontPage> {
        self.pages.iter()
    }
}

impl FontRenderer for BitmapFont {
    fn descriptor(&self) -> &Font {
        &self.descriptor
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn render(&self, ch: UniChar) -> Option<Glyph> {
        self.lookup(ch).cloned()
    }
}
