//! Pixel format descriptions and per-pixel accessors.
//!
//! Two kinds of format implement [`PixelFormat`]:
//! - [`DynamicFormat`]: runtime-described layout (masks, alpha mode), any of
//!   1/2/3/4 bytes per pixel, stored as a little-endian packed integer
//! - four zero-sized 32-bit layouts (`Rgba8888`, `Bgra8888`, `Abgr8888`,
//!   `Argb8888`, named by byte order in memory) whose channel offsets are
//!   compile-time constants; the blit engine monomorphizes over these
//!
//! Channels are widened to 8 bits by shifting (no bit replication), so
//! decoding and re-encoding a pixel reproduces its bytes exactly.

/// Full-scale alpha in the 8-bit channel domain all formats decode to.
pub const ONE: u32 = 255;

/// Accessors every pixel layout provides.
pub trait PixelFormat: Copy {
    /// Bytes per pixel.
    fn bytes(&self) -> usize;

    /// True when pixels carry a real alpha channel.
    fn has_alpha(&self) -> bool;

    /// True when transparency is expressed with a key color.
    fn has_colorkey(&self) -> bool {
        false
    }

    /// Largest alpha value this format can store, in the 8-bit domain.
    fn opaque(&self) -> u8 {
        255
    }

    fn get_rgba(&self, px: &[u8]) -> (u8, u8, u8, u8);

    fn set_rgba(&self, px: &mut [u8], r: u8, g: u8, b: u8, a: u8);

    fn get_alpha(&self, px: &[u8]) -> u8 {
        self.get_rgba(px).3
    }

    fn set_alpha(&self, px: &mut [u8], a: u8) {
        let (r, g, b, _) = self.get_rgba(px);
        self.set_rgba(px, r, g, b, a);
    }
}

// ==============================================================================
// Static 32-bit layouts
// ==============================================================================

macro_rules! byte_order_format {
    ($(#[$doc:meta])* $name:ident, r: $r:expr, g: $g:expr, b: $b:expr, a: $a:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name;

        impl $name {
            pub const R: usize = $r;
            pub const G: usize = $g;
            pub const B: usize = $b;
            pub const A: usize = $a;
        }

        impl PixelFormat for $name {
            #[inline]
            fn bytes(&self) -> usize {
                4
            }

            #[inline]
            fn has_alpha(&self) -> bool {
                true
            }

            #[inline]
            fn get_rgba(&self, px: &[u8]) -> (u8, u8, u8, u8) {
                (px[Self::R], px[Self::G], px[Self::B], px[Self::A])
            }

            #[inline]
            fn set_rgba(&self, px: &mut [u8], r: u8, g: u8, b: u8, a: u8) {
                px[Self::R] = r;
                px[Self::G] = g;
                px[Self::B] = b;
                px[Self::A] = a;
            }

            #[inline]
            fn get_alpha(&self, px: &[u8]) -> u8 {
                px[Self::A]
            }

            #[inline]
            fn set_alpha(&self, px: &mut [u8], a: u8) {
                px[Self::A] = a;
            }
        }
    };
}

byte_order_format!(
    /// Bytes `R, G, B, A`.
    Rgba8888, r: 0, g: 1, b: 2, a: 3
);
byte_order_format!(
    /// Bytes `B, G, R, A`.
    Bgra8888, r: 2, g: 1, b: 0, a: 3
);
byte_order_format!(
    /// Bytes `A, B, G, R`.
    Abgr8888, r: 3, g: 2, b: 1, a: 0
);
byte_order_format!(
    /// Bytes `A, R, G, B`.
    Argb8888, r: 1, g: 2, b: 3, a: 0
);

// ==============================================================================
// Dynamic format
// ==============================================================================

/// How a format expresses transparency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlphaType {
    /// Every pixel is opaque.
    #[default]
    None,
    /// Pixels equal to the key color are transparent.
    ColorKey,
    /// Per-pixel alpha channel.
    Alpha,
}

/// One channel of a packed pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Component {
    pub bits: u8,
    pub shift: u8,
}

impl Component {
    pub const fn from_mask(mask: u32) -> Self {
        if mask == 0 {
            return Self { bits: 0, shift: 0 };
        }
        Self {
            bits: mask.count_ones() as u8,
            shift: mask.trailing_zeros() as u8,
        }
    }

    pub const fn mask(&self) -> u32 {
        if self.bits == 0 {
            0
        } else {
            (((1u64 << self.bits) - 1) as u32) << self.shift
        }
    }

    #[inline]
    fn decode(&self, pix: u32) -> u8 {
        if self.bits == 0 {
            return 0;
        }
        let value = (pix >> self.shift) & ((1u32 << self.bits) - 1);
        (value << (8 - self.bits)) as u8
    }

    #[inline]
    fn encode(&self, value: u8) -> u32 {
        if self.bits == 0 {
            return 0;
        }
        ((value as u32) >> (8 - self.bits)) << self.shift
    }
}

/// Runtime-described pixel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DynamicFormat {
    /// Bits per pixel: 8, 16, 24 or 32.
    pub bits: u8,
    pub r: Component,
    pub g: Component,
    pub b: Component,
    pub a: Component,
    pub alpha_type: AlphaType,
    /// Packed RGB value treated as transparent when `alpha_type` is `ColorKey`.
    pub colorkey: u32,
}

impl Default for DynamicFormat {
    fn default() -> Self {
        Self::rgba8888()
    }
}

impl DynamicFormat {
    /// Build a format from channel masks of a little-endian packed pixel.
    ///
    /// Channels wider than 8 bits are not representable and are narrowed to
    /// their top 8 bits.
    pub fn new(
        bits: u8,
        rmask: u32,
        gmask: u32,
        bmask: u32,
        amask: u32,
        alpha_type: AlphaType,
    ) -> Self {
        let narrow = |mask: u32| {
            let mut c = Component::from_mask(mask);
            if c.bits > 8 {
                c.shift += c.bits - 8;
                c.bits = 8;
            }
            c
        };
        let a = if alpha_type == AlphaType::Alpha {
            narrow(amask)
        } else {
            Component::default()
        };
        Self {
            bits,
            r: narrow(rmask),
            g: narrow(gmask),
            b: narrow(bmask),
            a,
            alpha_type,
            colorkey: 0,
        }
    }

    pub fn with_colorkey(mut self, key: u32) -> Self {
        self.alpha_type = AlphaType::ColorKey;
        self.a = Component::default();
        self.colorkey = key & self.rgb_mask();
        self
    }

    pub fn rgba8888() -> Self {
        Self::new(32, 0x0000_00FF, 0x0000_FF00, 0x00FF_0000, 0xFF00_0000, AlphaType::Alpha)
    }

    pub fn bgra8888() -> Self {
        Self::new(32, 0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000, AlphaType::Alpha)
    }

    pub fn abgr8888() -> Self {
        Self::new(32, 0xFF00_0000, 0x00FF_0000, 0x0000_FF00, 0x0000_00FF, AlphaType::Alpha)
    }

    pub fn argb8888() -> Self {
        Self::new(32, 0x0000_FF00, 0x00FF_0000, 0xFF00_0000, 0x0000_00FF, AlphaType::Alpha)
    }

    pub fn rgb565() -> Self {
        Self::new(16, 0xF800, 0x07E0, 0x001F, 0, AlphaType::None)
    }

    pub fn argb1555() -> Self {
        Self::new(16, 0x7C00, 0x03E0, 0x001F, 0x8000, AlphaType::Alpha)
    }

    pub fn rgb888() -> Self {
        Self::new(24, 0xFF_0000, 0x00_FF00, 0x00_00FF, 0, AlphaType::None)
    }

    pub fn rgb_mask(&self) -> u32 {
        self.r.mask() | self.g.mask() | self.b.mask()
    }

    pub fn bytes_per_pixel(&self) -> usize {
        (self.bits as usize).div_ceil(8)
    }

    #[inline]
    fn load(&self, px: &[u8]) -> u32 {
        match self.bytes_per_pixel() {
            1 => px[0] as u32,
            2 => u16::from_le_bytes([px[0], px[1]]) as u32,
            3 => u32::from_le_bytes([px[0], px[1], px[2], 0]),
            _ => u32::from_le_bytes([px[0], px[1], px[2], px[3]]),
        }
    }

    #[inline]
    fn store(&self, px: &mut [u8], pix: u32) {
        let bytes = pix.to_le_bytes();
        let n = self.bytes_per_pixel();
        px[..n].copy_from_slice(&bytes[..n]);
    }
}

impl PixelFormat for DynamicFormat {
    #[inline]
    fn bytes(&self) -> usize {
        self.bytes_per_pixel()
    }

    fn has_alpha(&self) -> bool {
        self.alpha_type == AlphaType::Alpha
    }

    fn has_colorkey(&self) -> bool {
        self.alpha_type == AlphaType::ColorKey
    }

    fn opaque(&self) -> u8 {
        match self.alpha_type {
            AlphaType::Alpha if self.a.bits > 0 => {
                (0xFFu32 & !((1u32 << (8 - self.a.bits)) - 1)) as u8
            }
            _ => 255,
        }
    }

    #[inline]
    fn get_rgba(&self, px: &[u8]) -> (u8, u8, u8, u8) {
        let pix = self.load(px);
        let a = match self.alpha_type {
            AlphaType::None => 255,
            AlphaType::Alpha => self.a.decode(pix),
            AlphaType::ColorKey => {
                if pix & self.rgb_mask() == self.colorkey {
                    0
                } else {
                    255
                }
            }
        };
        (self.r.decode(pix), self.g.decode(pix), self.b.decode(pix), a)
    }

    #[inline]
    fn set_rgba(&self, px: &mut [u8], r: u8, g: u8, b: u8, a: u8) {
        let pix = match self.alpha_type {
            AlphaType::ColorKey if a == 0 => self.colorkey,
            AlphaType::Alpha => {
                self.r.encode(r) | self.g.encode(g) | self.b.encode(b) | self.a.encode(a)
            }
            _ => self.r.encode(r) | self.g.encode(g) | self.b.encode(b),
        };
        self.store(px, pix);
    }

    fn set_alpha(&self, px: &mut [u8], a: u8) {
        match self.alpha_type {
            AlphaType::None => {}
            AlphaType::ColorKey => {
                if a == 0 {
                    self.store(px, self.colorkey);
                }
            }
            AlphaType::Alpha => {
                let pix = (self.load(px) & !self.a.mask()) | self.a.encode(a);
                self.store(px, pix);
            }
        }
    }
}

/// Byte offset of an 8-bit channel inside a little-endian 32-bit pixel.
pub fn mask_get_byte(mask: u32) -> usize {
    match mask {
        0xFF00_0000 => 3,
        0x00FF_0000 => 2,
        0x0000_FF00 => 1,
        _ => 0,
    }
}
