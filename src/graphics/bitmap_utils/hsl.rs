//! RGB <-> HSL conversion.
//!
//! Hue is in degrees `[0, 360)`, saturation and lightness in `[0, 255]`.
//! `hsl_to_rgb(rgb_to_hsl(c)) == c` for every 8-bit RGB triple.
//!
//! Components are `f64`. Scale factors apply to the unrounded values and
//! each channel is rounded once, with `+ 0.5`, when converted back to a byte.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

pub fn rgb_to_hsl(r: u8, g: u8, b: u8) -> Hsl {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;
    let l = (max + min) / 2.0;
    if d == 0.0 {
        return Hsl { h: 0.0, s: 0.0, l };
    }

    let s = d * 255.0 / (255.0 - (max + min - 255.0).abs());
    let h = if max == r {
        let h = 60.0 * ((g - b) / d);
        if h < 0.0 {
            h + 360.0
        } else {
            h
        }
    } else if max == g {
        60.0 * ((b - r) / d + 2.0)
    } else {
        60.0 * ((r - g) / d + 4.0)
    };
    Hsl { h, s, l }
}

pub fn hsl_to_rgb(hsl: Hsl) -> (u8, u8, u8) {
    let Hsl { h, s, l } = hsl;
    let c = (255.0 - (2.0 * l - 255.0).abs()) * s / 255.0;
    let hp = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let m = l - c / 2.0;

    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let channel = |v: f64| ((v + m + 0.5) as i32).clamp(0, 255) as u8;
    (channel(r1), channel(g1), channel(b1))
}

/// Apply a hue rotation, saturation scale and lightness scale/offset.
///
/// `s` and `l` saturate to `[0, 255]`.
pub fn adjust(hsl: Hsl, hue: i32, sat: f64, lum: f64, loff: f64) -> Hsl {
    Hsl {
        h: (hsl.h + hue as f64).rem_euclid(360.0),
        s: (hsl.s * sat).clamp(0.0, 255.0),
        l: (hsl.l * lum + loff).clamp(0.0, 255.0),
    }
}
