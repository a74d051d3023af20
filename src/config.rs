use anyhow::{Context, Result};

use crate::graphics::pixel_format::DynamicFormat;
use crate::logging::LogLevel;

/// Rendering options chosen by the host at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub pixel_format: FormatChoice,
    pub presenter: PresenterKind,
    /// Lower bound, relative to the natural width, when text is squeezed to fit.
    pub text_shrink_ratio: f64,
    pub screen: Resolution,
    /// Installed by [`RenderContext::initialize`](crate::graphics::RenderContext::initialize).
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Layout every bitmap is created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatChoice {
    #[default]
    Rgba8888,
    Bgra8888,
    Abgr8888,
    Argb8888,
    Rgb565,
    Argb1555,
    Rgb888,
}

impl FormatChoice {
    pub fn to_format(self) -> DynamicFormat {
        match self {
            FormatChoice::Rgba8888 => DynamicFormat::rgba8888(),
            FormatChoice::Bgra8888 => DynamicFormat::bgra8888(),
            FormatChoice::Abgr8888 => DynamicFormat::abgr8888(),
            FormatChoice::Argb8888 => DynamicFormat::argb8888(),
            FormatChoice::Rgb565 => DynamicFormat::rgb565(),
            FormatChoice::Argb1555 => DynamicFormat::argb1555(),
            FormatChoice::Rgb888 => DynamicFormat::rgb888(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresenterKind {
    #[default]
    Software,
    Sdl,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            pixel_format: FormatChoice::default(),
            presenter: PresenterKind::default(),
            text_shrink_ratio: 0.4,
            screen: Resolution {
                width: 320,
                height: 240,
            },
            log_level: LogLevel::default(),
        }
    }
}

impl RenderOptions {
    /// Read `key = value` lines; `#` starts a comment. Unknown keys are
    /// logged and skipped.
    pub fn from_properties(data: &str) -> Result<Self> {
        let mut options = Self::default();
        for (number, line) in data.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .with_context(|| format!("line {}: expected key = value", number + 1))?;
            let (key, value) = (key.trim(), value.trim());
            let context = || format!("line {}: bad value for {}", number + 1, key);
            match key.to_ascii_lowercase().as_str() {
                "pixel_format" => options.pixel_format = parse_pixel_format(value).with_context(context)?,
                "presenter" => options.presenter = parse_presenter(value).with_context(context)?,
                "resolution" => options.screen = parse_resolution(value).with_context(context)?,
                "text_shrink_ratio" => {
                    options.text_shrink_ratio = parse_shrink_ratio(value).with_context(context)?
                }
                "log_level" => {
                    let level: i32 = value.parse().with_context(context)?;
                    options.log_level = LogLevel::from_i32(level);
                }
                _ => log::warn!("ignoring unknown render option '{}'", key),
            }
        }
        Ok(options)
    }
}

pub fn parse_pixel_format(s: &str) -> Result<FormatChoice> {
    Ok(match s.to_ascii_lowercase().as_str() {
        "rgba8888" => FormatChoice::Rgba8888,
        "bgra8888" => FormatChoice::Bgra8888,
        "abgr8888" => FormatChoice::Abgr8888,
        "argb8888" => FormatChoice::Argb8888,
        "rgb565" => FormatChoice::Rgb565,
        "argb1555" => FormatChoice::Argb1555,
        "rgb888" => FormatChoice::Rgb888,
        other => anyhow::bail!("Unknown pixel format '{}'", other),
    })
}

pub fn parse_presenter(s: &str) -> Result<PresenterKind> {
    Ok(match s.to_ascii_lowercase().as_str() {
        "software" | "soft" => PresenterKind::Software,
        "sdl" | "sdl2" => PresenterKind::Sdl,
        other => anyhow::bail!("Unknown presenter '{}'", other),
    })
}

/// Parse a resolution string in the format "WIDTHxHEIGHT"
pub fn parse_resolution(s: &str) -> Result<Resolution> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != 2 {
        anyhow::bail!("Resolution must be in WIDTHxHEIGHT format");
    }

    let width: u32 = parts[0].parse().context("Invalid width value")?;
    let height: u32 = parts[1].parse().context("Invalid height value")?;

    if width == 0 || height == 0 {
        anyhow::bail!("Resolution values must be positive");
    }

    Ok(Resolution { width, height })
}

/// Parse a text shrink ratio in (0, 1].
pub fn parse_shrink_ratio(s: &str) -> Result<f64> {
    let ratio: f64 = s.parse().context("Invalid shrink ratio")?;
    if !(ratio > 0.0 && ratio <= 1.0) {
        anyhow::bail!("Shrink ratio out of range (0 to 1]");
    }
    Ok(ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_resolution_valid() {
        let res = parse_resolution("640x480").unwrap();
        assert_eq!(res.width, 640);
        assert_eq!(res.height, 480);
    }

    #[test]
    fn test_parse_resolution_invalid() {
        assert!(parse_resolution("640-480").is_err());
        assert!(parse_resolution("640x480x120").is_err());
        assert!(parse_resolution("0x480").is_err());
        assert!(parse_resolution("abcxdef").is_err());
    }

    #[rstest]
    #[case("RGBA8888", FormatChoice::Rgba8888)]
    #[case("bgra8888", FormatChoice::Bgra8888)]
    #[case("rgb565", FormatChoice::Rgb565)]
    #[case("argb1555", FormatChoice::Argb1555)]
    fn test_parse_pixel_format(#[case] input: &str, #[case] expected: FormatChoice) {
        assert_eq!(parse_pixel_format(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_pixel_format_unknown() {
        assert!(parse_pixel_format("yuv420").is_err());
    }

    #[test]
    fn test_parse_presenter() {
        assert_eq!(parse_presenter("soft").unwrap(), PresenterKind::Software);
        assert_eq!(parse_presenter("SDL2").unwrap(), PresenterKind::Sdl);
        assert!(parse_presenter("opengl").is_err());
    }

    #[test]
    fn test_parse_shrink_ratio() {
        assert_eq!(parse_shrink_ratio("0.5").unwrap(), 0.5);
        assert_eq!(parse_shrink_ratio("1").unwrap(), 1.0);
        assert!(parse_shrink_ratio("0").is_err());
        assert!(parse_shrink_ratio("1.5").is_err());
        assert!(parse_shrink_ratio("NaN").is_err());
    }

    #[test]
    fn test_format_choice_bytes() {
        assert_eq!(FormatChoice::Rgb565.to_format().bytes_per_pixel(), 2);
        assert_eq!(FormatChoice::Rgb888.to_format().bytes_per_pixel(), 3);
        assert_eq!(FormatChoice::Argb8888.to_format().bytes_per_pixel(), 4);
    }

    #[test]
    fn test_from_properties() {
        let options = RenderOptions::from_properties(
            "# player settings\n\
             pixel_format = bgra8888\n\
             presenter = software  # no window\n\
             resolution = 640x480\n\
             text_shrink_ratio = 0.5\n\
             log_level = 5\n\
             unknown_key = 1\n",
        )
        .unwrap();
        assert_eq!(options.pixel_format, FormatChoice::Bgra8888);
        assert_eq!(options.presenter, PresenterKind::Software);
        assert_eq!(
            options.screen,
            Resolution {
                width: 640,
                height: 480
            }
        );
        assert_eq!(options.text_shrink_ratio, 0.5);
        assert_eq!(options.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_from_properties_errors() {
        assert!(RenderOptions::from_properties("pixel_format").is_err());
        assert!(RenderOptions::from_properties("resolution = big").is_err());
    }

    #[test]
    fn test_options_default() {
        let opts = RenderOptions::default();
        assert_eq!(opts.screen.width, 320);
        assert_eq!(opts.pixel_format, FormatChoice::Rgba8888);
        assert_eq!(opts.text_shrink_ratio, 0.4);
    }
}
