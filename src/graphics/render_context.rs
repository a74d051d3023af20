//! Process-wide rendering choices, passed explicitly to factories.
//!
//! One `RenderContext` is built at startup from [`RenderOptions`] and handed
//! to every call that creates bitmaps, so all bitmaps share one layout and
//! blits between them take the fast path.

use crate::config::{PresenterKind, RenderOptions, Resolution};
use crate::graphics::bitmap::{Bitmap, Result};
use crate::graphics::bitmap_utils::BlitPath;
use crate::graphics::pixel_format::DynamicFormat;
use crate::graphics::present::{PresentResult, Presenter, SoftwarePresenter};
use crate::graphics::text::TextResources;
use crate::logging::{fatal_error, init_logging};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    format: DynamicFormat,
    presenter: PresenterKind,
    screen: Resolution,
    text_shrink_ratio: f64,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::from_options(&RenderOptions::default())
    }
}

impl RenderContext {
    /// Software context using `format` with default options otherwise.
    pub fn new(format: DynamicFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    /// Startup entry: install logging at `options.log_level`, then build the
    /// context. Factories and tests that must not touch the global logger use
    /// [`from_options`](Self::from_options).
    pub fn initialize(options: &RenderOptions) -> Self {
        init_logging(options.log_level);
        log::info!(
            "render context: {:?} bitmaps, {:?} presenter, {}x{}",
            options.pixel_format,
            options.presenter,
            options.screen.width,
            options.screen.height
        );
        Self::from_options(options)
    }

    pub fn from_options(options: &RenderOptions) -> Self {
        Self {
            format: options.pixel_format.to_format(),
            presenter: options.presenter,
            screen: options.screen,
            text_shrink_ratio: options.text_shrink_ratio,
        }
    }

    /// Layout of every bitmap created through this context.
    pub fn format(&self) -> DynamicFormat {
        self.format
    }

    /// Row engine path used for blits between this context's bitmaps.
    pub fn blit_path(&self) -> BlitPath {
        BlitPath::select(&self.format, &self.format)
    }

    pub fn screen(&self) -> Resolution {
        self.screen
    }

    pub fn presenter_kind(&self) -> PresenterKind {
        self.presenter
    }

    pub fn create_bitmap(&self, width: i32, height: i32, transparent: bool) -> Result<Bitmap> {
        Bitmap::new(self, width, height, transparent)
    }

    /// Opaque black bitmap the size of the screen.
    pub fn create_screen_bitmap(&self) -> Result<Bitmap> {
        self.create_bitmap(self.screen.width as i32, self.screen.height as i32, false)
    }

    pub fn text_resources<'a>(&self, system: Option<&'a Bitmap>, exfont: Option<&'a Bitmap>) -> TextResources<'a> {
        TextResources::new(system, exfont).with_shrink_ratio(self.text_shrink_ratio)
    }

    pub fn create_presenter(&self) -> PresentResult<Box<dyn Presenter>> {
        let (width, height) = (self.screen.width, self.screen.height);
        match self.presenter {
            PresenterKind::Software => Ok(Box::new(SoftwarePresenter::new(width, height, self.format))),
            PresenterKind::Sdl => self.create_sdl_presenter(),
        }
    }

    #[cfg(feature = "sdl")]
    fn create_sdl_presenter(&self) -> PresentResult<Box<dyn Presenter>> {
        let title = format!("RPG Player v{}", env!("CARGO_PKG_VERSION"));
        Ok(Box::new(crate::graphics::present::SdlPresenter::new(&title, self.screen)?))
    }

    #[cfg(not(feature = "sdl"))]
    fn create_sdl_presenter(&self) -> PresentResult<Box<dyn Presenter>> {
        Err(crate::graphics::present::PresentError::Sdl(
            "built without the sdl feature".into(),
        ))
    }

    /// Like [`create_presenter`](Self::create_presenter), but a failure ends
    /// the process.
    pub fn create_presenter_or_exit(&self) -> Box<dyn Presenter> {
        match self.create_presenter() {
            Ok(presenter) => presenter,
            Err(err) => fatal_error(&format!("cannot create {:?} presenter: {}", self.presenter, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormatChoice;
    #[cfg(not(feature = "sdl"))]
    use crate::graphics::present::PresentError;
    use crate::graphics::types::Color;

    #[test]
    fn test_default_context() {
        let ctx = RenderContext::default();
        assert_eq!(ctx.format(), DynamicFormat::rgba8888());
        assert_eq!(ctx.blit_path(), BlitPath::Rgba8888);
        assert_eq!(ctx.presenter_kind(), PresenterKind::Software);
    }

    #[test]
    fn test_from_options() {
        let options = RenderOptions {
            pixel_format: FormatChoice::Rgb565,
            text_shrink_ratio: 0.75,
            ..RenderOptions::default()
        };
        let ctx = RenderContext::from_options(&options);
        assert!(!ctx.blit_path().is_fast());
        assert_eq!(ctx.text_resources(None, None).shrink_ratio, 0.75);
        let bitmap = ctx.create_bitmap(3, 2, true).unwrap();
        assert_eq!(bitmap.bpp(), 2);
    }

    #[test]
    fn test_screen_bitmap_is_opaque_black() {
        let ctx = RenderContext::default();
        let screen = ctx.create_screen_bitmap().unwrap();
        assert_eq!((screen.width(), screen.height()), (320, 240));
        assert_eq!(screen.get_pixel(319, 239), Some(Color::BLACK));
    }

    #[test]
    fn test_software_presenter_matches_screen() {
        let ctx = RenderContext::new(DynamicFormat::bgra8888());
        let mut presenter = ctx.create_presenter().unwrap();
        assert_eq!(presenter.name(), "software");
        assert_eq!(presenter.dimensions(), (320, 240));
        let frame = ctx.create_screen_bitmap().unwrap();
        presenter.present(&frame).unwrap();
    }

    #[cfg(not(feature = "sdl"))]
    #[test]
    fn test_sdl_presenter_unavailable() {
        let ctx = RenderContext::from_options(&RenderOptions {
            presenter: PresenterKind::Sdl,
            ..RenderOptions::default()
        });
        assert!(matches!(ctx.create_presenter(), Err(PresentError::Sdl(_))));
    }
}
