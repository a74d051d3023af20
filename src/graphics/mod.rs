//! Bitmap compositing engine.
//!
//! Everything draws into [`Bitmap`]s held in one process-wide pixel layout
//! chosen by the [`RenderContext`]; a [`Presenter`] moves the final frame to
//! the display.

pub mod bitmap;
pub mod bitmap_screen;
pub mod bitmap_utils;
pub mod font;
pub mod image;
pub mod pixel_format;
pub mod present;
pub mod render_context;
pub mod text;
pub mod types;

pub use bitmap::{Bitmap, BitmapError, DirtyFlag, PixelLock, SharedBitmap};
pub use bitmap_screen::{BitmapScreen, BlendType, Effects};
pub use font::{BitmapFont, Font, FontRenderer, Glyph};
pub use self::image::DecodeError;
pub use pixel_format::{DynamicFormat, PixelFormat};
pub use present::{PresentError, Presenter, SoftwarePresenter};
pub use render_context::RenderContext;
pub use text::{TextAlign, TextResources};
pub use types::{Color, Matrix, Rect, Tone};
