//! Presentation boundary: getting a finished frame onto a target.
//!
//! Compositing always happens in [`Bitmap`]s; a [`Presenter`] only converts
//! the final frame into whatever the target wants.

use thiserror::Error;

use crate::graphics::bitmap::Bitmap;
use crate::graphics::bitmap_utils::with_row_ops;
use crate::graphics::pixel_format::DynamicFormat;

pub mod software;
#[cfg(feature = "sdl")]
pub mod sdl2;

pub use software::SoftwarePresenter;
#[cfg(feature = "sdl")]
pub use self::sdl2::SdlPresenter;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresentError {
    #[error("frame is {actual:?}, presenter expects {expected:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("SDL: {0}")]
    Sdl(String),
}

pub type PresentResult<T> = Result<T, PresentError>;

/// A display target.
pub trait Presenter {
    fn name(&self) -> &'static str;

    /// Size of frame the presenter accepts.
    fn dimensions(&self) -> (u32, u32);

    /// Show `frame`, which must match [`dimensions`](Presenter::dimensions).
    fn present(&mut self, frame: &Bitmap) -> PresentResult<()>;
}

/// Reject frames of the wrong size.
pub(crate) fn check_frame(frame: &Bitmap, expected: (u32, u32)) -> PresentResult<()> {
    let actual = (frame.width() as u32, frame.height() as u32);
    if actual != expected {
        return Err(PresentError::SizeMismatch { expected, actual });
    }
    Ok(())
}

/// Convert every row of `frame` into `out`, laid out in `format` with `pitch`
/// bytes per row.
pub(crate) fn convert_frame(frame: &Bitmap, format: DynamicFormat, out: &mut [u8], pitch: usize) {
    let (w, h, src_pitch) = (frame.width() as usize, frame.height() as usize, frame.pitch());
    let pixels = frame.pixels();
    with_row_ops!(frame.format(), format, |ops| {
        for y in 0..h {
            ops.copy_blit(&mut out[y * pitch..], &pixels[y * src_pitch..], w);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_frame_reports_both_sizes() {
        let frame = Bitmap::with_format(DynamicFormat::rgba8888(), 4, 3).unwrap();
        assert_eq!(check_frame(&frame, (4, 3)), Ok(()));
        let err = check_frame(&frame, (320, 240)).unwrap_err();
        assert_eq!(err.to_string(), "frame is (4, 3), presenter expects (320, 240)");
        assert_eq!(PresentError::Sdl("no display".into()).to_string(), "SDL: no display");
    }
}
