//!
//! SDL2 window presenter.
//!
//! Each frame is converted to byte-order RGBA and uploaded to a streaming
//! texture created for that frame, then scaled to the window by the
//! renderer. The logical size is fixed at creation.
//!

use sdl2::{pixels::PixelFormatEnum, render::Canvas, video::Window, Sdl};

use super::{check_frame, convert_frame, PresentError, PresentResult, Presenter};
use crate::config::Resolution;
use crate::graphics::bitmap::Bitmap;
use crate::graphics::pixel_format::DynamicFormat;

/// SDL name for bytes laid out R, G, B, A in memory.
#[cfg(target_endian = "little")]
const TEXTURE_FORMAT: PixelFormatEnum = PixelFormatEnum::ABGR8888;

#[cfg(target_endian = "big")]
const TEXTURE_FORMAT: PixelFormatEnum = PixelFormatEnum::RGBA8888;

/// Window scale relative to the logical screen.
const WINDOW_SCALE: u32 = 2;

pub struct SdlPresenter {
    _sdl: Sdl,
    canvas: Canvas<Window>,
    width: u32,
    height: u32,
    staging: Vec<u8>,
}

impl SdlPresenter {
    /// Open a window showing a `screen`-sized logical display.
    pub fn new(title: &str, screen: Resolution) -> PresentResult<Self> {
        log::info!("Initializing SDL2 presenter");
        let sdl = sdl2::init().map_err(|e| PresentError::Sdl(format!("SDL2 init: {}", e)))?;
        let video = sdl
            .video()
            .map_err(|e| PresentError::Sdl(format!("video subsystem: {}", e)))?;
        log::info!("SDL2 video driver: {}", video.current_video_driver());

        let window = video
            .window(title, screen.width * WINDOW_SCALE, screen.height * WINDOW_SCALE)
            .position_centered()
            .build()
            .map_err(|e| PresentError::Sdl(format!("window: {}", e)))?;

        let mut canvas = window
            .into_canvas()
            .build()
            .map_err(|e| PresentError::Sdl(format!("renderer: {}", e)))?;
        log::info!("SDL2 renderer: {}", canvas.info().name);

        canvas
            .set_logical_size(screen.width, screen.height)
            .map_err(|e| PresentError::Sdl(format!("set logical size: {}", e)))?;
        sdl2::hint::set("SDL_RENDER_SCALE_QUALITY", "nearest");

        Ok(Self {
            _sdl: sdl,
            canvas,
            width: screen.width,
            height: screen.height,
            staging: vec![0; screen.width as usize * screen.height as usize * 4],
        })
    }
}

impl Presenter for SdlPresenter {
    fn name(&self) -> &'static str {
        "sdl2"
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn present(&mut self, frame: &Bitmap) -> PresentResult<()> {
        check_frame(frame, (self.width, self.height))?;
        let pitch = self.width as usize * 4;
        convert_frame(frame, DynamicFormat::rgba8888(), &mut self.staging, pitch);

        let texture_creator = self.canvas.texture_creator();
        let mut texture = texture_creator
            .create_texture_streaming(TEXTURE_FORMAT, self.width, self.height)
            .map_err(|e| PresentError::Sdl(format!("frame texture: {}", e)))?;
        texture
            .update(None, &self.staging, pitch)
            .map_err(|e| PresentError::Sdl(format!("texture update: {}", e)))?;

        self.canvas.set_draw_color(sdl2::pixels::Color::RGB(0, 0, 0));
        self.canvas.clear();
        self.canvas
            .copy(&texture, None, None)
            .map_err(|e| PresentError::Sdl(format!("render copy: {}", e)))?;
        self.canvas.present();
        Ok(())
    }
}

impl Drop for SdlPresenter {
    fn drop(&mut self) {
        log::debug!("SDL2 presenter shutting down");
    }
}
