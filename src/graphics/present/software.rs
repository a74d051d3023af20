//! Presenter that writes frames into an in-memory framebuffer.
//!
//! Used headless and by hosts that own their own window surface and only
//! need the pixels in a particular layout.

use super::{check_frame, convert_frame, PresentResult, Presenter};
use crate::graphics::bitmap::Bitmap;
use crate::graphics::pixel_format::DynamicFormat;

#[derive(Debug, Clone)]
pub struct SoftwarePresenter {
    width: u32,
    height: u32,
    format: DynamicFormat,
    pitch: usize,
    framebuffer: Vec<u8>,
    frames: u64,
}

impl SoftwarePresenter {
    pub fn new(width: u32, height: u32, format: DynamicFormat) -> Self {
        let pitch = width as usize * format.bytes_per_pixel();
        log::info!("software presenter {}x{}, {} bytes per pixel", width, height, format.bytes_per_pixel());
        Self {
            width,
            height,
            format,
            pitch,
            framebuffer: vec![0; pitch * height as usize],
            frames: 0,
        }
    }

    pub fn format(&self) -> DynamicFormat {
        self.format
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }

    /// Last presented frame.
    pub fn framebuffer(&self) -> &[u8] {
        &self.framebuffer
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames
    }
}

impl Presenter for SoftwarePresenter {
    fn name(&self) -> &'static str {
        "software"
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn present(&mut self, frame: &Bitmap) -> PresentResult<()> {
        check_frame(frame, (self.width, self.height))?;
        convert_frame(frame, self.format, &mut self.framebuffer, self.pitch);
        self.frames += 1;
        Ok(())
    }
}
