// Preview window: shows the scaled camera frame with the HUD composited on
// top. The display orientation is applied to video and overlay alike, so
// both are always drawn through the same pixel map.

use fpv_hud::{Error, OverlaySink, OverlayView, Result, Size, Transform};
use image::{RgbImage, Rgba};
use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::gamma::{GammaLut, pack};

pub struct Display {
    window: Window,
    frame: Size,
    transform: Transform,
    screen: Vec<u32>,
    // screen index -> frame index, built once per orientation
    source: Vec<usize>,
    lut: GammaLut,
}

impl Display {
    /// Open a window sized to the frame as it looks after `transform`.
    pub fn new(title: &str, frame: Size, transform: Transform) -> Result<Self> {
        let extent = transform.extent(frame);
        let window = Window::new(title, extent.width as usize, extent.height as usize, WindowOptions::default())
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        Ok(Self {
            window,
            frame,
            transform,
            screen: vec![0; (extent.width * extent.height) as usize],
            source: source_map(frame, transform),
            lut: GammaLut::new(),
        })
    }

    /// Copy a camera frame into the screen buffer. Nothing is shown until
    /// [`OverlaySink::present_overlay`] runs.
    pub fn show_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if frame.dimensions() != (self.frame.width, self.frame.height) {
            return Err(Error::InvalidParameter(format!(
                "frame is {:?}, display expects {}x{}",
                frame.dimensions(),
                self.frame.width,
                self.frame.height
            )));
        }
        let raw = frame.as_raw();
        for (dst, &src) in self.screen.iter_mut().zip(&self.source) {
            let i = src * 3;
            *dst = pack(raw[i], raw[i + 1], raw[i + 2]);
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }

    /// True on the frame a key goes down; holding it does not repeat.
    pub fn pressed_once(&self, key: Key) -> bool {
        self.window.is_key_pressed(key, KeyRepeat::No)
    }

    /// Like [`Display::pressed_once`] but repeats while held, for nudges.
    pub fn pressed_repeat(&self, key: Key) -> bool {
        self.window.is_key_pressed(key, KeyRepeat::Yes)
    }
}

impl OverlaySink for Display {
    fn frame_size(&self) -> Size {
        self.frame
    }

    fn transform(&self) -> Transform {
        self.transform
    }

    fn present_overlay(&mut self, overlay: OverlayView<'_>) -> Result<()> {
        if (overlay.width(), overlay.height()) != (self.frame.width, self.frame.height) {
            return Err(Error::InvalidParameter(format!(
                "overlay is {}x{}, display expects {}x{}",
                overlay.width(),
                overlay.height(),
                self.frame.width,
                self.frame.height
            )));
        }
        let raw = overlay.as_bytes();
        for (dst, &src) in self.screen.iter_mut().zip(&self.source) {
            let i = src * 4;
            *dst = self.lut.blend_over(*dst, Rgba([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]));
        }

        let extent = self.transform.extent(self.frame);
        self.window
            .update_with_buffer(&self.screen, extent.width as usize, extent.height as usize)
            .map_err(|e| Error::WindowUpdate(e.to_string()))
    }
}

/// For every pixel of the transformed surface, the index of the frame pixel
/// that lands there. Flips act in frame space, transpose last.
fn source_map(frame: Size, transform: Transform) -> Vec<usize> {
    let extent = transform.extent(frame);
    let (w, h) = (frame.width as usize, frame.height as usize);
    let mut map = Vec::with_capacity(w * h);
    for dy in 0..extent.height as usize {
        for dx in 0..extent.width as usize {
            let (mut x, mut y) = if transform.transpose { (dy, dx) } else { (dx, dy) };
            if transform.hflip {
                x = w - 1 - x;
            }
            if transform.vflip {
                y = h - 1 - y;
            }
            map.push(y * w + x);
        }
    }
    map
}
