// The persistent RGBA overlay buffer.
// Allocated once per session; the pixel storage never moves afterwards, so the
// display side can keep reading it by reference without copies.

use image::{ImageBuffer, RgbaImage};
use log::debug;

use crate::dirty::DirtyRegions;
use crate::draw::fill_rect;
use crate::error::{Error, Result};
use crate::types::{Color, Rect, Size};

/// Exclusive write handle to the overlay pixels.
pub struct OverlayBuffer {
    image: RgbaImage,
    background: Color,
    dirty: DirtyRegions,
}

impl OverlayBuffer {
    /// Allocate a `width x height` buffer filled with `background`.
    pub fn allocate(width: u32, height: u32, background: Color) -> Result<Self> {
        let fail = || Error::AllocationError { width, height };
        if width == 0 || height == 0 {
            return Err(fail());
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(fail)?;

        let mut raw: Vec<u8> = Vec::new();
        raw.try_reserve_exact(len).map_err(|_| fail())?;
        raw.resize(len, 0);
        for px in raw.chunks_exact_mut(4) {
            px.copy_from_slice(&background.0);
        }

        let image: RgbaImage = ImageBuffer::from_raw(width, height, raw).ok_or_else(fail)?;
        debug!("overlay buffer {width}x{height} allocated ({len} bytes)");
        Ok(Self { image, background, dirty: DirtyRegions::with_capacity(32) })
    }

    pub fn size(&self) -> Size {
        let (width, height) = self.image.dimensions();
        Size { width, height }
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn memory_bytes(&self) -> usize {
        self.image.as_raw().len()
    }

    /// Reset `rect ∩ buffer` to the background color. Off-buffer parts are ignored.
    pub fn clear_region(&mut self, rect: Rect) {
        let background = self.background;
        fill_rect(&mut self.image, rect, background);
    }

    /// Remember `rect` as stale; it is cleared on the next [`flush`](Self::flush).
    pub fn mark_dirty(&mut self, rect: Rect) {
        self.dirty.mark(rect);
    }

    pub fn dirty(&self) -> &DirtyRegions {
        &self.dirty
    }

    /// Clear every pending dirty rectangle, then forget them.
    pub fn flush(&mut self) {
        let background = self.background;
        for rect in self.dirty.as_slice() {
            fill_rect(&mut self.image, *rect, background);
        }
        self.dirty.clear();
    }

    /// Reset the whole buffer. A full-buffer write; not meant for every frame.
    pub fn clear(&mut self) {
        let background = self.background.0;
        for px in self.image.chunks_exact_mut(4) {
            px.copy_from_slice(&background);
        }
        self.dirty.clear();
    }

    pub(crate) fn canvas_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    /// Read-only view for the display side.
    pub fn view(&self) -> OverlayView<'_> {
        OverlayView { image: &self.image }
    }
}

/// Shared read view of the overlay pixels.
///
/// Holding a view borrows the buffer, so nothing can draw while a consumer
/// is reading it; consumers are expected to finish within the same tick.
#[derive(Clone, Copy)]
pub struct OverlayView<'a> {
    image: &'a RgbaImage,
}

impl<'a> OverlayView<'a> {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Row-major RGBA bytes, `width * 4` per row.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &'a RgbaImage {
        self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.image.get_pixel_checked(x, y).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TRANSPARENT, WHITE};
    use image::Rgba;

    #[test]
    fn allocate_fills_background() {
        let bg = Rgba([1, 2, 3, 4]);
        let buf = OverlayBuffer::allocate(8, 4, bg).unwrap();
        assert_eq!(buf.memory_bytes(), 8 * 4 * 4);
        assert!(buf.view().image().pixels().all(|p| *p == bg));
    }

    #[test]
    fn allocate_rejects_empty() {
        assert!(matches!(
            OverlayBuffer::allocate(0, 4, TRANSPARENT),
            Err(Error::AllocationError { width: 0, height: 4 })
        ));
    }

    #[test]
    fn clear_region_clamps_to_bounds() {
        let mut buf = OverlayBuffer::allocate(16, 16, TRANSPARENT).unwrap();
        fill_rect(buf.canvas_mut(), Rect::new(0, 0, 16, 16), WHITE);

        buf.clear_region(Rect::new(-4, 12, 8, 100));
        let view = buf.view();
        assert_eq!(view.pixel(0, 12), Some(TRANSPARENT));
        assert_eq!(view.pixel(3, 15), Some(TRANSPARENT));
        assert_eq!(view.pixel(4, 12), Some(WHITE));
        assert_eq!(view.pixel(0, 11), Some(WHITE));
    }

    #[test]
    fn flush_clears_marked_regions_only() {
        let mut buf = OverlayBuffer::allocate(16, 16, TRANSPARENT).unwrap();
        let before = buf.view().as_bytes().as_ptr();
        fill_rect(buf.canvas_mut(), Rect::new(0, 0, 16, 16), WHITE);

        buf.mark_dirty(Rect::new(0, 0, 4, 4));
        buf.mark_dirty(Rect::new(2, 2, 4, 4));
        assert_eq!(buf.view().pixel(1, 1), Some(WHITE));

        buf.flush();
        assert!(buf.dirty().is_empty());
        let view = buf.view();
        assert_eq!(view.pixel(1, 1), Some(TRANSPARENT));
        assert_eq!(view.pixel(5, 5), Some(TRANSPARENT));
        assert_eq!(view.pixel(6, 6), Some(WHITE));
        assert_eq!(view.as_bytes().as_ptr(), before);
    }

    #[test]
    fn clear_resets_everything() {
        let mut buf = OverlayBuffer::allocate(4, 4, TRANSPARENT).unwrap();
        fill_rect(buf.canvas_mut(), Rect::new(1, 1, 2, 2), WHITE);
        buf.mark_dirty(Rect::new(0, 0, 1, 1));
        buf.clear();
        assert!(buf.dirty().is_empty());
        assert!(buf.view().image().pixels().all(|p| *p == TRANSPARENT));
    }
}
