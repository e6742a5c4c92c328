// Core types shared by the crop geometry and the overlay compositor.

use image::Rgba;
use serde::{Deserialize, Serialize};

/// RGBA color, 8 bits per channel, stored straight (not premultiplied).
pub type Color = Rgba<u8>;

pub const TRANSPARENT: Color = Rgba([0, 0, 0, 0]);
pub const BLACK: Color = Rgba([0, 0, 0, 255]);
pub const WHITE: Color = Rgba([255, 255, 255, 255]);
pub const RED: Color = Rgba([255, 0, 0, 255]);
pub const GREEN: Color = Rgba([0, 255, 0, 255]);
pub const YELLOW: Color = Rgba([255, 255, 0, 255]);

/// Pixel dimensions of a frame, sensor or buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned pixel rectangle, (0,0) at the top-left.
///
/// The origin is signed because overlay elements may hang off the buffer
/// edge while they move; crop rectangles produced by the geometry engine are
/// always non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge.
    #[inline]
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Exclusive bottom edge.
    #[inline]
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && (self.x as i64) < other.right()
            && (other.x as i64) < self.right()
            && (self.y as i64) < other.bottom()
            && (other.y as i64) < self.bottom()
    }

    /// Intersect with `[0,width) x [0,height)`.
    ///
    /// Returns `(x0, y0, x1, y1)` in buffer coordinates with exclusive upper
    /// bounds, or `None` when nothing of the rectangle is on the buffer.
    pub fn clip(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = (self.x as i64).max(0);
        let y0 = (self.y as i64).max(0);
        let x1 = self.right().min(width as i64);
        let y1 = self.bottom().min(height as i64);
        if x1 > x0 && y1 > y0 {
            Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
        } else {
            None
        }
    }

    /// True when the rectangle lies entirely inside `[0,width) x [0,height)`.
    pub fn contained_in(&self, width: u32, height: u32) -> bool {
        self.x >= 0 && self.y >= 0 && self.right() <= width as i64 && self.bottom() <= height as i64
    }
}

/// Orientation applied by the display between the sensor image and the screen.
///
/// Flips are applied in source space first, then `transpose` swaps the axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Transform {
    pub transpose: bool,
    pub hflip: bool,
    pub vflip: bool,
}

/// The four right-angle orientations a camera is commonly mounted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl From<Rotation> for Transform {
    fn from(rotation: Rotation) -> Self {
        let (transpose, hflip, vflip) = match rotation {
            Rotation::Deg0 => (false, false, false),
            Rotation::Deg90 => (true, false, true),
            Rotation::Deg180 => (false, true, true),
            Rotation::Deg270 => (true, true, false),
        };
        Transform { transpose, hflip, vflip }
    }
}
