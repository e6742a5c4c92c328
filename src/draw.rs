// Software drawing onto the overlay buffer.
// Rectangles are always available. Lines, circles and text need the vector
// rasterizer (cargo feature `vector`); without it they degrade to rectangles
// or draw nothing, but never fail.
//
// Every write is a straight overwrite of the destination RGBA pixel. Blending
// against the video happens later, on the display side.

use image::RgbaImage;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::font::{self, ADVANCE, GLYPH_WIDTH};
use crate::types::{BLACK, Color, Rect};

/// Which drawing backend is available. Resolved once, then injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    /// Lines, circles and text are rasterized properly.
    Vector,
    /// Rectangles only; everything else uses the fallback policy.
    Basic,
}

impl Capability {
    /// What this build can do.
    pub fn detect() -> Self {
        if cfg!(feature = "vector") { Capability::Vector } else { Capability::Basic }
    }

    pub fn has_vector(self) -> bool {
        self == Capability::Vector
    }
}

/// Element kind, as reported by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Rectangle,
    Line,
    Circle,
    Text,
}

/// A drawing operation together with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rectangle { rect: Rect, filled: bool, thickness: u32 },
    Line { from: (i32, i32), to: (i32, i32), thickness: u32 },
    Circle { center: (i32, i32), radius: u32, filled: bool, thickness: u32 },
    /// `origin` is the top-left of the first glyph.
    Text { origin: (i32, i32), text: String, scale: u32, shadow: bool },
}

impl Shape {
    pub fn kind(&self) -> Kind {
        match self {
            Shape::Rectangle { .. } => Kind::Rectangle,
            Shape::Line { .. } => Kind::Line,
            Shape::Circle { .. } => Kind::Circle,
            Shape::Text { .. } => Kind::Text,
        }
    }
}

/// Stateless rasterizer bound to a capability.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    capability: Capability,
}

impl Renderer {
    pub fn new(capability: Capability) -> Self {
        Self { capability }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Rectangle that `draw` may touch for this shape.
    pub fn bounds(&self, shape: &Shape) -> Rect {
        let vector = self.capability.has_vector();
        match *shape {
            Shape::Rectangle { rect, .. } => rect,
            Shape::Line { from, to, thickness } => {
                let t = thickness.max(1);
                let (x, y) = (from.0.min(to.0), from.1.min(to.1));
                let dx = from.0.abs_diff(to.0);
                let dy = from.1.abs_diff(to.1);
                if vector {
                    let half = (t / 2) as i32;
                    Rect::new(
                        x.saturating_sub(half),
                        y.saturating_sub(half),
                        dx.saturating_add(t),
                        dy.saturating_add(t),
                    )
                } else {
                    Rect::new(x, y, if dx == 0 { t } else { dx }, if dy == 0 { t } else { dy })
                }
            }
            Shape::Circle { center, radius, filled, thickness } => {
                let outer = if vector && !filled { radius.saturating_add(thickness / 2) } else { radius };
                let o = outer.min(i32::MAX as u32) as i32;
                let origin = (center.0.saturating_sub(o), center.1.saturating_sub(o));
                let side = if vector { outer.saturating_mul(2).saturating_add(1) } else { outer.saturating_mul(2) };
                Rect::new(origin.0, origin.1, side, side)
            }
            Shape::Text { origin, ref text, scale, shadow } => {
                let (w, h) = font::text_extent(text, scale);
                let pad = u32::from(shadow);
                Rect::new(origin.0, origin.1, w.saturating_add(pad), h.saturating_add(pad))
            }
        }
    }

    /// Rasterize `shape` in `color`. Returns false when nothing could be
    /// drawn (text without the vector capability).
    pub fn draw(&self, img: &mut RgbaImage, shape: &Shape, color: Color) -> bool {
        let (width, height) = img.dimensions();
        self.draw_clipped(img, shape, color, Rect::new(0, 0, width, height))
    }

    /// Like [`draw`](Self::draw), but pixels outside `clip` are left alone.
    pub fn draw_clipped(&self, img: &mut RgbaImage, shape: &Shape, color: Color, clip: Rect) -> bool {
        trace!("draw {:?} {:?} clip {:?}", shape.kind(), self.capability, clip);
        let vector = self.capability.has_vector();
        let mut canvas = Canvas::new(img, clip);
        match shape {
            Shape::Rectangle { rect, filled, thickness } => {
                canvas.rect(*rect, color, *filled, *thickness);
            }
            Shape::Line { from, to, thickness } if vector => {
                canvas.line(*from, *to, (*thickness).max(1), color);
            }
            Shape::Line { .. } => canvas.fill(self.bounds(shape), color),
            Shape::Circle { center, radius, filled, thickness } if vector => {
                canvas.circle(*center, *radius, *filled, (*thickness).max(1), color);
            }
            Shape::Circle { filled, thickness, .. } => {
                canvas.rect(self.bounds(shape), color, *filled, *thickness);
            }
            Shape::Text { origin, text, scale, shadow } if vector => {
                canvas.text(*origin, text, (*scale).max(1), *shadow, color);
            }
            Shape::Text { .. } => return false,
        }
        true
    }
}

/// Fill `rect ∩ image` with `color`.
pub fn fill_rect(img: &mut RgbaImage, rect: Rect, color: Color) {
    let (width, height) = img.dimensions();
    Canvas::new(img, Rect::new(0, 0, width, height)).fill(rect, color);
}

/// Image plus the window that writes are confined to. Coordinates are i64
/// so oversized shapes clip instead of overflowing.
struct Canvas<'a> {
    img: &'a mut RgbaImage,
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
}

impl<'a> Canvas<'a> {
    fn new(img: &'a mut RgbaImage, clip: Rect) -> Self {
        let (width, height) = img.dimensions();
        let (x0, y0, x1, y1) = clip.clip(width, height).unwrap_or((0, 0, 0, 0));
        Self { img, x0: x0 as i64, y0: y0 as i64, x1: x1 as i64, y1: y1 as i64 }
    }

    fn fill(&mut self, rect: Rect, color: Color) {
        self.fill_box(rect.x as i64, rect.y as i64, rect.right(), rect.bottom(), color);
    }

    /// Fill `[x0,x1) x [y0,y1)` within the clip window.
    fn fill_box(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Color) {
        let (x0, y0) = (x0.max(self.x0), y0.max(self.y0));
        let (x1, y1) = (x1.min(self.x1), y1.min(self.y1));
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let stride = self.img.width() as usize * 4;
        let buf: &mut [u8] = &mut **self.img;
        for y in y0 as usize..y1 as usize {
            let row = &mut buf[y * stride + x0 as usize * 4..y * stride + x1 as usize * 4];
            for px in row.chunks_exact_mut(4) {
                px.copy_from_slice(&color.0);
            }
        }
    }

    /// Filled rectangle, or an outline of `thickness` pixels drawn inside `rect`.
    fn rect(&mut self, rect: Rect, color: Color, filled: bool, thickness: u32) {
        let t = thickness.max(1);
        if filled || t.saturating_mul(2) >= rect.width.min(rect.height) {
            self.fill(rect, color);
            return;
        }
        let (x0, y0, x1, y1) = (rect.x as i64, rect.y as i64, rect.right(), rect.bottom());
        let t = t as i64;
        self.fill_box(x0, y0, x1, y0 + t, color); // top
        self.fill_box(x0, y1 - t, x1, y1, color); // bottom
        self.fill_box(x0, y0, x0 + t, y1, color); // left
        self.fill_box(x1 - t, y0, x1, y1, color); // right
    }

    /// Bresenham line stamped with a square brush `thickness` pixels wide.
    fn line(&mut self, from: (i32, i32), to: (i32, i32), thickness: u32, color: Color) {
        let t = thickness as i64;
        let half = t / 2;
        // Only the part of the line whose brush can reach the clip window.
        let lo = (self.x0 - t, self.y0 - t);
        let hi = (self.x1 + t, self.y1 + t);
        let from = (from.0 as i64, from.1 as i64);
        let to = (to.0 as i64, to.1 as i64);
        let Some(((mut x0, mut y0), (x1, y1))) = clip_segment(from, to, lo, hi) else {
            return;
        };

        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.fill_box(x0 - half, y0 - half, x0 - half + t, y0 - half + t, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    /// Disc, or a ring `thickness` pixels wide centred on `radius`.
    fn circle(&mut self, center: (i32, i32), radius: u32, filled: bool, thickness: u32, color: Color) {
        let outer = if filled { radius as i64 } else { radius as i64 + (thickness / 2) as i64 };
        let inner = if filled { -1 } else { outer - thickness as i64 };
        // r*r + r rounds the edge instead of leaving single-pixel nubs.
        let outer2 = outer.saturating_mul(outer).saturating_add(outer);
        let inner2 = if inner < 0 { -1 } else { inner.saturating_mul(inner).saturating_add(inner) };

        let (cx, cy) = (center.0 as i64, center.1 as i64);
        for y in (cy - outer).max(self.y0)..(cy + outer + 1).min(self.y1) {
            for x in (cx - outer).max(self.x0)..(cx + outer + 1).min(self.x1) {
                let (ox, oy) = (x - cx, y - cy);
                let d2 = ox.saturating_mul(ox).saturating_add(oy.saturating_mul(oy));
                if d2 <= outer2 && d2 > inner2 {
                    self.img.put_pixel(x as u32, y as u32, color);
                }
            }
        }
    }

    /// One 5x7 glyph, each bit blown up to a `scale` x `scale` block.
    fn glyph(&mut self, x: i64, y: i64, rows: &[u8; 7], scale: u32, color: Color) {
        let s = scale as i64;
        for (ry, bits) in rows.iter().enumerate() {
            for rx in 0..GLYPH_WIDTH as i64 {
                if bits & (1 << (4 - rx)) != 0 {
                    let (gx, gy) = (x + rx * s, y + ry as i64 * s);
                    self.fill_box(gx, gy, gx + s, gy + s, color);
                }
            }
        }
    }

    /// Text with an optional 1-pixel black drop shadow for contrast.
    fn text(&mut self, origin: (i32, i32), text: &str, scale: u32, shadow: bool, color: Color) {
        let (mut x, y) = (origin.0 as i64, origin.1 as i64);
        for ch in text.chars() {
            if x >= self.x1 {
                break;
            }
            if let Some(rows) = font::glyph(ch) {
                if shadow {
                    self.glyph(x + 1, y + 1, &rows, scale, BLACK);
                }
                self.glyph(x, y, &rows, scale, color);
            }
            x += ADVANCE as i64 * scale as i64;
        }
    }
}

/// Liang-Barsky clip of a segment to the inclusive box `lo..=hi`. Endpoints
/// already inside are returned unchanged so on-screen lines rasterize
/// identically.
fn clip_segment(
    from: (i64, i64),
    to: (i64, i64),
    lo: (i64, i64),
    hi: (i64, i64),
) -> Option<((i64, i64), (i64, i64))> {
    let inside = |p: (i64, i64)| p.0 >= lo.0 && p.0 <= hi.0 && p.1 >= lo.1 && p.1 <= hi.1;
    if inside(from) && inside(to) {
        return Some((from, to));
    }
    let (dx, dy) = ((to.0 - from.0) as f64, (to.1 - from.1) as f64);
    let (fx, fy) = (from.0 as f64, from.1 as f64);
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    for (p, q) in [
        (-dx, fx - lo.0 as f64),
        (dx, hi.0 as f64 - fx),
        (-dy, fy - lo.1 as f64),
        (dy, hi.1 as f64 - fy),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    let at = |t: f64| ((fx + t * dx).round() as i64, (fy + t * dy).round() as i64);
    let start = if t0 > 0.0 { at(t0) } else { from };
    let end = if t1 < 1.0 { at(t1) } else { to };
    Some((start, end))
}
