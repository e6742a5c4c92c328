// Named overlay elements on top of the persistent buffer.
//
// The registry keeps each element's drawing operation and bounds, never its
// pixels. Moving or hiding an element marks the old bounds dirty; `flush`
// clears the dirty rectangles and repaints, inside those rectangles only, the
// painted elements they touch in the order they were drawn.

use std::collections::HashMap;

use log::{debug, warn};
use serde::Serialize;

use crate::buffer::{OverlayBuffer, OverlayView};
use crate::config::OverlaySettings;
use crate::draw::{Capability, Kind, Renderer, Shape};
use crate::error::{Error, Result};
use crate::types::{Color, Rect, Size};

/// Stable reference to a registered element.
///
/// Handles go stale when their element is removed, even if the name is
/// reused later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone)]
pub struct Element {
    name: String,
    shape: Shape,
    color: Color,
    bounds: Rect,
    visible: bool,
    // Drawn by add/update since the last hide; `show` alone does not set it.
    painted: bool,
    // Paint order, so flush restores the stacking callers drew.
    layer: u64,
}

impl Element {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.shape.kind()
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Rectangle the element last drew into.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

struct Slot {
    generation: u32,
    element: Option<Element>,
}

/// Diagnostics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub element_count: usize,
    pub update_count: u64,
    pub width: u32,
    pub height: u32,
    pub memory_bytes: usize,
}

impl Stats {
    pub fn memory_mb(&self) -> f64 {
        self.memory_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Overlay compositor: buffer, renderer and element registry.
pub struct Overlay {
    buffer: OverlayBuffer,
    renderer: Renderer,
    slots: Vec<Slot>,
    free: Vec<u32>,
    names: HashMap<String, ElementHandle>,
    repaint: Vec<usize>,
    regions: Vec<Rect>,
    next_layer: u64,
    update_count: u64,
    text_warned: bool,
}

impl Overlay {
    pub fn new(width: u32, height: u32, background: Color, capability: Capability) -> Result<Self> {
        let buffer = OverlayBuffer::allocate(width, height, background)?;
        debug!("overlay {width}x{height} with {capability:?} rendering");
        Ok(Self {
            buffer,
            renderer: Renderer::new(capability),
            slots: Vec::new(),
            free: Vec::new(),
            names: HashMap::new(),
            repaint: Vec::new(),
            regions: Vec::new(),
            next_layer: 0,
            update_count: 0,
            text_warned: false,
        })
    }

    pub fn with_settings(size: Size, settings: &OverlaySettings) -> Result<Self> {
        Self::new(size.width, size.height, settings.background(), settings.capability())
    }

    pub fn size(&self) -> Size {
        self.buffer.size()
    }

    pub fn capability(&self) -> Capability {
        self.renderer.capability()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn buffer(&self) -> &OverlayBuffer {
        &self.buffer
    }

    /// Read view handed to the display once per frame.
    pub fn view(&self) -> OverlayView<'_> {
        self.buffer.view()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn handle(&self, name: &str) -> Option<ElementHandle> {
        self.names.get(name).copied()
    }

    pub fn element(&self, handle: ElementHandle) -> Option<&Element> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.element.as_ref()
    }

    pub fn get(&self, name: &str) -> Option<&Element> {
        self.handle(name).and_then(|h| self.element(h))
    }

    /// Register `name` and draw it. Fails if the name is taken.
    pub fn add(&mut self, name: &str, shape: Shape, color: Color) -> Result<ElementHandle> {
        if self.names.contains_key(name) {
            return Err(Error::DuplicateName(name.to_owned()));
        }
        Ok(self.insert(name, shape, color))
    }

    pub fn add_rectangle(
        &mut self,
        name: &str,
        rect: Rect,
        color: Color,
        filled: bool,
        thickness: u32,
    ) -> Result<ElementHandle> {
        self.add(name, Shape::Rectangle { rect, filled, thickness }, color)
    }

    pub fn add_line(
        &mut self,
        name: &str,
        from: (i32, i32),
        to: (i32, i32),
        color: Color,
        thickness: u32,
    ) -> Result<ElementHandle> {
        self.add(name, Shape::Line { from, to, thickness }, color)
    }

    pub fn add_circle(
        &mut self,
        name: &str,
        center: (i32, i32),
        radius: u32,
        color: Color,
        filled: bool,
        thickness: u32,
    ) -> Result<ElementHandle> {
        self.add(name, Shape::Circle { center, radius, filled, thickness }, color)
    }

    pub fn add_text(
        &mut self,
        name: &str,
        origin: (i32, i32),
        text: &str,
        color: Color,
        scale: u32,
    ) -> Result<ElementHandle> {
        self.add(name, text_shape(origin, text, scale), color)
    }

    /// Replace the geometry and appearance of `name`.
    ///
    /// The old bounds are cleared on the next flush. Hidden elements take the
    /// new geometry but stay invisible until shown and updated again.
    pub fn update(&mut self, name: &str, shape: Shape, color: Color) -> Result<&mut Self> {
        let handle = self.lookup(name)?;
        self.replace(handle, shape, color);
        Ok(self)
    }

    pub fn update_text(
        &mut self,
        name: &str,
        origin: (i32, i32),
        text: &str,
        color: Color,
        scale: u32,
    ) -> Result<&mut Self> {
        self.update(name, text_shape(origin, text, scale), color)
    }

    /// Add `name`, or update it if it already exists.
    pub fn put(&mut self, name: &str, shape: Shape, color: Color) -> &mut Self {
        match self.handle(name) {
            Some(handle) => self.replace(handle, shape, color),
            None => {
                self.insert(name, shape, color);
            }
        }
        self
    }

    /// Clear the element's pixels and stop painting it. Geometry is kept;
    /// after [`show`](Self::show) the caller must redraw with an update.
    pub fn hide(&mut self, name: &str) -> Result<&mut Self> {
        let handle = self.lookup(name)?;
        if let Some(element) = self.slots[handle.index as usize].element.as_mut() {
            element.visible = false;
            element.painted = false;
            let bounds = element.bounds;
            self.buffer.mark_dirty(bounds);
            self.buffer.clear_region(bounds);
        }
        Ok(self)
    }

    /// Mark the element visible again. Does not redraw it, and flush will not
    /// either until the next update.
    pub fn show(&mut self, name: &str) -> Result<&mut Self> {
        let handle = self.lookup(name)?;
        if let Some(element) = self.slots[handle.index as usize].element.as_mut() {
            element.visible = true;
        }
        Ok(self)
    }

    /// Clear the element's pixels and forget it; the name becomes free.
    pub fn remove(&mut self, name: &str) -> Result<&mut Self> {
        let handle = self.lookup(name)?;
        self.names.remove(name);
        let slot = &mut self.slots[handle.index as usize];
        if let Some(element) = slot.element.take() {
            self.buffer.clear_region(element.bounds);
            self.buffer.mark_dirty(element.bounds);
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        Ok(self)
    }

    /// Wipe the whole buffer and drop every element. Full-buffer write.
    pub fn clear_all(&mut self) -> &mut Self {
        self.buffer.clear();
        self.slots.clear();
        self.free.clear();
        self.names.clear();
        self.update_count += 1;
        self
    }

    /// Clear stale regions, then repaint what the painted elements had
    /// inside them, bottom layer first. Pixels outside the regions are not
    /// touched.
    pub fn flush(&mut self) -> &mut Self {
        if self.buffer.dirty().is_empty() {
            return self;
        }
        let mut regions = std::mem::take(&mut self.regions);
        regions.clear();
        regions.extend_from_slice(self.buffer.dirty().as_slice());

        let mut repaint = std::mem::take(&mut self.repaint);
        repaint.clear();
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(element) = &slot.element {
                if element.visible && element.painted && regions.iter().any(|r| r.intersects(&element.bounds)) {
                    repaint.push(index);
                }
            }
        }
        repaint.sort_by_key(|&index| self.slots[index].element.as_ref().map_or(0, |e| e.layer));
        debug!("flush {} regions, repaint {} elements", regions.len(), repaint.len());

        self.buffer.flush();
        for &index in &repaint {
            for region in &regions {
                self.draw(index, *region);
            }
        }
        self.repaint = repaint;
        self.regions = regions;
        self
    }

    pub fn stats(&self) -> Stats {
        let size = self.buffer.size();
        Stats {
            element_count: self.names.len(),
            update_count: self.update_count,
            width: size.width,
            height: size.height,
            memory_bytes: self.buffer.memory_bytes(),
        }
    }

    fn lookup(&self, name: &str) -> Result<ElementHandle> {
        self.names.get(name).copied().ok_or_else(|| Error::UnknownElement(name.to_owned()))
    }

    fn insert(&mut self, name: &str, shape: Shape, color: Color) -> ElementHandle {
        let bounds = self.renderer.bounds(&shape);
        let element =
            Element { name: name.to_owned(), shape, color, bounds, visible: true, painted: false, layer: 0 };

        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.element = Some(element);
                ElementHandle { index, generation: slot.generation }
            }
            None => {
                self.slots.push(Slot { generation: 0, element: Some(element) });
                ElementHandle { index: (self.slots.len() - 1) as u32, generation: 0 }
            }
        };
        self.names.insert(name.to_owned(), handle);

        self.paint(handle.index as usize);
        self.buffer.mark_dirty(bounds);
        self.update_count += 1;
        handle
    }

    fn replace(&mut self, handle: ElementHandle, shape: Shape, color: Color) {
        let index = handle.index as usize;
        let bounds = self.renderer.bounds(&shape);
        let Some(element) = self.slots.get_mut(index).and_then(|slot| slot.element.as_mut()) else {
            return;
        };
        let old = element.bounds;
        element.shape = shape;
        element.color = color;
        element.bounds = bounds;

        self.buffer.mark_dirty(old);
        self.paint(index);
        self.buffer.mark_dirty(bounds);
        self.update_count += 1;
    }

    /// Fresh draw of a visible element on top of everything drawn so far.
    fn paint(&mut self, index: usize) {
        let Some(element) = self.slots[index].element.as_mut() else {
            return;
        };
        if !element.visible {
            return;
        }
        element.painted = true;
        element.layer = self.next_layer;
        self.next_layer += 1;
        let size = self.buffer.size();
        self.draw(index, Rect::new(0, 0, size.width, size.height));
    }

    fn draw(&mut self, index: usize, clip: Rect) {
        let Some(element) = self.slots[index].element.as_ref() else {
            return;
        };
        let drawn = self.renderer.draw_clipped(self.buffer.canvas_mut(), &element.shape, element.color, clip);
        if !drawn && !self.text_warned {
            warn!("text rendering unavailable; text elements are tracked but not drawn");
            self.text_warned = true;
        }
    }
}

fn text_shape(origin: (i32, i32), text: &str, scale: u32) -> Shape {
    Shape::Text { origin, text: text.to_owned(), scale, shadow: true }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GREEN, RED, TRANSPARENT, WHITE};
    use pretty_assertions::assert_eq;

    fn overlay(capability: Capability) -> Overlay {
        Overlay::new(64, 48, TRANSPARENT, capability).unwrap()
    }

    fn region_is(overlay: &Overlay, rect: Rect, color: Color) -> bool {
        let view = overlay.view();
        let (x0, y0, x1, y1) = rect.clip(view.width(), view.height()).unwrap();
        (y0..y1).all(|y| (x0..x1).all(|x| view.pixel(x, y) == Some(color)))
    }

    fn filled(rect: Rect) -> Shape {
        Shape::Rectangle { rect, filled: true, thickness: 1 }
    }

    #[test]
    fn add_draws_immediately() {
        let mut o = overlay(Capability::Vector);
        let rect = Rect::new(4, 4, 8, 6);
        let h = o.add_rectangle("box", rect, RED, true, 1).unwrap();
        assert!(region_is(&o, rect, RED));
        assert_eq!(o.element(h).unwrap().bounds(), rect);
        assert_eq!(o.get("box").unwrap().kind(), Kind::Rectangle);
        assert_eq!(o.buffer().dirty().len(), 1);
    }

    #[test]
    fn duplicate_and_unknown_names() {
        let mut o = overlay(Capability::Vector);
        o.add("a", filled(Rect::new(0, 0, 2, 2)), RED).unwrap();
        assert!(matches!(o.add("a", filled(Rect::new(0, 0, 2, 2)), RED), Err(Error::DuplicateName(n)) if n == "a"));
        assert!(matches!(o.update("b", filled(Rect::new(0, 0, 2, 2)), RED), Err(Error::UnknownElement(_))));
        assert!(o.hide("b").is_err());
        assert!(o.show("b").is_err());
        assert!(o.remove("b").is_err());
    }

    #[test]
    fn update_moves_element_after_flush() {
        let mut o = overlay(Capability::Vector);
        let old = Rect::new(2, 2, 6, 6);
        let new = Rect::new(20, 10, 6, 6);
        o.add("box", filled(old), RED).unwrap();
        o.update("box", filled(new), GREEN).unwrap();

        // Old pixels linger until the flush.
        assert!(region_is(&o, old, RED));
        assert!(region_is(&o, new, GREEN));

        o.flush();
        assert!(region_is(&o, old, TRANSPARENT));
        assert!(region_is(&o, new, GREEN));
        assert!(o.buffer().dirty().is_empty());
    }

    #[test]
    fn flush_repaints_overlapping_neighbours() {
        let mut o = overlay(Capability::Vector);
        o.add("under", filled(Rect::new(0, 0, 20, 20)), RED).unwrap();
        o.add("over", filled(Rect::new(10, 10, 20, 20)), GREEN).unwrap();
        o.flush();
        o.remove("over").unwrap();
        o.flush();
        assert!(region_is(&o, Rect::new(0, 0, 20, 20), RED));
        assert!(region_is(&o, Rect::new(20, 20, 10, 10), TRANSPARENT));
    }

    #[test]
    fn update_is_idempotent() {
        let shape = Shape::Circle { center: (30, 20), radius: 7, filled: false, thickness: 2 };
        let mut once = overlay(Capability::Vector);
        once.add("c", filled(Rect::new(0, 0, 4, 4)), RED).unwrap();
        once.update("c", shape.clone(), WHITE).unwrap();
        once.flush();

        let mut twice = overlay(Capability::Vector);
        twice.add("c", filled(Rect::new(0, 0, 4, 4)), RED).unwrap();
        twice.update("c", shape.clone(), WHITE).unwrap();
        twice.update("c", shape, WHITE).unwrap();
        twice.flush();

        assert_eq!(once.view().as_bytes(), twice.view().as_bytes());
    }

    #[test]
    fn remove_restores_background_and_frees_name() {
        let mut o = overlay(Capability::Vector);
        let rect = Rect::new(5, 5, 10, 10);
        let first = o.add("box", filled(rect), RED).unwrap();
        o.remove("box").unwrap();
        assert!(region_is(&o, rect, TRANSPARENT));
        assert!(o.element(first).is_none());
        assert!(!o.contains("box"));

        let second = o.add("box", filled(rect), GREEN).unwrap();
        assert_ne!(first, second);
        assert!(region_is(&o, rect, GREEN));
    }

    #[test]
    fn hide_then_show_needs_redraw() {
        let mut o = overlay(Capability::Vector);
        let rect = Rect::new(8, 8, 10, 4);
        o.add("box", filled(rect), RED).unwrap();

        o.hide("box").unwrap().flush();
        assert!(region_is(&o, rect, TRANSPARENT));
        assert!(!o.get("box").unwrap().is_visible());

        o.show("box").unwrap();
        assert!(o.get("box").unwrap().is_visible());
        assert!(region_is(&o, rect, TRANSPARENT));

        o.update("box", filled(rect), RED).unwrap();
        assert!(region_is(&o, rect, RED));
    }

    #[test]
    fn hidden_elements_are_not_repainted() {
        let mut o = overlay(Capability::Vector);
        o.add("a", filled(Rect::new(0, 0, 10, 10)), RED).unwrap();
        o.hide("a").unwrap();
        o.update("a", filled(Rect::new(2, 2, 10, 10)), RED).unwrap();
        o.flush();
        assert!(region_is(&o, Rect::new(0, 0, 12, 12), TRANSPARENT));
    }

    #[test]
    fn basic_capability_fallbacks() {
        let mut o = overlay(Capability::Basic);
        o.add_line("l", (4, 10), (24, 10), RED, 2).unwrap();
        assert!(region_is(&o, Rect::new(4, 10, 20, 2), RED));

        let before = o.view().as_bytes().to_vec();
        let h = o.add_text("t", (30, 30), "ACRO", WHITE, 1).unwrap();
        assert_eq!(o.view().as_bytes(), &before[..]);
        assert_eq!(o.element(h).unwrap().kind(), Kind::Text);
        assert_eq!(o.len(), 2);

        // Replacing the text still clears wherever it would have been.
        o.update_text("t", (2, 2), "ANGLE", WHITE, 1).unwrap();
        assert!(o.buffer().dirty().touches(&Rect::new(30, 30, 1, 1)));
    }

    #[test]
    fn clear_all_empties_everything() {
        let mut o = overlay(Capability::Vector);
        o.add("a", filled(Rect::new(0, 0, 10, 10)), RED).unwrap();
        o.add_circle("b", (30, 30), 5, GREEN, true, 1).unwrap();
        o.clear_all();
        assert!(o.is_empty());
        assert!(o.view().image().pixels().all(|p| *p == TRANSPARENT));
        o.add("a", filled(Rect::new(0, 0, 10, 10)), RED).unwrap();
    }

    #[test]
    fn stats_track_updates() {
        let mut o = overlay(Capability::Vector);
        o.add("a", filled(Rect::new(0, 0, 10, 10)), RED).unwrap();
        o.put("a", filled(Rect::new(1, 1, 10, 10)), RED);
        o.put("b", filled(Rect::new(1, 1, 10, 10)), RED);
        let stats = o.stats();
        assert_eq!(
            stats,
            Stats { element_count: 2, update_count: 3, width: 64, height: 48, memory_bytes: 64 * 48 * 4 }
        );
        assert!(stats.memory_mb() > 0.0);
    }

    #[test]
    fn flush_keeps_stacking_order() {
        let mut o = overlay(Capability::Vector);
        o.add("under", filled(Rect::new(0, 0, 20, 20)), RED).unwrap();
        o.add("over", filled(Rect::new(10, 10, 20, 20)), GREEN).unwrap();
        o.add("dot", filled(Rect::new(0, 0, 2, 2)), WHITE).unwrap();
        o.flush();
        assert_eq!(o.view().pixel(15, 15), Some(GREEN));

        // Only the lower element is touched; the upper one must stay on top.
        o.remove("dot").unwrap().flush();
        assert_eq!(o.view().pixel(15, 15), Some(GREEN));
        assert_eq!(o.view().pixel(0, 0), Some(RED));
        assert!(region_is(&o, Rect::new(10, 10, 20, 20), GREEN));
        assert!(region_is(&o, Rect::new(0, 0, 10, 20), RED));
    }

    #[test]
    fn repaint_stays_inside_dirty_regions() {
        let mut o = overlay(Capability::Vector);
        o.add("under", filled(Rect::new(0, 0, 30, 30)), RED).unwrap();
        o.add("over", filled(Rect::new(5, 5, 10, 10)), GREEN).unwrap();
        o.flush();
        o.update("under", filled(Rect::new(0, 0, 30, 30)), WHITE).unwrap();
        // A fresh draw goes on top of everything drawn before it.
        assert_eq!(o.view().pixel(8, 8), Some(WHITE));
        o.flush();
        assert!(region_is(&o, Rect::new(0, 0, 30, 30), WHITE));
    }

    #[test]
    fn show_then_neighbour_does_not_restore() {
        let mut o = overlay(Capability::Vector);
        let rect = Rect::new(8, 8, 10, 10);
        o.add("box", filled(rect), RED).unwrap();
        o.flush();
        o.hide("box").unwrap().flush();
        assert_eq!(o.view().pixel(10, 10), Some(TRANSPARENT));

        o.show("box").unwrap();
        o.add("neighbour", filled(Rect::new(14, 14, 10, 10)), GREEN).unwrap();
        o.flush();
        assert_eq!(o.view().pixel(10, 10), Some(TRANSPARENT));
        assert_eq!(o.view().pixel(16, 16), Some(GREEN));

        o.put("box", filled(rect), RED).flush();
        assert_eq!(o.view().pixel(10, 10), Some(RED));
    }

    #[test]
    fn put_adds_then_updates() {
        let mut o = overlay(Capability::Vector);
        o.put("a", filled(Rect::new(0, 0, 4, 4)), RED);
        let first = o.handle("a").unwrap();
        o.put("a", filled(Rect::new(8, 8, 4, 4)), GREEN).flush();
        assert_eq!(o.handle("a"), Some(first));
        assert_eq!(o.len(), 1);
        assert!(region_is(&o, Rect::new(0, 0, 4, 4), TRANSPARENT));
        assert!(region_is(&o, Rect::new(8, 8, 4, 4), GREEN));
    }
}
