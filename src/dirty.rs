// Rectangles whose pixels are stale since the last flush.

use crate::types::Rect;

/// Append-only list of stale rectangles.
///
/// Entries may overlap and are not merged: clearing the same pixel twice is
/// harmless, and merging would cost more than it saves for a handful of HUD
/// widgets.
#[derive(Debug, Default)]
pub struct DirtyRegions {
    rects: Vec<Rect>,
}

impl DirtyRegions {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { rects: Vec::with_capacity(capacity) }
    }

    pub fn mark(&mut self, rect: Rect) {
        if !rect.is_empty() {
            self.rects.push(rect);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn as_slice(&self) -> &[Rect] {
        &self.rects
    }

    /// True if `rect` overlaps any pending region.
    pub fn touches(&self, rect: &Rect) -> bool {
        self.rects.iter().any(|r| r.intersects(rect))
    }

    /// Forget every region; keeps the allocation for the next frame.
    pub fn clear(&mut self) {
        self.rects.clear();
    }
}
