// FPV HUD widgets: crosshair, battery, link quality and flight mode, each
// with its own color policy. All methods chain:
//
//     hud.update_battery(11.4, 3).update_signal(82).update_flight_mode("ACRO");

use std::ops::{Deref, DerefMut};

use image::Rgba;

use crate::config::OverlaySettings;
use crate::draw::{Capability, Shape};
use crate::error::Result;
use crate::font;
use crate::overlay::Overlay;
use crate::types::{Color, GREEN, RED, Size, TRANSPARENT, WHITE, YELLOW};

pub const CROSSHAIR_COLOR: Color = Rgba([255, 0, 0, 200]);
pub const BATTERY_ORIGIN: (i32, i32) = (10, 30);
pub const SIGNAL_ORIGIN: (i32, i32) = (10, 60);
pub const FLIGHT_MODE_Y: i32 = 30;
/// Gap kept between a right-anchored label and the buffer edge.
const RIGHT_MARGIN: i32 = 10;
const LABEL_SCALE: u32 = 2;

/// Green above 3.7 V per cell, yellow above 3.5 V, red otherwise.
pub fn battery_color(volts_per_cell: f64) -> Color {
    if volts_per_cell > 3.7 {
        GREEN
    } else if volts_per_cell > 3.5 {
        YELLOW
    } else {
        RED
    }
}

/// Green above 70, yellow above 40, red otherwise.
pub fn signal_color(rssi: u8) -> Color {
    if rssi > 70 {
        GREEN
    } else if rssi > 40 {
        YELLOW
    } else {
        RED
    }
}

pub struct FpvOverlay {
    overlay: Overlay,
}

impl FpvOverlay {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Ok(Self::from_overlay(Overlay::new(width, height, TRANSPARENT, Capability::detect())?))
    }

    pub fn with_settings(size: Size, settings: &OverlaySettings) -> Result<Self> {
        Ok(Self::from_overlay(Overlay::with_settings(size, settings)?))
    }

    pub fn from_overlay(overlay: Overlay) -> Self {
        Self { overlay }
    }

    pub fn into_inner(self) -> Overlay {
        self.overlay
    }

    fn center(&self) -> (i32, i32) {
        let size = self.overlay.size();
        ((size.width / 2) as i32, (size.height / 2) as i32)
    }

    /// Two perpendicular lines of length `size` through the buffer centre.
    pub fn add_crosshair(&mut self, size: u32, color: Color, thickness: u32) -> &mut Self {
        let (cx, cy) = self.center();
        let half = (size / 2) as i32;
        self.overlay.put(
            "crosshair_v",
            Shape::Line { from: (cx, cy - half), to: (cx, cy + half), thickness },
            color,
        );
        self.overlay.put(
            "crosshair_h",
            Shape::Line { from: (cx - half, cy), to: (cx + half, cy), thickness },
            color,
        );
        self
    }

    pub fn update_battery(&mut self, voltage: f64, cell_count: u32) -> &mut Self {
        self.update_battery_at(voltage, cell_count, BATTERY_ORIGIN)
    }

    /// Pack voltage label, colored by per-cell voltage. Zero cells counts as one.
    pub fn update_battery_at(&mut self, voltage: f64, cell_count: u32, origin: (i32, i32)) -> &mut Self {
        let per_cell = voltage / cell_count.max(1) as f64;
        let label = format!("BAT: {voltage:.1}V");
        self.label("battery", origin, &label, battery_color(per_cell))
    }

    pub fn update_signal(&mut self, rssi: u8) -> &mut Self {
        self.update_signal_at(rssi, SIGNAL_ORIGIN)
    }

    /// Link quality label; `rssi` is a percentage and is capped at 100.
    pub fn update_signal_at(&mut self, rssi: u8, origin: (i32, i32)) -> &mut Self {
        let rssi = rssi.min(100);
        let label = format!("SIG: {rssi}%");
        self.label("signal", origin, &label, signal_color(rssi))
    }

    /// Flight mode label anchored to the top-right corner.
    pub fn update_flight_mode(&mut self, mode: &str) -> &mut Self {
        let (label_width, _) = font::text_extent(mode, LABEL_SCALE);
        let x = self.overlay.size().width as i32 - label_width as i32 - RIGHT_MARGIN;
        self.update_flight_mode_at(mode, (x.max(0), FLIGHT_MODE_Y))
    }

    pub fn update_flight_mode_at(&mut self, mode: &str, origin: (i32, i32)) -> &mut Self {
        self.label("flight_mode", origin, mode, WHITE)
    }

    fn label(&mut self, name: &str, origin: (i32, i32), text: &str, color: Color) -> &mut Self {
        self.overlay.put(
            name,
            Shape::Text { origin, text: text.to_owned(), scale: LABEL_SCALE, shadow: true },
            color,
        );
        self
    }
}

impl Deref for FpvOverlay {
    type Target = Overlay;

    fn deref(&self) -> &Overlay {
        &self.overlay
    }
}

impl DerefMut for FpvOverlay {
    fn deref_mut(&mut self) -> &mut Overlay {
        &mut self.overlay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rect;
    use pretty_assertions::assert_eq;

    fn hud(capability: Capability) -> FpvOverlay {
        FpvOverlay::from_overlay(Overlay::new(640, 480, TRANSPARENT, capability).unwrap())
    }

    #[test]
    fn battery_thresholds() {
        assert_eq!(battery_color(4.2), GREEN);
        assert_eq!(battery_color(3.7), YELLOW);
        assert_eq!(battery_color(3.6), YELLOW);
        assert_eq!(battery_color(3.5), RED);
        assert_eq!(battery_color(3.2), RED);
    }

    #[test]
    fn signal_thresholds() {
        assert_eq!(signal_color(100), GREEN);
        assert_eq!(signal_color(71), GREEN);
        assert_eq!(signal_color(70), YELLOW);
        assert_eq!(signal_color(41), YELLOW);
        assert_eq!(signal_color(40), RED);
        assert_eq!(signal_color(0), RED);
    }

    #[test]
    fn battery_uses_per_cell_voltage() {
        let mut h = hud(Capability::Vector);
        h.update_battery(10.8, 3);
        assert_eq!(h.get("battery").unwrap().color(), YELLOW);
        h.update_battery(12.6, 3);
        assert_eq!(h.get("battery").unwrap().color(), GREEN);
        h.update_battery(3.3, 0);
        assert_eq!(h.get("battery").unwrap().color(), RED);
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn crosshair_fallback_is_centered() {
        let mut h = hud(Capability::Basic);
        h.add_crosshair(20, CROSSHAIR_COLOR, 2);
        assert_eq!(h.get("crosshair_v").unwrap().bounds(), Rect::new(320, 230, 2, 20));
        assert_eq!(h.get("crosshair_h").unwrap().bounds(), Rect::new(310, 240, 20, 2));
        assert_eq!(h.view().pixel(320, 235), Some(CROSSHAIR_COLOR));
        assert_eq!(h.view().pixel(315, 240), Some(CROSSHAIR_COLOR));
    }

    #[test]
    fn flight_mode_anchors_top_right() {
        let mut h = hud(Capability::Vector);
        h.update_flight_mode("ACRO");
        let bounds = h.get("flight_mode").unwrap().bounds();
        // "ACRO" at scale 2 is 48 pixels wide.
        assert_eq!((bounds.x, bounds.y), (640 - 48 - 10, 30));
        assert!(bounds.right() <= 640);
    }

    #[test]
    fn chained_updates_under_fallback() {
        let mut h = hud(Capability::Basic);
        h.update_battery(11.1, 3).update_signal(150).update_flight_mode("ANGLE").flush();
        assert_eq!(h.len(), 3);
        assert_eq!(h.get("signal").unwrap().color(), GREEN);
        assert!(h.view().image().pixels().all(|p| *p == TRANSPARENT));
    }

    #[test]
    fn vector_labels_paint() {
        let mut h = hud(Capability::Vector);
        h.update_signal(55);
        let bounds = h.get("signal").unwrap().bounds();
        let view = h.view();
        let painted = (bounds.y as u32..bounds.bottom() as u32)
            .flat_map(|y| (bounds.x as u32..bounds.right() as u32).map(move |x| (x, y)))
            .filter(|&(x, y)| view.pixel(x, y) == Some(YELLOW))
            .count();
        assert!(painted > 0);
    }
}
