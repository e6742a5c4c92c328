// In-process settings. Every field has a default, so a settings file only
// needs the keys it wants to change.

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::draw::Capability;
use crate::error::{Error, Result};
use crate::types::{Color, Rotation, Size};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// RGBA written to cleared pixels.
    pub background: [u8; 4],
    /// Force a drawing capability instead of what the build provides.
    pub capability: Option<Capability>,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self { background: [0, 0, 0, 0], capability: None }
    }
}

impl OverlaySettings {
    pub fn background(&self) -> Color {
        Rgba(self.background)
    }

    pub fn capability(&self) -> Capability {
        self.capability.unwrap_or_else(Capability::detect)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EptzSettings {
    pub output: Size,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub zoom_step: f64,
    pub pan_step: f64,
    pub transition_steps: u32,
    pub transition_ms: u64,
    pub rotation: Rotation,
}

impl Default for EptzSettings {
    fn default() -> Self {
        Self {
            output: Size::new(640, 480),
            min_zoom: 1.0,
            max_zoom: 8.0,
            zoom_step: 0.2,
            pan_step: 0.05,
            transition_steps: 30,
            transition_ms: 1000,
            rotation: Rotation::Deg0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self { index: 0, width: 1280, height: 960, fps: 30 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub overlay: OverlaySettings,
    pub eptz: EptzSettings,
    pub camera: CameraSettings,
}

impl Settings {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }
}
