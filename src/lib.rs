//! Low-latency FPV heads-up display and digital pan/tilt/zoom.
//!
//! Two halves share one rectangle type:
//!
//! * [`geometry`] and [`eptz`] turn zoom/pan requests into even-aligned
//!   sensor crop windows and track how the display rotates the picture.
//! * [`overlay`] keeps a persistent RGBA buffer of named HUD elements and only
//!   touches the pixels that changed; [`fpv`] adds ready-made widgets.
//!
//! ```no_run
//! use fpv_hud::{FpvOverlay, fpv::CROSSHAIR_COLOR};
//!
//! let mut hud = FpvOverlay::new(640, 480)?;
//! hud.add_crosshair(20, CROSSHAIR_COLOR, 2)
//!     .update_battery(11.7, 3)
//!     .update_signal(82)
//!     .update_flight_mode("ACRO")
//!     .flush();
//! let pixels = hud.view().as_bytes();
//! # let _ = pixels;
//! # Ok::<(), fpv_hud::Error>(())
//! ```

pub mod buffer;
pub mod collab;
pub mod config;
pub mod dirty;
pub mod draw;
pub mod eptz;
pub mod error;
pub mod font;
pub mod fpv;
pub mod geometry;
pub mod overlay;
pub mod types;

pub use buffer::{OverlayBuffer, OverlayView};
pub use collab::{OverlaySink, SensorControl};
pub use config::Settings;
pub use draw::{Capability, Kind, Renderer, Shape};
pub use eptz::{EptzController, Tracker, Transition, View};
pub use error::{Error, Result};
pub use fpv::FpvOverlay;
pub use geometry::{compute_crop, interpolate_zoom, transformed_extent};
pub use overlay::{Element, ElementHandle, Overlay, Stats};
pub use types::{Color, Rect, Rotation, Size, Transform};
