// Sensor-space crop windows for digital pan/tilt/zoom, and the rotation/flip
// bookkeeping needed to keep overlay coordinates lined up with the preview.
//
// Everything here is pure: same inputs, same rectangle. Safe to call from any
// thread.

use log::debug;

use crate::error::{Error, Result};
use crate::types::{Rect, Size, Transform};

/// Round down to the nearest even integer (hardware alignment).
#[inline]
fn floor_even(v: f64) -> u32 {
    ((v.max(0.0) as u32) / 2) * 2
}

/// Nearest even integer; exact ties go down so the result never overshoots.
#[inline]
fn nearest_even(v: f64) -> u32 {
    ((v / 2.0 - 0.5).ceil().max(0.0) as u32) * 2
}

/// Compute the sensor crop for a zoom factor and pan position.
///
/// The crop keeps the aspect ratio of `output`, is fully contained in the
/// sensor, and has even origin and extent. `pan = 0` aligns the crop with
/// the low edge of the sensor, `pan = 1` with the high edge.
///
/// Out-of-range input is reported, never clamped.
pub fn compute_crop(sensor: Size, output: Size, zoom: f64, pan_x: f64, pan_y: f64) -> Result<Rect> {
    if sensor.width == 0 || sensor.height == 0 {
        return Err(Error::InvalidParameter(format!(
            "sensor size {}x{} must be positive",
            sensor.width, sensor.height
        )));
    }
    if output.width == 0 || output.height == 0 {
        return Err(Error::InvalidParameter(format!(
            "output size {}x{} must be positive",
            output.width, output.height
        )));
    }
    if !(zoom.is_finite() && zoom >= 1.0) {
        return Err(Error::InvalidParameter(format!("zoom {zoom} must be >= 1.0")));
    }
    if !(0.0..=1.0).contains(&pan_x) || !(0.0..=1.0).contains(&pan_y) {
        return Err(Error::InvalidParameter(format!(
            "pan ({pan_x}, {pan_y}) must be within [0, 1]"
        )));
    }

    let sensor_w = sensor.width as f64;
    let sensor_h = sensor.height as f64;
    let aspect = output.width as f64 / output.height as f64;

    // Shrink whichever side is oversized relative to the output aspect.
    let mut crop_w = sensor_w / zoom;
    let mut crop_h = sensor_h / zoom;
    if crop_w / crop_h > aspect {
        crop_w = crop_h * aspect;
    } else {
        crop_h = crop_w / aspect;
    }

    // Floor the short side, derive the long side from it. That keeps the
    // aspect error within one pixel of the short side.
    let (width, height) = if aspect >= 1.0 {
        let h = floor_even(crop_h);
        (nearest_even(h as f64 * aspect), h)
    } else {
        let w = floor_even(crop_w);
        (w, nearest_even(w as f64 / aspect))
    };
    let width = width.min(sensor.width & !1);
    let height = height.min(sensor.height & !1);
    if width == 0 || height == 0 {
        return Err(Error::InvalidParameter(format!(
            "zoom {zoom} leaves an empty crop on a {}x{} sensor",
            sensor.width, sensor.height
        )));
    }

    let x = floor_even((sensor.width - width) as f64 * pan_x);
    let y = floor_even((sensor.height - height) as f64 * pan_y);

    let crop = Rect::new(x as i32, y as i32, width, height);
    debug!("crop zoom={zoom:.2} pan=({pan_x:.2},{pan_y:.2}) -> {crop:?}");
    Ok(crop)
}

/// Dimensions after the display transform: swapped iff `transpose`.
pub fn transformed_extent(width: u32, height: u32, transpose: bool) -> (u32, u32) {
    if transpose { (height, width) } else { (width, height) }
}

/// Linear zoom between `start` and `end`; `step` runs from 0 to `total`.
///
/// The caller supplies the pacing: call once per tick with an increasing
/// `step` and feed the result to [`compute_crop`].
pub fn interpolate_zoom(start: f64, end: f64, step: u32, total: u32) -> Result<f64> {
    if total == 0 {
        return Err(Error::InvalidParameter("transition needs at least one step".into()));
    }
    if step > total {
        return Err(Error::InvalidParameter(format!("step {step} beyond {total}")));
    }
    Ok(start + (end - start) * (step as f64 / total as f64))
}

impl Transform {
    /// Frame dimensions as seen after this transform.
    pub fn extent(&self, frame: Size) -> Size {
        let (width, height) = transformed_extent(frame.width, frame.height, self.transpose);
        Size { width, height }
    }

    /// Map a rectangle in the untransformed `frame` into transformed space.
    ///
    /// Flips mirror the rectangle inside the frame; transpose then swaps the
    /// axes, giving the drawing origin and extent on the rotated surface.
    pub fn apply_rect(&self, rect: Rect, frame: Size) -> Rect {
        let mut x = rect.x as i64;
        let mut y = rect.y as i64;
        if self.hflip {
            x = frame.width as i64 - rect.right();
        }
        if self.vflip {
            y = frame.height as i64 - rect.bottom();
        }
        if self.transpose {
            Rect::new(y as i32, x as i32, rect.height, rect.width)
        } else {
            Rect::new(x as i32, y as i32, rect.width, rect.height)
        }
    }
}
