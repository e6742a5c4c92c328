// Electronic pan/tilt/zoom on top of the crop geometry: a stateful
// controller for user nudges, caller-paced transitions, and a simple
// object follower.

use core::time::Duration;

use log::debug;

use crate::collab::SensorControl;
use crate::config::EptzSettings;
use crate::error::{Error, Result};
use crate::geometry::{compute_crop, interpolate_zoom};
use crate::types::{Rect, Size};

/// Zoom factor and pan position; pan 0.5/0.5 is centred.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl View {
    pub const FULL: View = View { zoom: 1.0, pan_x: 0.5, pan_y: 0.5 };
}

impl Default for View {
    fn default() -> Self {
        View::FULL
    }
}

pub struct EptzController {
    sensor: Size,
    output: Size,
    view: View,
    min_zoom: f64,
    max_zoom: f64,
    zoom_step: f64,
    pan_step: f64,
}

impl EptzController {
    pub fn new(sensor: Size, settings: &EptzSettings) -> Result<Self> {
        if !(settings.min_zoom >= 1.0 && settings.max_zoom >= settings.min_zoom) {
            return Err(Error::InvalidParameter(format!(
                "zoom limits [{}, {}] must satisfy 1 <= min <= max",
                settings.min_zoom, settings.max_zoom
            )));
        }
        let controller = Self {
            sensor,
            output: settings.output,
            view: View { zoom: settings.min_zoom, ..View::FULL },
            min_zoom: settings.min_zoom,
            max_zoom: settings.max_zoom,
            zoom_step: settings.zoom_step,
            pan_step: settings.pan_step,
        };
        // Surface bad sensor/output sizes now rather than on the first nudge.
        controller.crop()?;
        Ok(controller)
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn sensor(&self) -> Size {
        self.sensor
    }

    pub fn output(&self) -> Size {
        self.output
    }

    /// Crop for the current view.
    pub fn crop(&self) -> Result<Rect> {
        compute_crop(self.sensor, self.output, self.view.zoom, self.view.pan_x, self.view.pan_y)
    }

    /// Push the current crop to the sensor.
    pub fn apply(&self, sensor: &mut impl SensorControl) -> Result<Rect> {
        let crop = self.crop()?;
        sensor.apply_crop(crop);
        Ok(crop)
    }

    /// Jump to `view`. Rejected (state unchanged) if the crop is invalid or
    /// the zoom is outside the controller limits.
    pub fn set_view(&mut self, view: View) -> Result<Rect> {
        if view.zoom < self.min_zoom || view.zoom > self.max_zoom {
            return Err(Error::InvalidParameter(format!(
                "zoom {} outside [{}, {}]",
                view.zoom, self.min_zoom, self.max_zoom
            )));
        }
        let crop = compute_crop(self.sensor, self.output, view.zoom, view.pan_x, view.pan_y)?;
        self.view = view;
        Ok(crop)
    }

    pub fn zoom_in(&mut self) -> &mut Self {
        self.view.zoom = (self.view.zoom + self.zoom_step).min(self.max_zoom);
        self
    }

    pub fn zoom_out(&mut self) -> &mut Self {
        self.view.zoom = (self.view.zoom - self.zoom_step).max(self.min_zoom);
        self
    }

    pub fn pan_left(&mut self) -> &mut Self {
        self.view.pan_x = (self.view.pan_x - self.pan_step).max(0.0);
        self
    }

    pub fn pan_right(&mut self) -> &mut Self {
        self.view.pan_x = (self.view.pan_x + self.pan_step).min(1.0);
        self
    }

    pub fn tilt_up(&mut self) -> &mut Self {
        self.view.pan_y = (self.view.pan_y - self.pan_step).max(0.0);
        self
    }

    pub fn tilt_down(&mut self) -> &mut Self {
        self.view.pan_y = (self.view.pan_y + self.pan_step).min(1.0);
        self
    }

    /// Back to the full field of view, centred.
    pub fn reset(&mut self) -> &mut Self {
        self.view = View { zoom: self.min_zoom, ..View::FULL };
        self
    }

    /// Transition from the current view to `zoom` (clamped to the limits).
    pub fn zoom_to(&self, zoom: f64, steps: u32) -> Transition {
        let zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        Transition::new(self.view, View { zoom, ..self.view }, steps)
    }

    /// Transition from the current view to a pan position (clamped to [0, 1]).
    pub fn pan_to(&self, pan_x: f64, pan_y: f64, steps: u32) -> Transition {
        let target = View { pan_x: pan_x.clamp(0.0, 1.0), pan_y: pan_y.clamp(0.0, 1.0), ..self.view };
        Transition::new(self.view, target, steps)
    }

    pub fn status(&self) -> String {
        let crop = match self.crop() {
            Ok(c) => format!("{},{} {}x{}", c.x, c.y, c.width, c.height),
            Err(_) => "invalid".to_owned(),
        };
        format!(
            "Zoom: {:.1}x | Pan: {:.2} | Tilt: {:.2} | Crop: {}",
            self.view.zoom, self.view.pan_x, self.view.pan_y, crop
        )
    }
}

/// Caller-paced interpolation between two views.
///
/// Yields `steps + 1` views, the first equal to the start and the last equal
/// to the target. Dropping it abandons the transition.
#[derive(Debug, Clone)]
pub struct Transition {
    from: View,
    to: View,
    step: u32,
    steps: u32,
}

impl Transition {
    pub fn new(from: View, to: View, steps: u32) -> Self {
        Self { from, to, step: 0, steps: steps.max(1) }
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Wait between consecutive views so the whole run lasts `duration`.
    pub fn interval(&self, duration: Duration) -> Duration {
        duration / self.steps
    }
}

impl Iterator for Transition {
    type Item = View;

    fn next(&mut self) -> Option<View> {
        if self.step > self.steps {
            return None;
        }
        let lerp = |a: f64, b: f64| interpolate_zoom(a, b, self.step, self.steps);
        let view = View {
            zoom: lerp(self.from.zoom, self.to.zoom).ok()?,
            pan_x: lerp(self.from.pan_x, self.to.pan_x).ok()?,
            pan_y: lerp(self.from.pan_y, self.to.pan_y).ok()?,
        };
        self.step += 1;
        Some(view)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.steps + 1).saturating_sub(self.step) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Transition {}

/// Detected object, in output-frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

/// Eases the view towards a moving object, zooming so it fills a sensible
/// share of the frame.
pub struct Tracker {
    sensor: Size,
    output: Size,
    target_zoom: f64,
    smoothing: f64,
    zoom_margin: f64,
    view: View,
}

impl Tracker {
    const MAX_ZOOM: f64 = 6.0;

    pub fn new(sensor: Size, output: Size, target_zoom: f64) -> Result<Self> {
        if output.width == 0 || output.height == 0 {
            return Err(Error::InvalidParameter(format!("output {}x{} is empty", output.width, output.height)));
        }
        if !(target_zoom.is_finite() && target_zoom >= 1.0) {
            return Err(Error::InvalidParameter(format!("target zoom {target_zoom} must be finite and >= 1")));
        }
        compute_crop(sensor, output, 1.0, 0.5, 0.5)?;
        Ok(Self { sensor, output, target_zoom, smoothing: 0.3, zoom_margin: 1.2, view: View::FULL })
    }

    /// 0.1 follows slowly, 0.9 almost snaps.
    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing.clamp(0.0, 1.0);
        self
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// Move one step towards `target` and return the crop to apply. A
    /// rejected target leaves the view where it was.
    pub fn track(&mut self, target: Target) -> Result<Rect> {
        let fields = [target.center_x, target.center_y, target.width, target.height];
        if !fields.iter().all(|v| v.is_finite()) || target.width < 0.0 || target.height < 0.0 {
            return Err(Error::InvalidParameter(format!("unusable target {target:?}")));
        }
        let (out_w, out_h) = (self.output.width as f64, self.output.height as f64);
        let pan_x = (target.center_x / out_w).clamp(0.0, 1.0);
        let pan_y = (target.center_y / out_h).clamp(0.0, 1.0);

        let size = (target.width / out_w).max(target.height / out_h);
        let desired = if size > 0.01 {
            self.target_zoom.min(1.0 / (size * self.zoom_margin)).clamp(1.0, Self::MAX_ZOOM)
        } else {
            self.target_zoom
        };

        let current = self.view;
        let next = View {
            zoom: (current.zoom + (desired - current.zoom) * self.smoothing * 0.5).max(1.0),
            pan_x: current.pan_x + (pan_x - current.pan_x) * self.smoothing,
            pan_y: current.pan_y + (pan_y - current.pan_y) * self.smoothing,
        };

        let crop = compute_crop(self.sensor, self.output, next.zoom, next.pan_x, next.pan_y)?;
        self.view = next;
        debug!("track {target:?} -> {next:?}");
        Ok(crop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SENSOR: Size = Size::new(4056, 3040);

    #[derive(Default)]
    struct FakeSensor {
        applied: Vec<Rect>,
    }

    impl SensorControl for FakeSensor {
        fn sensor_size(&self) -> Size {
            SENSOR
        }

        fn apply_crop(&mut self, crop: Rect) {
            self.applied.push(crop);
        }

        fn current_crop(&self) -> Rect {
            self.applied.last().copied().unwrap_or(Rect::new(0, 0, SENSOR.width, SENSOR.height))
        }
    }

    fn controller() -> EptzController {
        EptzController::new(SENSOR, &EptzSettings::default()).unwrap()
    }

    #[test]
    fn nudges_clamp_to_limits() {
        let mut c = controller();
        c.zoom_out();
        assert_eq!(c.view().zoom, 1.0);
        for _ in 0..100 {
            c.zoom_in().pan_right().tilt_up();
        }
        assert_eq!(c.view(), View { zoom: 8.0, pan_x: 1.0, pan_y: 0.0 });
        c.pan_left().tilt_down();
        assert!((c.view().pan_x - 0.95).abs() < 1e-9);
        assert!((c.view().pan_y - 0.05).abs() < 1e-9);
        c.reset();
        assert_eq!(c.view(), View::FULL);
    }

    #[test]
    fn apply_pushes_crop() {
        let mut sensor = FakeSensor::default();
        let mut c = controller();
        c.set_view(View { zoom: 2.0, pan_x: 0.5, pan_y: 0.5 }).unwrap();
        let crop = c.apply(&mut sensor).unwrap();
        assert_eq!(crop, Rect::new(1014, 760, 2026, 1520));
        assert_eq!(sensor.current_crop(), crop);
        assert_eq!(c.status(), "Zoom: 2.0x | Pan: 0.50 | Tilt: 0.50 | Crop: 1014,760 2026x1520");
    }

    #[test]
    fn set_view_rejects_without_changing_state() {
        let mut c = controller();
        assert!(c.set_view(View { zoom: 9.0, ..View::FULL }).is_err());
        assert!(c.set_view(View { zoom: 2.0, pan_x: 1.5, pan_y: 0.5 }).is_err());
        assert_eq!(c.view(), View::FULL);
    }

    #[test]
    fn bad_limits_rejected() {
        let settings = EptzSettings { min_zoom: 0.5, ..EptzSettings::default() };
        assert!(EptzController::new(SENSOR, &settings).is_err());
        assert!(EptzController::new(Size::new(0, 0), &EptzSettings::default()).is_err());
    }

    #[test]
    fn zoom_transition_is_linear() {
        let c = controller();
        let transition = c.zoom_to(4.0, 30);
        assert_eq!(transition.len(), 31);
        assert_eq!(transition.interval(Duration::from_millis(600)), Duration::from_millis(20));

        let views: Vec<View> = transition.collect();
        assert_eq!(views[0], View::FULL);
        assert_eq!(views[15].zoom, 2.5);
        assert_eq!(views[30].zoom, 4.0);
        assert!(views.iter().all(|v| v.pan_x == 0.5 && v.pan_y == 0.5));
    }

    #[test]
    fn pan_transition_drives_controller() {
        let mut sensor = FakeSensor::default();
        let mut c = controller();
        c.set_view(View { zoom: 2.0, ..View::FULL }).unwrap();
        for view in c.pan_to(0.0, 2.0, 4) {
            c.set_view(view).unwrap();
            c.apply(&mut sensor).unwrap();
        }
        assert_eq!(sensor.applied.len(), 5);
        assert_eq!(c.view(), View { zoom: 2.0, pan_x: 0.0, pan_y: 1.0 });
        let last = sensor.current_crop();
        assert_eq!(last.x, 0);
        assert_eq!(last.bottom(), SENSOR.height as i64);
    }

    #[test]
    fn tracker_eases_towards_target() {
        let mut t = Tracker::new(SENSOR, Size::new(640, 480), 2.5).unwrap();
        let target = Target { center_x: 480.0, center_y: 120.0, width: 80.0, height: 120.0 };
        let first = t.track(target).unwrap();
        let v1 = t.view();
        assert!((v1.pan_x - 0.575).abs() < 1e-9);
        assert!((v1.pan_y - 0.425).abs() < 1e-9);
        assert!(v1.zoom > 1.0 && v1.zoom < 2.5);

        for _ in 0..200 {
            t.track(target).unwrap();
        }
        let settled = t.view();
        assert!((settled.pan_x - 0.75).abs() < 1e-6);
        assert!((settled.pan_y - 0.25).abs() < 1e-6);
        // 1 / (0.25 * 1.2) is above the target zoom, so the target wins.
        assert!((settled.zoom - 2.5).abs() < 1e-6);
        assert!(first.contained_in(SENSOR.width, SENSOR.height));
    }

    #[test]
    fn tracker_survives_bad_detections() {
        let mut t = Tracker::new(SENSOR, Size::new(640, 480), 2.5).unwrap();
        let good = Target { center_x: 480.0, center_y: 120.0, width: 80.0, height: 120.0 };
        t.track(good).unwrap();
        let before = t.view();

        let nan = Target { center_x: f64::NAN, ..good };
        assert!(matches!(t.track(nan), Err(Error::InvalidParameter(_))));
        let inf = Target { width: f64::INFINITY, ..good };
        assert!(t.track(inf).is_err());
        assert_eq!(t.view(), before);

        let crop = t.track(good).unwrap();
        assert!(crop.contained_in(SENSOR.width, SENSOR.height));
        assert!(t.view().pan_x.is_finite());
    }

    #[test]
    fn tracker_rejects_unusable_setup() {
        assert!(Tracker::new(SENSOR, Size::new(0, 480), 2.0).is_err());
        assert!(Tracker::new(SENSOR, Size::new(640, 480), f64::NAN).is_err());
        assert!(Tracker::new(SENSOR, Size::new(640, 480), 0.5).is_err());
    }
}
