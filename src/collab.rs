// Seams to the hardware side: the sensor/ISP that performs the crop, and the
// display that shows the overlay on top of the video.

use crate::buffer::OverlayView;
use crate::error::Result;
use crate::types::{Rect, Size, Transform};

/// Camera sensor plus the ISP that crops and scales its readout.
pub trait SensorControl {
    /// Full pixel array size.
    fn sensor_size(&self) -> Size;

    /// Request a new crop. Takes effect on a later frame, not immediately.
    fn apply_crop(&mut self, crop: Rect);

    /// Crop reported by the most recent frame metadata.
    fn current_crop(&self) -> Rect;
}

/// Preview surface that composites the overlay over the video.
pub trait OverlaySink {
    fn frame_size(&self) -> Size;

    /// Orientation the display applies to both video and overlay.
    fn transform(&self) -> Transform;

    /// Hand over the overlay for this frame. The view must not outlive the call.
    fn present_overlay(&mut self, overlay: OverlayView<'_>) -> Result<()>;
}
