// Opens the camera and stands in for the ISP: every frame is cropped to the
// requested window and scaled to the output size on the host.
// A new crop is picked up on the *next* frame, like a real ScalerCrop control.

use fpv_hud::config::CameraSettings;
use fpv_hud::{Error, Rect, Result, SensorControl, Size};
use image::imageops::{self, FilterType};
use image::RgbImage;
use log::{debug, info};

// Bring in nokhwa types for camera control.
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
};

pub struct SoftwareIsp {
    cam: Camera,
    sensor: Size,
    output: Size,
    crop: Rect,
    pending: Option<Rect>,
}

impl SoftwareIsp {
    /// Open the camera as close as possible to the requested mode.
    pub fn open(settings: &CameraSettings, output: Size) -> Result<Self> {
        let idx = CameraIndex::Index(settings.index);

        let fmt = CameraFormat::new(
            Resolution::new(settings.width, settings.height),
            FrameFormat::YUYV, // uncompressed; cheap to convert to RGB
            settings.fps,
        );

        // Ask for RGB frames, prioritizing the mode closest to our request.
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        let mut cam = Camera::new(idx, req)
            .map_err(|e| Error::CameraInit(format!("Create camera: {e}")))?;

        cam.open_stream()
            .map_err(|e| Error::CameraInit(format!("Open stream: {e}")))?;

        // The actual stream might choose a slightly different resolution.
        let actual = cam.resolution();
        let sensor = Size::new(actual.width(), actual.height());
        info!("camera {} streaming {}x{}", settings.index, sensor.width, sensor.height);

        Ok(Self {
            cam,
            sensor,
            output,
            crop: Rect::new(0, 0, sensor.width, sensor.height),
            pending: None,
        })
    }

    /// Grab one frame, crop it and scale it to the output size.
    pub fn next_frame(&mut self) -> Result<RgbImage> {
        if let Some(crop) = self.pending.take() {
            debug!("crop now {crop:?}");
            self.crop = crop;
        }

        let frame = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;

        let rgb = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("Decode RGB: {e}")))?;

        // The stream may renegotiate; never read outside what we actually got.
        let (w, h) = rgb.dimensions();
        let Some((x0, y0, x1, y1)) = self.crop.clip(w, h) else {
            return Err(Error::CameraFrame(format!("crop {:?} outside {w}x{h} frame", self.crop)));
        };
        let window = imageops::crop_imm(&rgb, x0, y0, x1 - x0, y1 - y0).to_image();
        Ok(imageops::resize(&window, self.output.width, self.output.height, FilterType::Nearest))
    }
}

impl SensorControl for SoftwareIsp {
    fn sensor_size(&self) -> Size {
        self.sensor
    }

    fn apply_crop(&mut self, crop: Rect) {
        self.pending = Some(crop);
    }

    fn current_crop(&self) -> Rect {
        self.crop
    }
}
