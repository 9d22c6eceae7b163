use super::CaptureSource;
use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

pub struct WebcamCapture {
    camera: Camera,
    streaming: bool,
    width: u32,
    height: u32,
}

impl WebcamCapture {
    /// Opens the device without starting the stream; frame delivery waits
    /// for `start`.
    pub fn new(device_index: u32, width: u32, height: u32) -> Result<Self> {
        tracing::info!(
            "Opening webcam {} at {}x{}",
            device_index,
            width,
            height
        );

        let index = CameraIndex::Index(device_index);
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

        let camera = Camera::new(index, requested).context("Failed to open camera")?;

        Ok(Self {
            camera,
            streaming: false,
            width,
            height,
        })
    }
}

impl CaptureSource for WebcamCapture {
    fn start(&mut self) -> Result<()> {
        if self.streaming {
            // Rebind: tear the old stream down before opening a fresh one.
            self.stop()?;
        }
        self.camera
            .open_stream()
            .context("Failed to open camera stream")?;
        self.streaming = true;
        tracing::info!("Camera stream started");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if !self.streaming {
            return Ok(());
        }
        self.camera
            .stop_stream()
            .context("Failed to stop camera stream")?;
        self.streaming = false;
        tracing::info!("Camera stream stopped");
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn capture_frame(&mut self) -> Result<RgbImage> {
        if !self.streaming {
            return Err(anyhow!("capture stream is not started"));
        }

        let frame = self.camera.frame().context("Failed to capture frame")?;

        let decoded = frame
            .decode_image::<RgbFormat>()
            .context("Failed to decode frame")?;

        Ok(decoded)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
