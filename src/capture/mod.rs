mod webcam;

pub use webcam::WebcamCapture;

use anyhow::Result;
use image::RgbImage;

/// Trait for camera capture sources.
///
/// Sources carry an explicit stream lifecycle: frames are only delivered
/// between `start` and `stop`, and `start` on a live source rebinds the
/// stream rather than stacking a second one.
pub trait CaptureSource {
    /// Begin frame delivery. An already-open stream is stopped first.
    fn start(&mut self) -> Result<()>;

    /// Release the stream; a no-op when it was never started.
    fn stop(&mut self) -> Result<()>;

    fn is_streaming(&self) -> bool;

    /// Grab the next frame. Fails when the stream is not live.
    fn capture_frame(&mut self) -> Result<RgbImage>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);
}
