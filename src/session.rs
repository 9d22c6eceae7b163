//! Session state: the active capture mode, the running flag, and the
//! single-slot inference guard. This is the one piece of state that
//! outlives a frame.

use crate::detect::{Detection, LandmarkDetector};
use anyhow::Result;
use image::RgbImage;

/// The two mutually exclusive tracking modes. The session stores an
/// `Option<CaptureMode>`, so "both off" is representable and "both on"
/// is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    Hands,
    Holistic,
}

/// At most one inference may be outstanding at a time. The slot hands out
/// a token that frees it on drop; a frame that cannot get a token is
/// dropped by the caller.
#[derive(Debug, Default)]
pub struct InflightSlot {
    taken: bool,
}

pub struct InflightToken<'a> {
    slot: &'a mut InflightSlot,
}

impl InflightSlot {
    pub fn acquire(&mut self) -> Option<InflightToken<'_>> {
        if self.taken {
            return None;
        }
        self.taken = true;
        Some(InflightToken { slot: self })
    }

    pub fn is_taken(&self) -> bool {
        self.taken
    }
}

impl Drop for InflightToken<'_> {
    fn drop(&mut self) {
        self.slot.taken = false;
    }
}

/// Owns both detector backends plus the cross-frame flags, and routes
/// each frame to whichever backend the active mode selects.
pub struct TrackingSession {
    hands: Box<dyn LandmarkDetector>,
    holistic: Box<dyn LandmarkDetector>,
    mode: Option<CaptureMode>,
    running: bool,
    in_flight: InflightSlot,
}

impl TrackingSession {
    pub fn new(hands: Box<dyn LandmarkDetector>, holistic: Box<dyn LandmarkDetector>) -> Self {
        Self {
            hands,
            holistic,
            mode: None,
            running: false,
            in_flight: InflightSlot::default(),
        }
    }

    pub fn mode(&self) -> Option<CaptureMode> {
        self.mode
    }

    /// Select the active mode. Activating one mode implicitly deactivates
    /// the other; the switch takes effect on the next frame routed through
    /// `infer`, never retroactively.
    pub fn set_mode(&mut self, mode: Option<CaptureMode>) {
        if self.mode != mode {
            match mode {
                Some(CaptureMode::Hands) => tracing::info!("Mode: hands"),
                Some(CaptureMode::Holistic) => tracing::info!("Mode: holistic"),
                None => tracing::info!("Mode: off"),
            }
        }
        self.mode = mode;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn active_detector_name(&self) -> Option<&'static str> {
        match self.mode? {
            CaptureMode::Hands => Some(self.hands.name()),
            CaptureMode::Holistic => Some(self.holistic.name()),
        }
    }

    /// Run one inference in the active mode. Returns `None` when no mode
    /// is active or when a prior inference still holds the in-flight slot,
    /// in which case the caller drops the frame.
    pub fn infer(&mut self, frame: &RgbImage) -> Option<Result<Detection>> {
        let mode = self.mode?;
        let _token = self.in_flight.acquire()?;
        let detector = match mode {
            CaptureMode::Hands => self.hands.as_mut(),
            CaptureMode::Holistic => self.holistic.as_mut(),
        };
        Some(detector.detect(frame))
    }
}
