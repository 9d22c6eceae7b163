use crate::landmarks::{Landmark, PoseLandmarks};
use anyhow::{Context, Result};
use image::{imageops, GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Per-frame output of a detector.
///
/// Every field is optional by design: hands-only mode never produces pose
/// or face data, and even in holistic mode any subset can drop out on a
/// low-confidence frame. Consumers must tolerate absence.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// One 21-point set per detected hand, all-or-nothing per hand.
    pub hands: Vec<Vec<Landmark>>,
    pub pose: Option<PoseLandmarks>,
    pub face: Option<Vec<Landmark>>,
    pub mask: Option<Mask>,
}

/// Trait over the two landmark-detection backends. The session holds one
/// of each and routes frames to whichever mode is active.
pub trait LandmarkDetector {
    fn name(&self) -> &'static str;

    /// Run one inference over a frame. Landmark coordinates come back
    /// normalized to the frame.
    fn detect(&mut self, frame: &RgbImage) -> Result<Detection>;
}

/// Person/background alpha mask at model resolution, row-major,
/// 0.0 = background and 1.0 = person.
#[derive(Debug, Clone)]
pub struct Mask {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl Mask {
    /// Render the mask as a grayscale preview scaled to the given size.
    pub fn preview(&self, width: u32, height: u32) -> RgbImage {
        let gray = GrayImage::from_fn(self.width, self.height, |x, y| {
            let value = self.data[(y * self.width + x) as usize];
            Luma([(value * 255.0).clamp(0.0, 255.0) as u8])
        });
        let resized = imageops::resize(&gray, width, height, imageops::FilterType::Triangle);
        RgbImage::from_fn(width, height, |x, y| {
            let v = resized.get_pixel(x, y)[0];
            Rgb([v, v, v])
        })
    }
}

/// Recognized detector options, loadable from a TOML file. Unknown keys
/// are rejected so typos surface at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorOptions {
    pub max_num_hands: usize,
    /// Model tier 0/1/2; higher tiers run larger inputs.
    pub model_complexity: u8,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    pub enable_segmentation: bool,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            max_num_hands: 2,
            model_complexity: 1,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            enable_segmentation: false,
        }
    }
}

impl DetectorOptions {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read detector options from {}", path.display()))?;
        let options = toml::from_str(&content)
            .with_context(|| format!("Failed to parse detector options in {}", path.display()))?;
        Ok(options)
    }

    /// Square model input edge for the configured complexity tier.
    pub fn input_size(&self) -> u32 {
        match self.model_complexity {
            0 => 192,
            1 => 256,
            _ => 320,
        }
    }
}

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("model output `{0}` missing from session outputs")]
    MissingOutput(&'static str),
    #[error("model output `{name}` has unexpected shape {shape:?}")]
    BadShape {
        name: &'static str,
        shape: Vec<usize>,
    },
}
