use super::preprocess::Preprocessor;
use super::types::{DetectError, Detection, DetectorOptions, LandmarkDetector, Mask};
use crate::landmarks::{pose, Landmark, PoseLandmarks};
use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::ArrayD;
use ort::{GraphOptimizationLevel, Session};
use std::path::Path;

/// Full-body backend.
///
/// One fused ONNX graph yields pose landmarks (with per-landmark
/// visibility), face landmarks, hand landmarks, and optionally a
/// person/background mask. Each landmark family carries its own score and
/// is gated independently, so any subset of the detection can be absent on
/// a given frame.
pub struct HolisticTracker {
    session: Session,
    preprocessor: Preprocessor,
    options: DetectorOptions,
}

impl HolisticTracker {
    pub fn new<P: AsRef<Path>>(model_path: P, options: DetectorOptions) -> Result<Self> {
        let path = model_path.as_ref();
        tracing::info!("Loading holistic model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!(
            "Holistic model loaded (segmentation {})",
            if options.enable_segmentation { "on" } else { "off" }
        );

        let edge = options.input_size();
        Ok(Self {
            session,
            preprocessor: Preprocessor::new(edge, edge),
            options,
        })
    }
}

impl LandmarkDetector for HolisticTracker {
    fn name(&self) -> &'static str {
        "holistic"
    }

    fn detect(&mut self, frame: &RgbImage) -> Result<Detection> {
        let input = self.preprocessor.tensor(frame);

        let _span = tracing::debug_span!("holistic_inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![input.view()]?)
            .context("Failed to run holistic inference")?;

        let pose_tensor = outputs
            .get("pose_landmarks")
            .ok_or(DetectError::MissingOutput("pose_landmarks"))?
            .try_extract_tensor::<f32>()?
            .view()
            .to_owned();
        let pose_score = outputs
            .get("pose_score")
            .ok_or(DetectError::MissingOutput("pose_score"))?
            .try_extract_tensor::<f32>()?
            .view()
            .to_owned();
        let face_tensor = outputs
            .get("face_landmarks")
            .ok_or(DetectError::MissingOutput("face_landmarks"))?
            .try_extract_tensor::<f32>()?
            .view()
            .to_owned();
        let face_score = outputs
            .get("face_score")
            .ok_or(DetectError::MissingOutput("face_score"))?
            .try_extract_tensor::<f32>()?
            .view()
            .to_owned();
        let hand_tensor = outputs
            .get("hand_landmarks")
            .ok_or(DetectError::MissingOutput("hand_landmarks"))?
            .try_extract_tensor::<f32>()?
            .view()
            .to_owned();
        let hand_scores = outputs
            .get("hand_scores")
            .ok_or(DetectError::MissingOutput("hand_scores"))?
            .try_extract_tensor::<f32>()?
            .view()
            .to_owned();

        let pose = extract_pose(&pose_tensor, scalar(&pose_score), &self.options)?;
        let face = if scalar(&face_score) >= self.options.min_detection_confidence {
            Some(extract_face(&face_tensor)?)
        } else {
            None
        };
        let hands = super::collect_hands(&hand_tensor, &hand_scores, &self.options)?;

        let mask = if self.options.enable_segmentation {
            let tensor = outputs
                .get("segmentation_mask")
                .ok_or(DetectError::MissingOutput("segmentation_mask"))?
                .try_extract_tensor::<f32>()?
                .view()
                .to_owned();
            Some(extract_mask(&tensor)?)
        } else {
            None
        };

        tracing::debug!(
            "Holistic frame: pose={}, face={}, hands={}",
            pose.is_some(),
            face.is_some(),
            hands.len()
        );

        Ok(Detection {
            hands,
            pose,
            face,
            mask,
        })
    }
}

fn scalar(tensor: &ArrayD<f32>) -> f32 {
    tensor.iter().copied().next().unwrap_or(0.0)
}

/// Gate the 33 pose slots. The whole pose drops below the detection
/// confidence; individual slots drop below the tracking confidence, which
/// is what leaves per-frame holes for the validator to catch.
fn extract_pose(
    tensor: &ArrayD<f32>,
    score: f32,
    options: &DetectorOptions,
) -> Result<Option<PoseLandmarks>> {
    if score < options.min_detection_confidence {
        return Ok(None);
    }
    let shape = tensor.shape();
    if shape.len() != 3 || shape[0] != 1 || shape[1] != pose::COUNT || shape[2] != 4 {
        return Err(DetectError::BadShape {
            name: "pose_landmarks",
            shape: shape.to_vec(),
        }
        .into());
    }

    let mut slots = Vec::with_capacity(pose::COUNT);
    for i in 0..pose::COUNT {
        let visibility = tensor[[0, i, 3]];
        if visibility >= options.min_tracking_confidence {
            slots.push(Some(Landmark::new(
                tensor[[0, i, 0]],
                tensor[[0, i, 1]],
                tensor[[0, i, 2]],
            )));
        } else {
            slots.push(None);
        }
    }
    Ok(Some(slots))
}

fn extract_face(tensor: &ArrayD<f32>) -> Result<Vec<Landmark>> {
    let shape = tensor.shape();
    if shape.len() != 3 || shape[0] != 1 || shape[2] != 3 {
        return Err(DetectError::BadShape {
            name: "face_landmarks",
            shape: shape.to_vec(),
        }
        .into());
    }
    let points = (0..shape[1])
        .map(|i| Landmark::new(tensor[[0, i, 0]], tensor[[0, i, 1]], tensor[[0, i, 2]]))
        .collect();
    Ok(points)
}

fn extract_mask(tensor: &ArrayD<f32>) -> Result<Mask> {
    let shape = tensor.shape();
    if shape.len() != 4 || shape[0] != 1 || shape[1] != 1 {
        return Err(DetectError::BadShape {
            name: "segmentation_mask",
            shape: shape.to_vec(),
        }
        .into());
    }
    Ok(Mask {
        data: tensor.iter().copied().collect(),
        width: shape[3] as u32,
        height: shape[2] as u32,
    })
}
