use super::preprocess::Preprocessor;
use super::types::{DetectError, Detection, DetectorOptions, LandmarkDetector};
use anyhow::{Context, Result};
use image::RgbImage;
use ort::{GraphOptimizationLevel, Session};
use std::path::Path;

/// Hand-tracking backend.
///
/// Runs a fused detection+landmark ONNX graph: one pass over the full
/// frame yields up to N candidate hands (21 normalized landmarks each)
/// with a confidence score per candidate. Confidence gating and the
/// `max_num_hands` cap are applied here; everything inside the graph is
/// opaque.
pub struct HandTracker {
    session: Session,
    preprocessor: Preprocessor,
    options: DetectorOptions,
}

impl HandTracker {
    pub fn new<P: AsRef<Path>>(model_path: P, options: DetectorOptions) -> Result<Self> {
        let path = model_path.as_ref();
        tracing::info!("Loading hand-tracking model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!("Hand-tracking model loaded");

        let edge = options.input_size();
        Ok(Self {
            session,
            preprocessor: Preprocessor::new(edge, edge),
            options,
        })
    }
}

impl LandmarkDetector for HandTracker {
    fn name(&self) -> &'static str {
        "hands"
    }

    fn detect(&mut self, frame: &RgbImage) -> Result<Detection> {
        let input = self.preprocessor.tensor(frame);

        let _span = tracing::debug_span!("hand_inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![input.view()]?)
            .context("Failed to run hand inference")?;

        let landmarks = outputs
            .get("hand_landmarks")
            .ok_or(DetectError::MissingOutput("hand_landmarks"))?
            .try_extract_tensor::<f32>()?
            .view()
            .to_owned();
        let scores = outputs
            .get("hand_scores")
            .ok_or(DetectError::MissingOutput("hand_scores"))?
            .try_extract_tensor::<f32>()?
            .view()
            .to_owned();

        let hands = super::collect_hands(&landmarks, &scores, &self.options)?;
        tracing::debug!("Detected {} hand(s)", hands.len());

        Ok(Detection {
            hands,
            ..Detection::default()
        })
    }
}
