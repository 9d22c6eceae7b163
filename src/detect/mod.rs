mod hands;
mod holistic;
mod preprocess;
mod types;

pub use hands::HandTracker;
pub use holistic::HolisticTracker;
pub use preprocess::Preprocessor;
pub use types::{DetectError, Detection, DetectorOptions, LandmarkDetector, Mask};

use crate::landmarks::{Landmark, HAND_LANDMARK_COUNT};
use anyhow::Result;
use ndarray::ArrayD;

/// Map raw hand tensors into per-hand landmark sets.
///
/// Expects `landmarks` shaped `[1, candidates, 21, 3]` and `scores`
/// shaped `[1, candidates]`. Candidates below the detection confidence
/// are dropped, and at most `max_num_hands` survive, in model order.
pub(crate) fn collect_hands(
    landmarks: &ArrayD<f32>,
    scores: &ArrayD<f32>,
    options: &DetectorOptions,
) -> Result<Vec<Vec<Landmark>>> {
    let shape = landmarks.shape();
    if shape.len() != 4 || shape[0] != 1 || shape[2] != HAND_LANDMARK_COUNT || shape[3] != 3 {
        return Err(DetectError::BadShape {
            name: "hand_landmarks",
            shape: shape.to_vec(),
        }
        .into());
    }
    let candidates = shape[1];
    if scores.len() != candidates {
        return Err(DetectError::BadShape {
            name: "hand_scores",
            shape: scores.shape().to_vec(),
        }
        .into());
    }

    let mut hands = Vec::new();
    for candidate in 0..candidates {
        if hands.len() == options.max_num_hands {
            break;
        }
        if scores[[0, candidate]] < options.min_detection_confidence {
            continue;
        }
        let mut points = Vec::with_capacity(HAND_LANDMARK_COUNT);
        for i in 0..HAND_LANDMARK_COUNT {
            points.push(Landmark::new(
                landmarks[[0, candidate, i, 0]],
                landmarks[[0, candidate, i, 1]],
                landmarks[[0, candidate, i, 2]],
            ));
        }
        hands.push(points);
    }
    Ok(hands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn hand_tensors(scores: &[f32]) -> (ArrayD<f32>, ArrayD<f32>) {
        let candidates = scores.len();
        let mut data = Vec::new();
        for c in 0..candidates {
            for i in 0..HAND_LANDMARK_COUNT {
                data.extend_from_slice(&[c as f32 * 0.1, i as f32 * 0.01, 0.0]);
            }
        }
        let landmarks =
            Array::from_shape_vec(IxDyn(&[1, candidates, HAND_LANDMARK_COUNT, 3]), data)
                .unwrap();
        let scores = Array::from_shape_vec(IxDyn(&[1, candidates]), scores.to_vec()).unwrap();
        (landmarks, scores)
    }

    #[test]
    fn low_confidence_candidates_are_dropped() {
        let (landmarks, scores) = hand_tensors(&[0.9, 0.3, 0.8]);
        let options = DetectorOptions::default();
        let hands = collect_hands(&landmarks, &scores, &options).unwrap();
        assert_eq!(hands.len(), 2);
        assert_eq!(hands[0].len(), HAND_LANDMARK_COUNT);
        // The second surviving hand is candidate 2, not candidate 1.
        assert!((hands[1][0].x - 0.2).abs() < 1e-6);
    }

    #[test]
    fn max_num_hands_caps_the_result() {
        let (landmarks, scores) = hand_tensors(&[0.9, 0.9, 0.9]);
        let options = DetectorOptions {
            max_num_hands: 1,
            ..DetectorOptions::default()
        };
        let hands = collect_hands(&landmarks, &scores, &options).unwrap();
        assert_eq!(hands.len(), 1);
    }

    #[test]
    fn unexpected_shapes_are_reported_not_panicked() {
        let bad = Array::from_shape_vec(IxDyn(&[1, 2, 5, 3]), vec![0.0; 30]).unwrap();
        let scores = Array::from_shape_vec(IxDyn(&[1, 2]), vec![0.9, 0.9]).unwrap();
        let err = collect_hands(&bad, &scores, &DetectorOptions::default());
        assert!(err.is_err());
    }
}
