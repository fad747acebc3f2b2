use crate::config::{EngineConfig, EyeLandmarks, ProjectionPolicy};
use crate::error::Result;
use crate::face_landmarks::LandmarkSet;
use crate::geometry::{eye_geometry, FrameSize, NEUTRAL_RATIO};

use super::{FrameScore, GazeDirection, GazeEstimator};

/// Gaze from where each iris sits along its eye's corner-to-corner line.
///
/// A ratio near 0 means the iris is at the outer corner. No head pose is
/// estimated, so `FrameScore::pose` is always `None`.
pub struct ProjectionEstimator<'a> {
    left_eye: &'a EyeLandmarks,
    right_eye: &'a EyeLandmarks,
    policy: &'a ProjectionPolicy,
}

impl<'a> ProjectionEstimator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            left_eye: &config.landmarks.left_eye,
            right_eye: &config.landmarks.right_eye,
            policy: &config.projection,
        }
    }

    /// Iris ratios for the left and right eye.
    pub fn ratios(&self, landmarks: &LandmarkSet, size: FrameSize) -> Result<(f64, f64)> {
        let left = eye_geometry(
            landmarks,
            self.left_eye.outer,
            self.left_eye.inner,
            &self.left_eye.iris,
            size,
        )?;
        let right = eye_geometry(
            landmarks,
            self.right_eye.outer,
            self.right_eye.inner,
            &self.right_eye.iris,
            size,
        )?;
        Ok((left.iris_ratio(), right.iris_ratio()))
    }

    pub fn score_ratios(&self, left: f64, right: f64) -> FrameScore {
        let direction = combine_labels(
            (eye_label(left, self.policy), left),
            (eye_label(right, self.policy), right),
            self.policy.noise_deviation,
        );

        let score = ((centeredness(left) + centeredness(right)) / 2.0).clamp(0.0, 1.0);

        FrameScore {
            direction,
            attention_score: round_to(score, self.policy.score_decimals),
            pose: None,
        }
    }
}

impl GazeEstimator for ProjectionEstimator<'_> {
    fn estimate(&self, landmarks: &LandmarkSet, size: FrameSize) -> Result<FrameScore> {
        let (left, right) = self.ratios(landmarks, size)?;
        log::debug!("iris ratios: left {:.4}, right {:.4}", left, right);
        Ok(self.score_ratios(left, right))
    }
}

pub fn eye_label(ratio: f64, policy: &ProjectionPolicy) -> GazeDirection {
    if ratio < policy.low_threshold {
        GazeDirection::Right
    } else if ratio > policy.high_threshold {
        GazeDirection::Left
    } else {
        GazeDirection::Center
    }
}

/// Merge per-eye labels. Agreement wins outright; otherwise the eye that
/// deviates more from 0.5 decides, with the left eye taking ties.
pub fn combine_labels(
    left: (GazeDirection, f64),
    right: (GazeDirection, f64),
    noise_deviation: f64,
) -> GazeDirection {
    if left.0 == right.0 {
        return left.0;
    }

    let dl = (left.1 - NEUTRAL_RATIO).abs();
    let dr = (right.1 - NEUTRAL_RATIO).abs();

    if dl.max(dr) < noise_deviation {
        GazeDirection::Center
    } else if dl >= dr {
        left.0
    } else {
        right.0
    }
}

/// 1 at a perfectly centered iris, falling linearly to 0 at either corner.
pub fn centeredness(ratio: f64) -> f64 {
    (1.0 - (ratio - NEUTRAL_RATIO).abs() / NEUTRAL_RATIO).max(0.0)
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
