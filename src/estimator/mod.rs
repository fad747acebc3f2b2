mod head_pose;
mod projection;

pub use head_pose::{
    attention, center_score, classify, straight_score, HeadPoseEstimator, IrisPosition,
};
pub use projection::{centeredness, combine_labels, eye_label, ProjectionEstimator};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::face_landmarks::LandmarkSet;
use crate::geometry::FrameSize;
use crate::pose::PoseAngles;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GazeDirection {
    Left,
    Right,
    Center,
    Up,
    Down,
    Straight,
    Unknown,
}

impl GazeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            GazeDirection::Left => "left",
            GazeDirection::Right => "right",
            GazeDirection::Center => "center",
            GazeDirection::Up => "up",
            GazeDirection::Down => "down",
            GazeDirection::Straight => "straight",
            GazeDirection::Unknown => "unknown",
        }
    }
}

impl fmt::Display for GazeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two estimators scores a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorKind {
    /// Iris position along each eye's canthus line.
    #[default]
    Projection,
    /// Head pose from a perspective solve plus iris position in the eye box.
    Pose,
}

/// A successful per-frame decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameScore {
    pub direction: GazeDirection,
    /// Always within [0, 1].
    pub attention_score: f64,
    pub pose: Option<PoseAngles>,
}

pub trait GazeEstimator {
    fn estimate(&self, landmarks: &LandmarkSet, size: FrameSize) -> Result<FrameScore>;
}

impl<E: GazeEstimator + ?Sized> GazeEstimator for &E {
    fn estimate(&self, landmarks: &LandmarkSet, size: FrameSize) -> Result<FrameScore> {
        (**self).estimate(landmarks, size)
    }
}
