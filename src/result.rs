use serde::{Deserialize, Serialize};

use crate::error::{FailureKind, GazeError};
use crate::estimator::{FrameScore, GazeDirection};
use crate::pose::PoseAngles;

/// Outcome of scoring one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameResult {
    Scored {
        direction: GazeDirection,
        attention_score: f64,
        pose: Option<PoseAngles>,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
}

impl FrameResult {
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        FrameResult::Failed {
            kind,
            message: message.into(),
        }
    }

    pub fn no_face() -> Self {
        Self::failed(FailureKind::NoFaceDetected, GazeError::NoFaceDetected.to_string())
    }

    pub fn is_scored(&self) -> bool {
        matches!(self, FrameResult::Scored { .. })
    }

    pub fn direction(&self) -> GazeDirection {
        match self {
            FrameResult::Scored { direction, .. } => *direction,
            FrameResult::Failed { .. } => GazeDirection::Unknown,
        }
    }

    pub fn attention_score(&self) -> f64 {
        match self {
            FrameResult::Scored {
                attention_score, ..
            } => *attention_score,
            FrameResult::Failed { .. } => 0.0,
        }
    }

    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            FrameResult::Scored { .. } => None,
            FrameResult::Failed { kind, .. } => Some(*kind),
        }
    }

    pub fn to_record(&self) -> FrameRecord {
        FrameRecord::from(self)
    }
}

impl From<FrameScore> for FrameResult {
    fn from(score: FrameScore) -> Self {
        FrameResult::Scored {
            direction: score.direction,
            attention_score: score.attention_score,
            pose: score.pose,
        }
    }
}

impl From<GazeError> for FrameResult {
    fn from(error: GazeError) -> Self {
        FrameResult::Failed {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Flat, serializable form of a [`FrameResult`].
///
/// Failures carry `"unknown"`, a zero score and zero head angles alongside
/// the error, so every record has the same fields for both estimators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub gaze_direction: GazeDirection,
    pub attention_score: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub head_pitch: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub head_yaw: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub head_roll: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_kind: Option<FailureKind>,
}

impl From<&FrameResult> for FrameRecord {
    fn from(result: &FrameResult) -> Self {
        match result {
            FrameResult::Scored {
                direction,
                attention_score,
                pose,
            } => FrameRecord {
                gaze_direction: *direction,
                attention_score: *attention_score,
                head_pitch: pose.map(|p| p.pitch),
                head_yaw: pose.map(|p| p.yaw),
                head_roll: pose.map(|p| p.roll),
                error: None,
                error_kind: None,
            },
            FrameResult::Failed { kind, message } => FrameRecord {
                gaze_direction: GazeDirection::Unknown,
                attention_score: 0.0,
                head_pitch: Some(0.0),
                head_yaw: Some(0.0),
                head_roll: Some(0.0),
                error: Some(message.clone()),
                error_kind: Some(*kind),
            },
        }
    }
}
