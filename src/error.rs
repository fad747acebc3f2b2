use serde::{Deserialize, Serialize};

pub type Result<T, E = GazeError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum GazeError {
    #[error("No face detected")]
    NoFaceDetected,

    #[error("Landmark {id} requested but the detector returned {available} landmarks")]
    MissingLandmark { id: usize, available: usize },

    #[error("No iris landmarks available")]
    EmptyLandmarkSet,

    #[error("Pose solver failed: {0}")]
    SolverFailure(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Landmark detector failed: {0}")]
    Detector(String),

    #[error("Invalid image data: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Ort(#[from] ort::OrtError),
}

/// Coarse failure category reported alongside the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NoFaceDetected,
    UpstreamSolverFailure,
    DetectorFailure,
    InvalidInput,
    UnexpectedFault,
}

impl GazeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            GazeError::NoFaceDetected => FailureKind::NoFaceDetected,
            GazeError::SolverFailure(_) => FailureKind::UpstreamSolverFailure,
            GazeError::Detector(_) | GazeError::Ort(_) => FailureKind::DetectorFailure,
            GazeError::InvalidInput(_)
            | GazeError::Config(_)
            | GazeError::ImageDecode(_)
            | GazeError::Base64(_)
            | GazeError::Io(_)
            | GazeError::Json(_) => FailureKind::InvalidInput,
            GazeError::MissingLandmark { .. } | GazeError::EmptyLandmarkSet => {
                FailureKind::UnexpectedFault
            }
        }
    }
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NoFaceDetected => "no_face_detected",
            FailureKind::UpstreamSolverFailure => "upstream_solver_failure",
            FailureKind::DetectorFailure => "detector_failure",
            FailureKind::InvalidInput => "invalid_input",
            FailureKind::UnexpectedFault => "unexpected_fault",
        }
    }
}
