//! Gaze direction and attention scoring from MediaPipe face landmarks.
//!
//! Two estimators share one pipeline. The projection estimator looks at where
//! each iris sits along its eye's corner-to-corner line. The head-pose
//! estimator fits a 3D face model to six landmarks and falls back to the iris
//! position inside the eye box when the head faces the camera.

pub mod annotate;
pub mod config;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod face_landmarks;
pub mod geometry;
pub mod input;
pub mod pose;
pub mod result;

pub use config::EngineConfig;
pub use engine::GazeEngine;
pub use error::{FailureKind, GazeError, Result};
pub use estimator::{EstimatorKind, GazeDirection};
pub use face_landmarks::{LandmarkDetector, LandmarkSet};
pub use input::ImageSource;
pub use result::{FrameRecord, FrameResult};
