use image::RgbImage;

use crate::config::EngineConfig;
use crate::error::{FailureKind, GazeError, Result};
use crate::estimator::{EstimatorKind, GazeEstimator, HeadPoseEstimator, ProjectionEstimator};
use crate::face_landmarks::{LandmarkDetector, LandmarkSet};
use crate::geometry::FrameSize;
use crate::input::ImageSource;
use crate::pose::{IterativePnpSolver, PoseSolver};
use crate::result::FrameResult;

/// Scores frames with either estimator.
///
/// The engine owns no detector. Callers keep one detector per thread and
/// pass it into every call.
pub struct GazeEngine<S = IterativePnpSolver> {
    config: EngineConfig,
    solver: S,
}

impl GazeEngine<IterativePnpSolver> {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_solver(config, IterativePnpSolver::default())
    }
}

impl<S: PoseSolver> GazeEngine<S> {
    pub fn with_solver(config: EngineConfig, solver: S) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, solver })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn analyze<D: LandmarkDetector + ?Sized>(
        &self,
        detector: &mut D,
        image: &RgbImage,
        kind: EstimatorKind,
    ) -> FrameResult {
        self.analyze_with_landmarks(detector, image, kind).0
    }

    /// Like [`analyze`](Self::analyze), also handing back the detected
    /// landmarks so callers can draw them.
    pub fn analyze_with_landmarks<D: LandmarkDetector + ?Sized>(
        &self,
        detector: &mut D,
        image: &RgbImage,
        kind: EstimatorKind,
    ) -> (FrameResult, Option<LandmarkSet>) {
        let landmarks = match detector.detect(image) {
            Ok(Some(landmarks)) => landmarks,
            Ok(None) => {
                log::warn!("frame rejected ({}): no face detected", FailureKind::NoFaceDetected.as_str());
                return (FrameResult::no_face(), None);
            }
            Err(e) => return (self.failure(kind, e), None),
        };

        let size = FrameSize::new(image.width(), image.height());
        let result = self.score_landmarks(&landmarks, size, kind);
        (result, Some(landmarks))
    }

    pub fn analyze_source<D: LandmarkDetector + ?Sized>(
        &self,
        detector: &mut D,
        source: &ImageSource,
        kind: EstimatorKind,
    ) -> FrameResult {
        match source.load() {
            Ok(image) => self.analyze(detector, &image, kind),
            Err(e) => {
                log::debug!("could not load {}", source.describe());
                self.failure(kind, e)
            }
        }
    }

    /// Score landmarks that are already available.
    pub fn score_landmarks(
        &self,
        landmarks: &LandmarkSet,
        size: FrameSize,
        kind: EstimatorKind,
    ) -> FrameResult {
        if size.width == 0 || size.height == 0 {
            return self.failure(kind, GazeError::InvalidInput("empty frame".into()));
        }

        let score = match kind {
            EstimatorKind::Projection => {
                ProjectionEstimator::new(&self.config).estimate(landmarks, size)
            }
            EstimatorKind::Pose => {
                HeadPoseEstimator::new(&self.config, &self.solver).estimate(landmarks, size)
            }
        };

        match score {
            Ok(score) => score.into(),
            Err(e) => self.failure(kind, e),
        }
    }

    fn failure(&self, estimator: EstimatorKind, error: GazeError) -> FrameResult {
        let kind = match (&error, estimator) {
            // an incomplete mesh counts as no face for the projection estimator
            (
                GazeError::MissingLandmark { .. } | GazeError::EmptyLandmarkSet,
                EstimatorKind::Projection,
            ) => FailureKind::NoFaceDetected,
            _ => error.kind(),
        };

        log::warn!("frame rejected ({}): {}", kind.as_str(), error);
        FrameResult::failed(kind, error.to_string())
    }
}
