use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GazeError, Result};

/// Every landmark id, threshold and weight the engine uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub landmarks: LandmarkLayout,
    pub projection: ProjectionPolicy,
    pub head_pose: HeadPosePolicy,
    pub camera: CameraModel,
    pub detector: DetectorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EyeLandmarks {
    pub outer: usize,
    pub inner: usize,
    pub iris: Vec<usize>,
}

/// MediaPipe face mesh ids (refined, 478 points).
///
/// `left_eye`/`right_eye` follow the subject's anatomy and feed the projection
/// estimator. The head-pose estimator reads the eye box through
/// `eye_box_start`/`eye_box_end`, which are named after the detector's own
/// left/right-eye numbering and are therefore mirrored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkLayout {
    pub left_eye: EyeLandmarks,
    pub right_eye: EyeLandmarks,
    pub pose_iris: Vec<usize>,
    pub eye_box_start: usize,
    pub eye_box_end: usize,
    pub eyelid_top: Vec<usize>,
    pub eyelid_bottom: Vec<usize>,
    pub upper_lid: usize,
    pub lower_lid: usize,
    /// Detector ids matched one-to-one with `CameraModel::model_points`.
    pub pose_points: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionPolicy {
    pub low_threshold: f64,
    pub high_threshold: f64,
    /// Disagreeing eyes whose larger deviation stays below this count as centered.
    pub noise_deviation: f64,
    pub score_decimals: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadPosePolicy {
    pub yaw_threshold: f64,
    pub pitch_threshold: f64,
    pub iris_left_threshold: f64,
    pub iris_right_threshold: f64,
    pub iris_up_threshold: f64,
    pub iris_down_threshold: f64,
    pub min_eye_span: f64,
    pub angle_normalizer: f64,
    pub openness_gain: f64,
    pub straight_weight: f64,
    pub center_weight: f64,
    pub openness_weight: f64,
}

/// Approximate pinhole camera and the canonical face model fitted against it.
///
/// Model points are expressed in the camera frame convention (x right, y down,
/// z away from the camera) so that a frontal face solves to a near-identity
/// rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraModel {
    /// Focal length as a multiple of the image width.
    pub focal_scale: f64,
    pub model_points: Vec<[f64; 3]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub model_path: PathBuf,
    pub input_size: u32,
    pub intra_threads: i16,
    pub face_confidence: f32,
}

impl Default for LandmarkLayout {
    fn default() -> Self {
        Self {
            left_eye: EyeLandmarks {
                outer: 33,
                inner: 133,
                iris: vec![468, 469, 470, 471, 472],
            },
            right_eye: EyeLandmarks {
                outer: 263,
                inner: 362,
                iris: vec![473, 474, 475, 476, 477],
            },
            pose_iris: vec![473, 474, 475, 476],
            eye_box_start: 263,
            eye_box_end: 33,
            eyelid_top: vec![27, 257],
            eyelid_bottom: vec![30, 260],
            upper_lid: 386,
            lower_lid: 374,
            pose_points: vec![1, 199, 33, 263, 61, 291],
        }
    }
}

impl Default for ProjectionPolicy {
    fn default() -> Self {
        Self {
            low_threshold: 0.4,
            high_threshold: 0.6,
            noise_deviation: 0.1,
            score_decimals: 4,
        }
    }
}

impl Default for HeadPosePolicy {
    fn default() -> Self {
        Self {
            yaw_threshold: 15.0,
            pitch_threshold: 10.0,
            iris_left_threshold: 0.35,
            iris_right_threshold: 0.65,
            iris_up_threshold: 0.4,
            iris_down_threshold: 0.6,
            min_eye_span: 0.001,
            angle_normalizer: 180.0,
            openness_gain: 100.0,
            straight_weight: 0.4,
            center_weight: 0.35,
            openness_weight: 0.25,
        }
    }
}

impl Default for CameraModel {
    fn default() -> Self {
        Self {
            focal_scale: 1.0,
            model_points: vec![
                [0.0, 0.0, 0.0],        // nose tip
                [0.0, 330.0, 65.0],     // chin
                [-225.0, -170.0, 135.0], // eye outer corner, image left
                [225.0, -170.0, 135.0],  // eye outer corner, image right
                [-150.0, 150.0, 125.0],  // mouth corner, image left
                [150.0, 150.0, 125.0],   // mouth corner, image right
            ],
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/face_landmarks_detector.onnx"),
            input_size: 256,
            intra_threads: 1,
            face_confidence: 0.5,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            landmarks: LandmarkLayout::default(),
            projection: ProjectionPolicy::default(),
            head_pose: HeadPosePolicy::default(),
            camera: CameraModel::default(),
            detector: DetectorConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let layout = &self.landmarks;
        if layout.left_eye.iris.is_empty()
            || layout.right_eye.iris.is_empty()
            || layout.pose_iris.is_empty()
        {
            return Err(GazeError::Config("iris landmark sets must not be empty".into()));
        }
        if layout.eyelid_top.is_empty() || layout.eyelid_bottom.is_empty() {
            return Err(GazeError::Config("eyelid landmark sets must not be empty".into()));
        }
        if layout.pose_points.len() != self.camera.model_points.len() {
            return Err(GazeError::Config(format!(
                "{} pose landmarks but {} model points",
                layout.pose_points.len(),
                self.camera.model_points.len()
            )));
        }
        if self.camera.model_points.len() < 6 {
            return Err(GazeError::Config(
                "at least six model points are required for the pose solve".into(),
            ));
        }
        if !(self.camera.focal_scale > 0.0) {
            return Err(GazeError::Config("focal_scale must be positive".into()));
        }

        let projection = &self.projection;
        if !(0.0..=1.0).contains(&projection.low_threshold)
            || !(0.0..=1.0).contains(&projection.high_threshold)
            || projection.low_threshold > projection.high_threshold
        {
            return Err(GazeError::Config(
                "projection thresholds must satisfy 0 <= low <= high <= 1".into(),
            ));
        }

        let pose = &self.head_pose;
        if pose.iris_left_threshold > pose.iris_right_threshold
            || pose.iris_up_threshold > pose.iris_down_threshold
        {
            return Err(GazeError::Config("iris thresholds are out of order".into()));
        }
        if !(pose.min_eye_span > 0.0) || !(pose.angle_normalizer > 0.0) {
            return Err(GazeError::Config(
                "min_eye_span and angle_normalizer must be positive".into(),
            ));
        }
        let weights = [pose.straight_weight, pose.center_weight, pose.openness_weight];
        if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err(GazeError::Config("scoring weights must be non-negative".into()));
        }
        if !(0.0..=1.0).contains(&self.detector.face_confidence) {
            return Err(GazeError::Config("face_confidence must lie in [0, 1]".into()));
        }
        Ok(())
    }
}
