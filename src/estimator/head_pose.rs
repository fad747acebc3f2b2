use nalgebra::Point3;

use crate::config::{EngineConfig, HeadPosePolicy, LandmarkLayout};
use crate::error::Result;
use crate::face_landmarks::LandmarkSet;
use crate::geometry::{mean_normalized, span_ratio, to_image_point, FrameSize, NEUTRAL_RATIO};
use crate::pose::{solve_head_pose, PoseAngles, PoseSolver};

use super::{FrameScore, GazeDirection, GazeEstimator};

/// Iris position inside the eye box, in box-relative units.
///
/// Values are not clamped: an iris outside the box gives a ratio below 0 or
/// above 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrisPosition {
    pub horizontal: f64,
    pub vertical: f64,
}

impl IrisPosition {
    pub fn centered() -> Self {
        Self {
            horizontal: NEUTRAL_RATIO,
            vertical: NEUTRAL_RATIO,
        }
    }
}

/// Gaze from head pose, falling back to the iris position when the head
/// itself faces the camera.
pub struct HeadPoseEstimator<'a, S: ?Sized> {
    config: &'a EngineConfig,
    solver: &'a S,
}

impl<'a, S: PoseSolver + ?Sized> HeadPoseEstimator<'a, S> {
    pub fn new(config: &'a EngineConfig, solver: &'a S) -> Self {
        Self { config, solver }
    }

    pub fn head_angles(&self, landmarks: &LandmarkSet, size: FrameSize) -> Result<PoseAngles> {
        let image_points = self
            .config
            .landmarks
            .pose_points
            .iter()
            .map(|&id| Ok(to_image_point(&landmarks.get(id)?, size)))
            .collect::<Result<Vec<_>>>()?;

        let model_points: Vec<Point3<f64>> = self
            .config
            .camera
            .model_points
            .iter()
            .map(|p| Point3::new(p[0], p[1], p[2]))
            .collect();

        solve_head_pose(
            self.solver,
            &model_points,
            &image_points,
            size,
            &self.config.camera,
        )
    }
}

impl<S: PoseSolver + ?Sized> GazeEstimator for HeadPoseEstimator<'_, S> {
    fn estimate(&self, landmarks: &LandmarkSet, size: FrameSize) -> Result<FrameScore> {
        let layout = &self.config.landmarks;
        let policy = &self.config.head_pose;

        let iris = iris_position(landmarks, layout, policy)?;
        let openness = eye_openness(landmarks, layout, policy)?;
        let angles = self.head_angles(landmarks, size)?;

        let direction = classify(&angles, &iris, policy);
        let attention_score = attention(&angles, &iris, openness, policy);

        log::debug!(
            "head pose pitch {:.1} yaw {:.1} roll {:.1}, iris h {:.3} v {:.3}",
            angles.pitch,
            angles.yaw,
            angles.roll,
            iris.horizontal,
            iris.vertical
        );

        Ok(FrameScore {
            direction,
            attention_score,
            pose: Some(angles),
        })
    }
}

pub(crate) fn iris_position(
    landmarks: &LandmarkSet,
    layout: &LandmarkLayout,
    policy: &HeadPosePolicy,
) -> Result<IrisPosition> {
    let iris = mean_normalized(landmarks, &layout.pose_iris)?;

    let box_start = landmarks.get(layout.eye_box_start)?.x as f64;
    let box_end = landmarks.get(layout.eye_box_end)?.x as f64;

    let mut top = f64::INFINITY;
    for &id in &layout.eyelid_top {
        top = top.min(landmarks.get(id)?.y as f64);
    }
    let mut bottom = f64::NEG_INFINITY;
    for &id in &layout.eyelid_bottom {
        bottom = bottom.max(landmarks.get(id)?.y as f64);
    }

    Ok(IrisPosition {
        horizontal: span_ratio(iris.x, box_start, box_end, policy.min_eye_span),
        vertical: span_ratio(iris.y, top, bottom, policy.min_eye_span),
    })
}

pub(crate) fn eye_openness(
    landmarks: &LandmarkSet,
    layout: &LandmarkLayout,
    policy: &HeadPosePolicy,
) -> Result<f64> {
    let upper = landmarks.get(layout.upper_lid)?.y as f64;
    let lower = landmarks.get(layout.lower_lid)?.y as f64;
    Ok((policy.openness_gain * (upper - lower)).clamp(0.0, 1.0))
}

/// First matching rule wins: yaw, then pitch, then the iris.
pub fn classify(angles: &PoseAngles, iris: &IrisPosition, policy: &HeadPosePolicy) -> GazeDirection {
    if angles.yaw.abs() > policy.yaw_threshold {
        return if angles.yaw > 0.0 {
            GazeDirection::Right
        } else {
            GazeDirection::Left
        };
    }

    if angles.pitch > policy.pitch_threshold {
        return GazeDirection::Down;
    }
    if angles.pitch < -policy.pitch_threshold {
        return GazeDirection::Up;
    }

    if iris.horizontal < policy.iris_left_threshold {
        GazeDirection::Left
    } else if iris.horizontal > policy.iris_right_threshold {
        GazeDirection::Right
    } else if iris.vertical < policy.iris_up_threshold {
        GazeDirection::Up
    } else if iris.vertical > policy.iris_down_threshold {
        GazeDirection::Down
    } else {
        GazeDirection::Straight
    }
}

pub fn straight_score(angles: &PoseAngles, policy: &HeadPosePolicy) -> f64 {
    (1.0 - (angles.pitch.abs() + angles.yaw.abs()) / policy.angle_normalizer).max(0.0)
}

pub fn center_score(iris: &IrisPosition) -> f64 {
    let h = iris.horizontal.clamp(0.0, 1.0);
    let v = iris.vertical.clamp(0.0, 1.0);
    let offset = (h - NEUTRAL_RATIO).abs() * 2.0 + (v - NEUTRAL_RATIO).abs() * 2.0;
    (1.0 - offset / 2.0).max(0.0)
}

pub fn attention(
    angles: &PoseAngles,
    iris: &IrisPosition,
    openness: f64,
    policy: &HeadPosePolicy,
) -> f64 {
    let score = policy.straight_weight * straight_score(angles, policy)
        + policy.center_weight * center_score(iris)
        + policy.openness_weight * openness.clamp(0.0, 1.0);
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn angles(pitch: f64, yaw: f64) -> PoseAngles {
        PoseAngles {
            pitch,
            yaw,
            roll: 0.0,
        }
    }

    fn iris(horizontal: f64, vertical: f64) -> IrisPosition {
        IrisPosition {
            horizontal,
            vertical,
        }
    }

    #[test]
    fn yaw_overrides_iris() {
        let policy = HeadPosePolicy::default();
        assert_eq!(
            classify(&angles(0.0, 20.0), &iris(0.1, 0.9), &policy),
            GazeDirection::Right
        );
        assert_eq!(
            classify(&angles(30.0, -16.0), &iris(0.5, 0.5), &policy),
            GazeDirection::Left
        );
    }

    #[test]
    fn pitch_before_iris() {
        let policy = HeadPosePolicy::default();
        assert_eq!(
            classify(&angles(12.0, 0.0), &iris(0.1, 0.5), &policy),
            GazeDirection::Down
        );
        assert_eq!(
            classify(&angles(-12.0, 0.0), &iris(0.5, 0.5), &policy),
            GazeDirection::Up
        );
    }

    #[test]
    fn iris_fallback() {
        let policy = HeadPosePolicy::default();
        let head = angles(0.0, 0.0);
        assert_eq!(classify(&head, &iris(0.3, 0.5), &policy), GazeDirection::Left);
        assert_eq!(classify(&head, &iris(0.7, 0.5), &policy), GazeDirection::Right);
        assert_eq!(classify(&head, &iris(0.5, 0.3), &policy), GazeDirection::Up);
        assert_eq!(classify(&head, &iris(0.5, 0.7), &policy), GazeDirection::Down);
        assert_eq!(classify(&head, &iris(0.5, 0.5), &policy), GazeDirection::Straight);
    }

    #[test]
    fn straight_face_scores() {
        let policy = HeadPosePolicy::default();
        let head = angles(0.0, 0.0);
        let centered = IrisPosition::centered();
        assert_eq!(center_score(&centered), 1.0);
        assert_eq!(straight_score(&head, &policy), 1.0);
        assert!((attention(&head, &centered, 0.0, &policy) - 0.75).abs() < 1e-12);
        assert!((attention(&head, &centered, 1.0, &policy) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn extreme_angles_stay_in_range() {
        let policy = HeadPosePolicy::default();
        let score = attention(&angles(200.0, -170.0), &iris(-3.0, 4.0), 7.0, &policy);
        assert!((0.0..=1.0).contains(&score));
        assert_eq!(straight_score(&angles(200.0, 0.0), &policy), 0.0);
    }
}
