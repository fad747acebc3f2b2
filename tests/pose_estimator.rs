mod common;

use common::{blank_frame, frame_size, jitter_pose_points, FaceBuilder, FakeDetector};
use gaze_attention::pose::{PoseEstimate, PoseSolver};
use gaze_attention::{
    EngineConfig, EstimatorKind, FailureKind, FrameResult, GazeDirection, GazeEngine, Result,
};
use nalgebra::{Matrix3, Point2, Point3, Vector3};

fn engine() -> GazeEngine {
    GazeEngine::new(EngineConfig::default()).unwrap()
}

fn score(face: &FaceBuilder) -> FrameResult {
    engine().score_landmarks(&face.build(), frame_size(), EstimatorKind::Pose)
}

#[test]
fn recovers_head_angles() {
    let result = score(&FaceBuilder::default().head(6.0, -9.0).eye_box_iris(0.5, 0.5));
    match result {
        FrameResult::Scored {
            pose: Some(pose), ..
        } => {
            assert!((pose.pitch - 6.0).abs() < 0.01, "{:?}", pose);
            assert!((pose.yaw + 9.0).abs() < 0.01, "{:?}", pose);
            assert!(pose.roll.abs() < 0.01, "{:?}", pose);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn jittered_landmarks_still_solve() {
    let engine = engine();
    let mut seed = 0x2545_f491_4f6c_dd1du64;

    for pitch in [-12.0, -6.0, 0.0, 6.0, 12.0] {
        for yaw in [-25.0, -10.0, 0.0, 10.0, 25.0] {
            let face = FaceBuilder::default().head(pitch, yaw).eye_box_iris(0.5, 0.5).build();
            for _ in 0..4 {
                let landmarks = jitter_pose_points(&face, &mut seed, 2.0);
                match engine.score_landmarks(&landmarks, frame_size(), EstimatorKind::Pose) {
                    FrameResult::Scored {
                        pose: Some(pose), ..
                    } => {
                        assert!((pose.pitch - pitch).abs() < 10.0, "{:?} vs {} {}", pose, pitch, yaw);
                        assert!((pose.yaw - yaw).abs() < 10.0, "{:?} vs {} {}", pose, pitch, yaw);
                        assert!(pose.roll.abs() < 10.0, "{:?} vs {} {}", pose, pitch, yaw);
                    }
                    other => panic!("pitch {} yaw {}: {:?}", pitch, yaw, other),
                }
            }
        }
    }
}

#[test]
fn turned_head_wins_over_iris() {
    let result = score(&FaceBuilder::default().head(0.0, 20.0).eye_box_iris(0.1, 0.9));
    assert_eq!(result.direction(), GazeDirection::Right);

    let result = score(&FaceBuilder::default().head(0.0, -20.0).eye_box_iris(0.5, 0.5));
    assert_eq!(result.direction(), GazeDirection::Left);
}

#[test]
fn tilted_head_looks_up_or_down() {
    let result = score(&FaceBuilder::default().head(15.0, 0.0).eye_box_iris(0.5, 0.5));
    assert_eq!(result.direction(), GazeDirection::Down);

    let result = score(&FaceBuilder::default().head(-15.0, 0.0).eye_box_iris(0.5, 0.5));
    assert_eq!(result.direction(), GazeDirection::Up);
}

#[test]
fn frontal_face_with_centered_iris_is_straight() {
    let result = score(&FaceBuilder::default().eye_box_iris(0.5, 0.5));
    assert_eq!(result.direction(), GazeDirection::Straight);
    // head and iris terms are maxed, closed lid gap adds nothing
    assert!((result.attention_score() - 0.75).abs() < 1e-3, "{:?}", result);
}

#[test]
fn open_eyes_add_openness_term() {
    let mut face = FaceBuilder::default().eye_box_iris(0.5, 0.5);
    face.lid_gap = -0.02;
    let result = score(&face);
    assert!((result.attention_score() - 1.0).abs() < 1e-3, "{:?}", result);
}

#[test]
fn iris_fallback_when_head_is_frontal() {
    let result = score(&FaceBuilder::default().eye_box_iris(0.2, 0.5));
    assert_eq!(result.direction(), GazeDirection::Left);
    let result = score(&FaceBuilder::default().eye_box_iris(0.8, 0.5));
    assert_eq!(result.direction(), GazeDirection::Right);
    let result = score(&FaceBuilder::default().eye_box_iris(0.5, 0.1));
    assert_eq!(result.direction(), GazeDirection::Up);
    let result = score(&FaceBuilder::default().eye_box_iris(0.5, 0.9));
    assert_eq!(result.direction(), GazeDirection::Down);
}

#[test]
fn no_face_record_has_zero_angles() {
    let mut detector = FakeDetector::empty();
    let result = engine().analyze(&mut detector, &blank_frame(), EstimatorKind::Pose);
    let record = serde_json::to_value(result.to_record()).unwrap();

    assert_eq!(record["gaze_direction"], "unknown");
    assert_eq!(record["attention_score"], 0.0);
    assert_eq!(record["head_pitch"], 0.0);
    assert_eq!(record["head_yaw"], 0.0);
    assert_eq!(record["error_kind"], "no_face_detected");
}

#[test]
fn scored_record_carries_angles() {
    let landmarks = FaceBuilder::default().head(0.0, 20.0).build();
    let mut detector = FakeDetector::face(landmarks);
    let result = engine().analyze(&mut detector, &blank_frame(), EstimatorKind::Pose);
    let record = result.to_record();

    assert!(record.error.is_none());
    assert!((record.head_yaw.unwrap() - 20.0).abs() < 0.01);
    assert!(record.head_pitch.is_some() && record.head_roll.is_some());
}

#[test]
fn deterministic() {
    let landmarks = FaceBuilder::default().head(4.0, 7.0).eye_box_iris(0.4, 0.55).build();
    let engine = engine();
    let first = engine.score_landmarks(&landmarks, frame_size(), EstimatorKind::Pose);
    let second = engine.score_landmarks(&landmarks, frame_size(), EstimatorKind::Pose);
    assert_eq!(first, second);
}

struct DivergingSolver;

impl PoseSolver for DivergingSolver {
    fn solve(
        &self,
        _model_points: &[Point3<f64>],
        _image_points: &[Point2<f64>],
        _camera: &Matrix3<f64>,
        _distortion: &[f64],
    ) -> Result<PoseEstimate> {
        Ok(PoseEstimate {
            success: false,
            rotation: Vector3::zeros(),
            translation: Vector3::zeros(),
        })
    }
}

#[test]
fn solver_failure_is_reported() {
    let engine = GazeEngine::with_solver(EngineConfig::default(), DivergingSolver).unwrap();
    let result = engine.score_landmarks(
        &FaceBuilder::default().build(),
        frame_size(),
        EstimatorKind::Pose,
    );
    assert_eq!(result.kind(), Some(FailureKind::UpstreamSolverFailure));
    assert_eq!(result.attention_score(), 0.0);
}
