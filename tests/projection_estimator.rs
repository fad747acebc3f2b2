mod common;

use common::{blank_frame, frame_size, FaceBuilder, FakeDetector};
use gaze_attention::{
    EngineConfig, EstimatorKind, FailureKind, FrameResult, GazeDirection, GazeEngine, LandmarkSet,
};
use nalgebra::Point3;

fn engine() -> GazeEngine {
    GazeEngine::new(EngineConfig::default()).unwrap()
}

fn score(face: &FaceBuilder) -> FrameResult {
    engine().score_landmarks(&face.build(), frame_size(), EstimatorKind::Projection)
}

#[test]
fn centered_irises_are_attentive() {
    let result = score(&FaceBuilder::default());
    assert_eq!(result.direction(), GazeDirection::Center);
    assert!(result.attention_score() > 0.9, "{:?}", result);
    match result {
        FrameResult::Scored { pose, .. } => assert!(pose.is_none()),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn irises_at_outer_corners_look_right() {
    let result = score(&FaceBuilder::default().ratios(0.15, 0.15));
    assert_eq!(result.direction(), GazeDirection::Right);
    assert!(result.attention_score() < 0.4);
}

#[test]
fn irises_at_inner_corners_look_left() {
    let result = score(&FaceBuilder::default().ratios(0.85, 0.85));
    assert_eq!(result.direction(), GazeDirection::Left);
}

#[test]
fn disagreeing_eyes_follow_larger_deviation() {
    let result = score(&FaceBuilder::default().ratios(0.15, 0.75));
    assert_eq!(result.direction(), GazeDirection::Right);

    let result = score(&FaceBuilder::default().ratios(0.45, 0.9));
    assert_eq!(result.direction(), GazeDirection::Left);
}

#[test]
fn score_has_four_decimals() {
    let result = score(&FaceBuilder::default().ratios(0.3, 0.62));
    let s = result.attention_score();
    assert!((0.0..=1.0).contains(&s));
    assert!((s * 1e4 - (s * 1e4).round()).abs() < 1e-6);
}

#[test]
fn mesh_without_iris_counts_as_no_face() {
    let landmarks = LandmarkSet::new(vec![Point3::new(0.5, 0.5, 0.0); 468]);
    let result = engine().score_landmarks(&landmarks, frame_size(), EstimatorKind::Projection);
    assert_eq!(result.kind(), Some(FailureKind::NoFaceDetected));
    let record = result.to_record();
    assert!(record.error.unwrap().starts_with("Landmark 468"));
}

#[test]
fn no_face_gives_failure_record() {
    let mut detector = FakeDetector::empty();
    let result = engine().analyze(&mut detector, &blank_frame(), EstimatorKind::Projection);
    let record = serde_json::to_value(result.to_record()).unwrap();

    assert_eq!(record["gaze_direction"], "unknown");
    assert_eq!(record["attention_score"], 0.0);
    assert_eq!(record["error"], "No face detected");
    assert_eq!(record["error_kind"], "no_face_detected");
    assert_eq!(detector.calls, 1);
}

#[test]
fn same_landmarks_same_result() {
    let landmarks = FaceBuilder::default().ratios(0.33, 0.58).build();
    let engine = engine();
    let first = engine.score_landmarks(&landmarks, frame_size(), EstimatorKind::Projection);
    let second = engine.score_landmarks(&landmarks, frame_size(), EstimatorKind::Projection);
    assert_eq!(first, second);
}
