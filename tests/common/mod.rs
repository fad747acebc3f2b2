#![allow(dead_code)]

use gaze_attention::config::CameraModel;
use gaze_attention::geometry::FrameSize;
use gaze_attention::pose::camera_matrix;
use gaze_attention::{EngineConfig, GazeError, LandmarkDetector, LandmarkSet};
use image::RgbImage;
use nalgebra::{Point3, Rotation3, Vector3};

pub const WIDTH: u32 = 640;
pub const HEIGHT: u32 = 480;

pub fn frame_size() -> FrameSize {
    FrameSize::new(WIDTH, HEIGHT)
}

/// Builds a refined 478-point mesh whose pose landmarks are the projection of
/// the default face model under a chosen head rotation.
#[derive(Debug, Clone)]
pub struct FaceBuilder {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
    pub distance: f64,
    /// Iris position along each eye's outer-to-inner corner line.
    pub left_ratio: f64,
    pub right_ratio: f64,
    /// When set, ids 473..=477 are placed at (horizontal, vertical) inside
    /// the eye box instead of along the right eye's corner line.
    pub eye_box_iris: Option<(f64, f64)>,
    pub eye_box_height: f64,
    pub lid_gap: f64,
}

impl Default for FaceBuilder {
    fn default() -> Self {
        Self {
            pitch: 0.0,
            yaw: 0.0,
            roll: 0.0,
            distance: 2000.0,
            left_ratio: 0.5,
            right_ratio: 0.5,
            eye_box_iris: None,
            eye_box_height: 0.04,
            lid_gap: 0.0,
        }
    }
}

impl FaceBuilder {
    pub fn head(mut self, pitch: f64, yaw: f64) -> Self {
        self.pitch = pitch;
        self.yaw = yaw;
        self
    }

    pub fn ratios(mut self, left: f64, right: f64) -> Self {
        self.left_ratio = left;
        self.right_ratio = right;
        self
    }

    pub fn eye_box_iris(mut self, horizontal: f64, vertical: f64) -> Self {
        self.eye_box_iris = Some((horizontal, vertical));
        self
    }

    pub fn build(&self) -> LandmarkSet {
        let size = frame_size();
        let camera = CameraModel::default();
        let layout = EngineConfig::default().landmarks;
        let k = camera_matrix(size, &camera);

        let rotation = Rotation3::from_euler_angles(
            self.pitch.to_radians(),
            self.yaw.to_radians(),
            self.roll.to_radians(),
        );
        let translation = Vector3::new(0.0, 0.0, self.distance);

        let mut points = vec![Point3::new(0.5f32, 0.5, 0.0); 478];

        for (&id, model) in layout.pose_points.iter().zip(&camera.model_points) {
            let pc = rotation * Vector3::new(model[0], model[1], model[2]) + translation;
            let v = k * pc;
            points[id] = Point3::new(
                (v.x / v.z / size.width as f64) as f32,
                (v.y / v.z / size.height as f64) as f32,
                0.0,
            );
        }

        // projection eyes: inner corners a little toward the nose
        let nose_x = points[1].x;
        let left_outer = points[33];
        let right_outer = points[263];
        let left_inner = toward(left_outer, nose_x, 0.4);
        let right_inner = toward(right_outer, nose_x, 0.4);
        points[133] = left_inner;
        points[362] = right_inner;

        for id in 468..=472 {
            points[id] = lerp(left_outer, left_inner, self.left_ratio);
        }
        for id in 473..=477 {
            points[id] = lerp(right_outer, right_inner, self.right_ratio);
        }

        // eye box for the head-pose estimator
        let eye_y = (points[33].y + points[263].y) / 2.0;
        let half = self.eye_box_height as f32 / 2.0;
        for &id in &layout.eyelid_top {
            points[id] = Point3::new(points[id].x, eye_y - half, 0.0);
        }
        for &id in &layout.eyelid_bottom {
            points[id] = Point3::new(points[id].x, eye_y + half, 0.0);
        }
        points[layout.upper_lid].y = eye_y - self.lid_gap as f32 / 2.0;
        points[layout.lower_lid].y = eye_y + self.lid_gap as f32 / 2.0;

        if let Some((h, v)) = self.eye_box_iris {
            let start = points[layout.eye_box_start].x as f64;
            let end = points[layout.eye_box_end].x as f64;
            let top = (eye_y - half) as f64;
            let bottom = (eye_y + half) as f64;
            let iris = Point3::new(
                (start + h * (end - start)) as f32,
                (top + v * (bottom - top)) as f32,
                0.0,
            );
            for id in 473..=477 {
                points[id] = iris;
            }
        }

        LandmarkSet::new(points)
    }
}

fn lerp(a: Point3<f32>, b: Point3<f32>, t: f64) -> Point3<f32> {
    let t = t as f32;
    Point3::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t, 0.0)
}

fn toward(p: Point3<f32>, target_x: f32, fraction: f32) -> Point3<f32> {
    Point3::new(p.x + (target_x - p.x) * fraction, p.y, 0.0)
}

/// Detector that returns a fixed answer.
pub struct FakeDetector {
    pub landmarks: Option<LandmarkSet>,
    pub calls: usize,
}

impl FakeDetector {
    pub fn face(landmarks: LandmarkSet) -> Self {
        Self {
            landmarks: Some(landmarks),
            calls: 0,
        }
    }

    pub fn empty() -> Self {
        Self {
            landmarks: None,
            calls: 0,
        }
    }
}

impl LandmarkDetector for FakeDetector {
    fn detect(&mut self, _image: &RgbImage) -> Result<Option<LandmarkSet>, GazeError> {
        self.calls += 1;
        Ok(self.landmarks.clone())
    }
}

pub fn blank_frame() -> RgbImage {
    RgbImage::new(WIDTH, HEIGHT)
}

/// Moves the six pose landmarks by up to `amplitude_px` pixels in x and y,
/// the way detector jitter does. Deterministic for a given seed.
pub fn jitter_pose_points(landmarks: &LandmarkSet, seed: &mut u64, amplitude_px: f64) -> LandmarkSet {
    let layout = EngineConfig::default().landmarks;
    let mut points = landmarks.points().to_vec();

    let mut next = || {
        *seed ^= *seed << 13;
        *seed ^= *seed >> 7;
        *seed ^= *seed << 17;
        (*seed >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0
    };

    for &id in &layout.pose_points {
        let dx = amplitude_px * next() / WIDTH as f64;
        let dy = amplitude_px * next() / HEIGHT as f64;
        points[id].x += dx as f32;
        points[id].y += dy as f32;
    }

    LandmarkSet::new(points)
}
