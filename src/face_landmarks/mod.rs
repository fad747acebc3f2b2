pub mod model_mediapipe;

use image::RgbImage;
use nalgebra::Point3;

use crate::error::{GazeError, Result};

/// Number of points produced by the refined MediaPipe face mesh (468 + 10 iris).
pub const REFINED_LANDMARK_COUNT: usize = 478;

/// Face landmarks for one frame.
///
/// x and y are normalized to the image width and height, z is the detector's
/// relative depth. The set is immutable once the detector has produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point3<f32>>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point3<f32>>) -> Self {
        Self { points }
    }

    // construct from a flat vector of (x, y, z) triples
    pub fn from_vec(points: Vec<f32>) -> Self {
        let points = points
            .chunks_exact(3)
            .map(|p| Point3::new(p[0], p[1], p[2]))
            .collect();
        Self { points }
    }

    pub fn get(&self, id: usize) -> Result<Point3<f32>> {
        self.points
            .get(id)
            .copied()
            .ok_or(GazeError::MissingLandmark {
                id,
                available: self.points.len(),
            })
    }

    pub fn points(&self) -> &[Point3<f32>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True when the set carries the iris ring points of a refined mesh.
    pub fn has_iris(&self) -> bool {
        self.points.len() >= REFINED_LANDMARK_COUNT
    }
}

/// A face-landmark model.
///
/// Implementations may keep mutable inference state between calls, so one
/// handle must not be shared across threads without external locking.
pub trait LandmarkDetector {
    /// Returns `Ok(None)` when no face is present in the frame.
    fn detect(&mut self, image: &RgbImage) -> Result<Option<LandmarkSet>>;
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for Box<D> {
    fn detect(&mut self, image: &RgbImage) -> Result<Option<LandmarkSet>> {
        (**self).detect(image)
    }
}
