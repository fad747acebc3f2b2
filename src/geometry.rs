//! Coordinate conversion and iris-position ratios.
//!
//! All functions here are pure. Degenerate geometry (zero-length eye segments,
//! collapsed eye boxes) is recovered with fixed fallback values instead of
//! faulting.

use nalgebra::{Point2, Point3};

use crate::error::{GazeError, Result};
use crate::face_landmarks::LandmarkSet;

pub type PixelPoint = Point2<i32>;

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Squared segment length at or below which an eye segment counts as degenerate.
pub const DEGENERATE_SEGMENT_EPS: f64 = 1e-6;

pub const NEUTRAL_RATIO: f64 = 0.5;

/// The three pixel points that describe one eye for the projection estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeGeometry {
    pub outer: PixelPoint,
    pub inner: PixelPoint,
    pub iris: PixelPoint,
}

impl EyeGeometry {
    pub fn iris_ratio(&self) -> f64 {
        iris_ratio(self.outer, self.inner, self.iris)
    }
}

pub fn to_pixel(point: &Point3<f32>, size: FrameSize) -> PixelPoint {
    PixelPoint::new(
        (point.x as f64 * size.width as f64).round() as i32,
        (point.y as f64 * size.height as f64).round() as i32,
    )
}

/// Unrounded pixel position, as fed to the pose solver.
pub fn to_image_point(point: &Point3<f32>, size: FrameSize) -> Point2<f64> {
    Point2::new(
        point.x as f64 * size.width as f64,
        point.y as f64 * size.height as f64,
    )
}

/// Fraction of the way from `outer` to `inner` at which `iris` projects onto
/// the canthus line, clamped to [0, 1]. Degenerate segments give 0.5.
pub fn iris_ratio(outer: PixelPoint, inner: PixelPoint, iris: PixelPoint) -> f64 {
    let axis = (inner - outer).cast::<f64>();
    let offset = (iris - outer).cast::<f64>();

    let len2 = axis.norm_squared();
    if len2 <= DEGENERATE_SEGMENT_EPS {
        log::debug!("degenerate eye segment at {:?}, using neutral ratio", outer);
        return NEUTRAL_RATIO;
    }

    (axis.dot(&offset) / len2).clamp(0.0, 1.0)
}

/// Mean pixel position of the given iris ring landmarks.
pub fn iris_center_px(landmarks: &LandmarkSet, ids: &[usize], size: FrameSize) -> Result<PixelPoint> {
    if ids.is_empty() {
        return Err(GazeError::EmptyLandmarkSet);
    }

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for &id in ids {
        let p = to_pixel(&landmarks.get(id)?, size);
        sum_x += p.x as f64;
        sum_y += p.y as f64;
    }

    let n = ids.len() as f64;
    Ok(PixelPoint::new(
        (sum_x / n).round() as i32,
        (sum_y / n).round() as i32,
    ))
}

/// Mean of the given landmarks in normalized image space.
pub fn mean_normalized(landmarks: &LandmarkSet, ids: &[usize]) -> Result<Point2<f64>> {
    if ids.is_empty() {
        return Err(GazeError::EmptyLandmarkSet);
    }

    let mut sum = Point2::new(0.0, 0.0);
    for &id in ids {
        let p = landmarks.get(id)?;
        sum.x += p.x as f64;
        sum.y += p.y as f64;
    }

    let n = ids.len() as f64;
    Ok(Point2::new(sum.x / n, sum.y / n))
}

/// Position of `value` between the box edges `start` and `end`.
///
/// Spans whose magnitude is below `min_span` are widened to `min_span`,
/// keeping their sign, so a collapsed box never divides by zero.
pub fn span_ratio(value: f64, start: f64, end: f64, min_span: f64) -> f64 {
    let span = end - start;
    let span = if span.abs() < min_span {
        log::debug!("degenerate eye box span {:.6}, widening to {}", span, min_span);
        if span < 0.0 {
            -min_span
        } else {
            min_span
        }
    } else {
        span
    };
    (value - start) / span
}

pub fn eye_geometry(
    landmarks: &LandmarkSet,
    outer: usize,
    inner: usize,
    iris: &[usize],
    size: FrameSize,
) -> Result<EyeGeometry> {
    Ok(EyeGeometry {
        outer: to_pixel(&landmarks.get(outer)?, size),
        inner: to_pixel(&landmarks.get(inner)?, size),
        iris: iris_center_px(landmarks, iris, size)?,
    })
}
