mod pnp_solver;

pub use pnp_solver::IterativePnpSolver;

use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::CameraModel;
use crate::error::{GazeError, Result};
use crate::geometry::FrameSize;

/// Below this `sy` the rotation is treated as gimbal-locked.
pub const SINGULARITY_EPS: f64 = 1e-6;

/// Head rotation in degrees. Roll is diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseAngles {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

/// Output of a perspective-n-point solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimate {
    pub success: bool,
    /// Axis-angle rotation (Rodrigues vector), radians.
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
}

impl PoseEstimate {
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        Rotation3::from_scaled_axis(self.rotation).into_inner()
    }
}

pub trait PoseSolver {
    /// Recover the rotation and translation that project `model_points` onto
    /// `image_points` through `camera`.
    fn solve(
        &self,
        model_points: &[Point3<f64>],
        image_points: &[Point2<f64>],
        camera: &Matrix3<f64>,
        distortion: &[f64],
    ) -> Result<PoseEstimate>;
}

impl<S: PoseSolver + ?Sized> PoseSolver for &S {
    fn solve(
        &self,
        model_points: &[Point3<f64>],
        image_points: &[Point2<f64>],
        camera: &Matrix3<f64>,
        distortion: &[f64],
    ) -> Result<PoseEstimate> {
        (**self).solve(model_points, image_points, camera, distortion)
    }
}

/// Approximate intrinsics for an uncalibrated camera.
///
/// The principal point is `(height / 2, width / 2)`, i.e. in swapped axis
/// order, matching the convention the face model was tuned against.
pub fn camera_matrix(size: FrameSize, camera: &CameraModel) -> Matrix3<f64> {
    let focal_length = camera.focal_scale * size.width as f64;
    let half_height = size.height as f64 / 2.0;
    let half_width = size.width as f64 / 2.0;

    Matrix3::new(
        focal_length, 0.0, half_height,
        0.0, focal_length, half_width,
        0.0, 0.0, 1.0,
    )
}

/// Decompose a rotation matrix into pitch (x), yaw (y) and roll (z) in degrees.
pub fn rotation_to_euler(r: &Matrix3<f64>) -> PoseAngles {
    let sy = (r[(0, 0)] * r[(0, 0)] + r[(1, 0)] * r[(1, 0)]).sqrt();

    let (pitch, yaw, roll) = if sy >= SINGULARITY_EPS {
        (
            r[(2, 1)].atan2(r[(2, 2)]),
            (-r[(2, 0)]).atan2(sy),
            r[(1, 0)].atan2(r[(0, 0)]),
        )
    } else {
        ((-r[(1, 2)]).atan2(r[(1, 1)]), (-r[(2, 0)]).atan2(sy), 0.0)
    };

    PoseAngles {
        pitch: pitch.to_degrees(),
        yaw: yaw.to_degrees(),
        roll: roll.to_degrees(),
    }
}

/// Run the solver and turn its result into head angles.
pub fn solve_head_pose<S: PoseSolver + ?Sized>(
    solver: &S,
    model_points: &[Point3<f64>],
    image_points: &[Point2<f64>],
    size: FrameSize,
    camera: &CameraModel,
) -> Result<PoseAngles> {
    let k = camera_matrix(size, camera);
    let distortion = [0.0; 4];

    let estimate = solver.solve(model_points, image_points, &k, &distortion)?;
    if !estimate.success {
        return Err(GazeError::SolverFailure("solver did not converge".into()));
    }

    Ok(rotation_to_euler(&estimate.rotation_matrix()))
}
