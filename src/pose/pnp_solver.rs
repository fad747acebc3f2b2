// Perspective-n-point: normalized DLT for the initial pose, then
// Levenberg-Marquardt on the reprojection error in normalized image space.

use nalgebra::{
    DMatrix, DVector, Matrix3, Matrix3x4, Matrix4, Point2, Point3, Rotation3, SymmetricEigen,
    Vector3, Vector6,
};

use super::{PoseEstimate, PoseSolver};
use crate::error::{GazeError, Result};

const MIN_CORRESPONDENCES: usize = 6;
const ABSOLUTE_ERROR_EPS: f64 = 1e-9;
const MAX_DAMPING: f64 = 1e12;

#[derive(Debug, Clone)]
pub struct IterativePnpSolver {
    pub max_iterations: usize,
    /// Relative step size below which refinement stops.
    pub step_tolerance: f64,
}

impl Default for IterativePnpSolver {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            step_tolerance: 1e-12,
        }
    }
}

impl IterativePnpSolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate_input_points(
        model_points: &[Point3<f64>],
        image_points: &[Point2<f64>],
    ) -> Result<()> {
        if model_points.len() < MIN_CORRESPONDENCES {
            return Err(GazeError::InvalidInput(format!(
                "at least {} correspondences are required, got {}",
                MIN_CORRESPONDENCES,
                model_points.len()
            )));
        }

        if model_points.len() != image_points.len() {
            return Err(GazeError::InvalidInput(
                "the number of model and image points must be equal".into(),
            ));
        }

        let finite = model_points.iter().all(|p| p.coords.iter().all(|v| v.is_finite()))
            && image_points.iter().all(|p| p.coords.iter().all(|v| v.is_finite()));
        if !finite {
            return Err(GazeError::InvalidInput("correspondences must be finite".into()));
        }

        Ok(())
    }

    /// Similarity moving the model points to zero mean and mean distance sqrt(3).
    fn normalizing_transform(points: &[Point3<f64>]) -> Result<Matrix4<f64>> {
        let n = points.len() as f64;
        let centroid = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n;
        let mean_distance = points.iter().map(|p| (p.coords - centroid).norm()).sum::<f64>() / n;

        if mean_distance <= ABSOLUTE_ERROR_EPS {
            return Err(GazeError::SolverFailure("model points are coincident".into()));
        }

        let s = 3f64.sqrt() / mean_distance;
        Ok(Matrix4::new(
            s, 0.0, 0.0, -s * centroid.x,
            0.0, s, 0.0, -s * centroid.y,
            0.0, 0.0, s, -s * centroid.z,
            0.0, 0.0, 0.0, 1.0,
        ))
    }

    fn direct_linear_transform(
        model_points: &[Point3<f64>],
        normalized: &[Point2<f64>],
    ) -> Result<(Matrix3<f64>, Vector3<f64>)> {
        let transform = Self::normalizing_transform(model_points)?;
        let mut design = DMatrix::<f64>::zeros(2 * model_points.len(), 12);

        for (i, (model, image)) in model_points.iter().zip(normalized).enumerate() {
            let x = transform * model.to_homogeneous();
            let (u, v) = (image.x, image.y);
            for k in 0..4 {
                design[(2 * i, k)] = x[k];
                design[(2 * i, 8 + k)] = -u * x[k];
                design[(2 * i + 1, 4 + k)] = x[k];
                design[(2 * i + 1, 8 + k)] = -v * x[k];
            }
        }

        // null vector of the design matrix
        let eigen = SymmetricEigen::new(design.transpose() * &design);
        let (smallest, _) = eigen
            .eigenvalues
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .ok_or_else(|| GazeError::SolverFailure("empty design matrix".into()))?;
        let p = eigen.eigenvectors.column(smallest);

        let p: Vec<f64> = p.iter().copied().collect();
        let normalized_projection = Matrix3x4::from_row_slice(&p);
        let mut projection = normalized_projection * transform;

        if !projection.iter().all(|v| v.is_finite()) {
            return Err(GazeError::SolverFailure("non-finite projection estimate".into()));
        }

        // the face must sit in front of the camera; reflections are left to
        // compute_optimal_rotation
        let n = model_points.len() as f64;
        let centroid = model_points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n;
        if projection.row(2).dot(&centroid.push(1.0).transpose()) < 0.0 {
            projection = -projection;
        }
        let m: Matrix3<f64> = projection.fixed_view::<3, 3>(0, 0).into_owned();

        let svd = m.svd(true, true);
        let scale = svd.singular_values.sum() / 3.0;
        if scale <= ABSOLUTE_ERROR_EPS {
            return Err(GazeError::SolverFailure("degenerate correspondences".into()));
        }

        let rotation = Self::compute_optimal_rotation(&m)
            .ok_or_else(|| GazeError::SolverFailure("no rotation fits the projection".into()))?;
        let translation: Vector3<f64> = projection.column(3).into_owned() / scale;

        Ok((rotation, translation))
    }

    // nearest proper rotation to `design_matrix`
    fn compute_optimal_rotation(design_matrix: &Matrix3<f64>) -> Option<Matrix3<f64>> {
        if design_matrix.norm() <= ABSOLUTE_ERROR_EPS {
            return None;
        }

        let svd = design_matrix.svd(true, true);

        let mut post_rotation = svd.u?;
        let pre_rotation = svd.v_t?;

        // Disallow reflection by ensuring that det(rotation) = +1 (and not -1)
        if post_rotation.determinant() * pre_rotation.determinant() < 0.0 {
            let mut column = post_rotation.column_mut(2);
            column *= -1.0;
        }

        Some(post_rotation * pre_rotation)
    }

    fn residuals(
        model_points: &[Point3<f64>],
        normalized: &[Point2<f64>],
        params: &Vector6<f64>,
    ) -> DVector<f64> {
        let rotation = Rotation3::from_scaled_axis(Vector3::new(params[0], params[1], params[2]));
        let translation = Vector3::new(params[3], params[4], params[5]);

        let mut r = DVector::zeros(2 * model_points.len());
        for (i, (model, image)) in model_points.iter().zip(normalized).enumerate() {
            let pc = rotation * model.coords + translation;
            let z = if pc.z.abs() < ABSOLUTE_ERROR_EPS {
                ABSOLUTE_ERROR_EPS.copysign(pc.z)
            } else {
                pc.z
            };
            r[2 * i] = pc.x / z - image.x;
            r[2 * i + 1] = pc.y / z - image.y;
        }
        r
    }

    fn jacobian(
        model_points: &[Point3<f64>],
        normalized: &[Point2<f64>],
        params: &Vector6<f64>,
    ) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(2 * model_points.len(), 6);
        for j in 0..6 {
            let h = 1e-7 * params[j].abs().max(1.0);
            let mut forward = *params;
            let mut backward = *params;
            forward[j] += h;
            backward[j] -= h;

            let diff = Self::residuals(model_points, normalized, &forward)
                - Self::residuals(model_points, normalized, &backward);
            jac.set_column(j, &(diff / (2.0 * h)));
        }
        jac
    }

    fn refine(
        &self,
        model_points: &[Point3<f64>],
        normalized: &[Point2<f64>],
        mut params: Vector6<f64>,
    ) -> (Vector6<f64>, f64) {
        let mut cost = Self::residuals(model_points, normalized, &params).norm_squared();
        let mut damping = 1e-3;

        for _ in 0..self.max_iterations {
            if cost <= f64::EPSILON * f64::EPSILON {
                break;
            }

            let r = Self::residuals(model_points, normalized, &params);
            let jac = Self::jacobian(model_points, normalized, &params);
            let jtj = jac.transpose() * &jac;
            let gradient = jac.transpose() * r;

            let mut improved = None;
            while damping < MAX_DAMPING {
                let mut system = jtj.clone();
                for i in 0..6 {
                    system[(i, i)] += damping * jtj[(i, i)].max(ABSOLUTE_ERROR_EPS);
                }

                let step = match system.cholesky() {
                    Some(c) => c.solve(&(-gradient.clone())),
                    None => {
                        damping *= 10.0;
                        continue;
                    }
                };
                let step = Vector6::from_column_slice(step.as_slice());
                let candidate = params + step;
                let candidate_cost =
                    Self::residuals(model_points, normalized, &candidate).norm_squared();

                if candidate_cost < cost {
                    damping = (damping / 10.0).max(1e-12);
                    improved = Some((candidate, candidate_cost, step));
                    break;
                }
                damping *= 10.0;
            }

            match improved {
                Some((candidate, candidate_cost, step)) => {
                    params = candidate;
                    cost = candidate_cost;
                    if step.norm() <= self.step_tolerance * (params.norm() + self.step_tolerance) {
                        break;
                    }
                }
                None => break,
            }
        }

        (params, cost)
    }
}

impl PoseSolver for IterativePnpSolver {
    fn solve(
        &self,
        model_points: &[Point3<f64>],
        image_points: &[Point2<f64>],
        camera: &Matrix3<f64>,
        distortion: &[f64],
    ) -> Result<PoseEstimate> {
        Self::validate_input_points(model_points, image_points)?;

        if distortion.iter().any(|d| *d != 0.0) {
            return Err(GazeError::InvalidInput(
                "lens distortion is not supported by the iterative solver".into(),
            ));
        }

        let camera_inverse = camera
            .try_inverse()
            .ok_or_else(|| GazeError::SolverFailure("camera matrix is singular".into()))?;

        let normalized: Vec<Point2<f64>> = image_points
            .iter()
            .map(|p| {
                let v = camera_inverse * Vector3::new(p.x, p.y, 1.0);
                Point2::new(v.x / v.z, v.y / v.z)
            })
            .collect();

        let (rotation, translation) = Self::direct_linear_transform(model_points, &normalized)?;
        let rvec = Rotation3::from_matrix_unchecked(rotation).scaled_axis();
        let initial = Vector6::new(
            rvec.x,
            rvec.y,
            rvec.z,
            translation.x,
            translation.y,
            translation.z,
        );

        let (params, cost) = self.refine(model_points, &normalized, initial);

        let rotation = Vector3::new(params[0], params[1], params[2]);
        let translation = Vector3::new(params[3], params[4], params[5]);

        // every model point must end up in front of the camera
        let r = Rotation3::from_scaled_axis(rotation);
        let in_front = model_points
            .iter()
            .all(|p| (r * p.coords + translation).z > 0.0);

        let success = cost.is_finite()
            && params.iter().all(|v| v.is_finite())
            && in_front;

        log::debug!(
            "pnp solved: reprojection cost {:.3e}, in front of camera: {}",
            cost,
            in_front
        );

        Ok(PoseEstimate {
            success,
            rotation,
            translation,
        })
    }
}
