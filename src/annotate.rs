//! Debug overlay of the landmarks a gaze decision was based on.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::estimator::EstimatorKind;
use crate::face_landmarks::LandmarkSet;
use crate::geometry::{eye_geometry, to_pixel, EyeGeometry, FrameSize};

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);
const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);

/// Copy of `image` with the estimator's inputs drawn on top.
///
/// Projection: canthus lines and iris centers of both eyes. Pose: the
/// landmarks fed to the solver and the eye box used for the iris fallback.
pub fn annotate(
    image: &RgbImage,
    landmarks: &LandmarkSet,
    config: &EngineConfig,
    kind: EstimatorKind,
) -> Result<RgbImage> {
    let mut canvas = image.clone();
    let size = FrameSize::new(image.width(), image.height());
    let layout = &config.landmarks;

    match kind {
        EstimatorKind::Projection => {
            for eye in [&layout.left_eye, &layout.right_eye] {
                let geometry = eye_geometry(landmarks, eye.outer, eye.inner, &eye.iris, size)?;
                draw_eye(&mut canvas, &geometry);
            }
        }
        EstimatorKind::Pose => {
            for &id in &layout.pose_points {
                let p = to_pixel(&landmarks.get(id)?, size);
                draw_cross_mut(&mut canvas, GREEN, p.x, p.y);
            }

            let start = to_pixel(&landmarks.get(layout.eye_box_start)?, size);
            let end = to_pixel(&landmarks.get(layout.eye_box_end)?, size);

            let mut top = i32::MAX;
            for &id in &layout.eyelid_top {
                top = top.min(to_pixel(&landmarks.get(id)?, size).y);
            }
            let mut bottom = i32::MIN;
            for &id in &layout.eyelid_bottom {
                bottom = bottom.max(to_pixel(&landmarks.get(id)?, size).y);
            }

            let left = start.x.min(end.x);
            let width = (start.x - end.x).unsigned_abs().max(1);
            let height = (bottom - top).unsigned_abs().max(1);
            draw_hollow_rect_mut(
                &mut canvas,
                Rect::at(left, top.min(bottom)).of_size(width, height),
                YELLOW,
            );

            for &id in &layout.pose_iris {
                let p = to_pixel(&landmarks.get(id)?, size);
                draw_cross_mut(&mut canvas, RED, p.x, p.y);
            }
        }
    }

    Ok(canvas)
}

fn draw_eye(canvas: &mut RgbImage, eye: &EyeGeometry) {
    draw_line_segment_mut(
        canvas,
        (eye.outer.x as f32, eye.outer.y as f32),
        (eye.inner.x as f32, eye.inner.y as f32),
        YELLOW,
    );
    draw_cross_mut(canvas, GREEN, eye.outer.x, eye.outer.y);
    draw_cross_mut(canvas, GREEN, eye.inner.x, eye.inner.y);
    draw_cross_mut(canvas, RED, eye.iris.x, eye.iris.y);
}
