use std::sync::Arc;

use image::imageops::FilterType;
use image::RgbImage;
use nalgebra::Point3;
use ndarray::{Array, CowArray};
use ort::tensor::OrtOwnedTensor;
use ort::{Environment, ExecutionProvider, Session, SessionBuilder, Value};

use crate::config::DetectorConfig;
use crate::error::{GazeError, Result};
use crate::face_landmarks::{LandmarkDetector, LandmarkSet, REFINED_LANDMARK_COUNT};

/// (x, y, width, height) in frame pixels.
type BBox = (u32, u32, u32, u32);

// padding added around the landmark extent before re-cropping
const FACE_PADDING: f32 = 0.25;

/// MediaPipe face landmark model (attention mesh with iris refinement) run
/// through ONNX Runtime.
///
/// The model sees a square crop of the frame. The crop of the last confident
/// detection is remembered and used as the starting crop for the next frame.
pub struct MediapipeFaceLandmarksModel {
    _environment: Arc<Environment>,
    session: Session,
    input_size: u32,
    face_confidence: f32,
    last_face_bbox: Option<BBox>,
}

impl MediapipeFaceLandmarksModel {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(GazeError::Detector(format!(
                "face landmark model not found at {}",
                config.model_path.display()
            )));
        }

        let environment = Environment::builder()
            .with_name("gaze-attention")
            .with_execution_providers([ExecutionProvider::CPU(Default::default())])
            .build()?
            .into_arc();

        let session = SessionBuilder::new(&environment)?
            .with_intra_threads(config.intra_threads)?
            .with_model_from_file(&config.model_path)?;

        log::info!(
            "Loaded face landmark model from {}",
            config.model_path.display()
        );

        Ok(Self {
            _environment: environment,
            session,
            input_size: config.input_size,
            face_confidence: config.face_confidence,
            last_face_bbox: None,
        })
    }

    /// Forget the tracked face crop.
    pub fn reset(&mut self) {
        self.last_face_bbox = None;
    }

    fn run_crop(&self, image: &RgbImage, bbox: BBox) -> Result<(Vec<Point3<f32>>, f32)> {
        let size = self.input_size;
        let crop = image::imageops::crop_imm(image, bbox.0, bbox.1, bbox.2, bbox.3).to_image();
        let input = image::imageops::resize(&crop, size, size, FilterType::Triangle);

        let input: Vec<f32> = input
            .pixels()
            .flat_map(|p| p.0)
            .map(|p| p as f32 / 255.0)
            .collect();

        let array: CowArray<_, _> =
            Array::from_shape_vec((1, size as usize, size as usize, 3), input)
                .map_err(|e| GazeError::Detector(e.to_string()))?
                .into_dyn()
                .into();

        let inputs = vec![Value::from_array(self.session.allocator(), &array)?];
        let outputs: Vec<Value> = self.session.run(inputs)?;
        if outputs.len() < 2 {
            return Err(GazeError::Detector(format!(
                "expected landmark and face-flag outputs, got {}",
                outputs.len()
            )));
        }

        let face_flag: OrtOwnedTensor<f32, _> = outputs[1].try_extract()?;
        let face_flag = face_flag
            .view()
            .iter()
            .next()
            .copied()
            .ok_or_else(|| GazeError::Detector("empty face-flag output".into()))?;

        let raw: OrtOwnedTensor<f32, _> = outputs[0].try_extract()?;
        let raw: Vec<f32> = raw.view().iter().copied().collect();

        let points = crop_to_frame(&raw, size, bbox, image.width(), image.height());
        Ok((points, sigmoid(face_flag)))
    }
}

impl LandmarkDetector for MediapipeFaceLandmarksModel {
    fn detect(&mut self, image: &RgbImage) -> Result<Option<LandmarkSet>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(GazeError::InvalidInput("empty image".into()));
        }

        let hint = self
            .last_face_bbox
            .filter(|b| b.0 + b.2 <= width && b.1 + b.3 <= height)
            .unwrap_or_else(|| centered_square(width, height));

        let (points, confidence) = self.run_crop(image, hint)?;
        if confidence < self.face_confidence {
            log::debug!("face confidence {:.3} below threshold", confidence);
            self.last_face_bbox = None;
            return Ok(None);
        }

        // second pass on a crop fitted to the face
        let face_bbox = face_bbox_from_landmarks(&points, width, height);
        let (points, confidence) = if face_bbox != hint {
            self.run_crop(image, face_bbox)?
        } else {
            (points, confidence)
        };
        if confidence < self.face_confidence {
            self.last_face_bbox = None;
            return Ok(None);
        }
        self.last_face_bbox = Some(face_bbox);

        refined_mesh(points).map(Some)
    }
}

// the estimators read iris ids, so only a refined mesh is usable
fn refined_mesh(points: Vec<Point3<f32>>) -> Result<LandmarkSet> {
    let landmarks = LandmarkSet::new(points);
    if !landmarks.has_iris() {
        return Err(GazeError::Detector(format!(
            "model produced {} landmarks, iris refinement needs {}",
            landmarks.len(),
            REFINED_LANDMARK_COUNT
        )));
    }
    Ok(landmarks)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// map model-space points (pixels of the square model input) to frame-normalized coordinates
fn crop_to_frame(raw: &[f32], input_size: u32, bbox: BBox, width: u32, height: u32) -> Vec<Point3<f32>> {
    let n = input_size as f32;
    raw.chunks_exact(3)
        .map(|p| {
            Point3::new(
                (p[0] / n * bbox.2 as f32 + bbox.0 as f32) / width as f32,
                (p[1] / n * bbox.3 as f32 + bbox.1 as f32) / height as f32,
                p[2] / n,
            )
        })
        .collect()
}

fn centered_square(width: u32, height: u32) -> BBox {
    let side = width.min(height);
    ((width - side) / 2, (height - side) / 2, side, side)
}

fn face_bbox_from_landmarks(points: &[Point3<f32>], width: u32, height: u32) -> BBox {
    let mut x_min = f32::MAX;
    let mut y_min = f32::MAX;
    let mut x_max = f32::MIN;
    let mut y_max = f32::MIN;

    for p in points {
        x_min = x_min.min(p.x * width as f32);
        y_min = y_min.min(p.y * height as f32);
        x_max = x_max.max(p.x * width as f32);
        y_max = y_max.max(p.y * height as f32);
    }

    if x_min > x_max || y_min > y_max {
        return centered_square(width, height);
    }

    let side = (x_max - x_min).max(y_max - y_min) * (1.0 + 2.0 * FACE_PADDING);
    let center = ((x_min + x_max) / 2.0, (y_min + y_max) / 2.0);

    adjust_bbox(
        (center.0 - side / 2.0) as i32,
        (center.1 - side / 2.0) as i32,
        side as i32,
        width,
        height,
    )
}

// clamp a square box to the image, shrinking it rather than changing its aspect
fn adjust_bbox(x: i32, y: i32, side: i32, image_w: u32, image_h: u32) -> BBox {
    let x = x.clamp(0, image_w.saturating_sub(1) as i32);
    let y = y.clamp(0, image_h.saturating_sub(1) as i32);

    let side = side
        .min(image_w as i32 - x)
        .min(image_h as i32 - y)
        .max(1);

    (x as u32, y as u32, side as u32, side as u32)
}
