//! YOLO face locator using ONNX Runtime via `ort`.
//!
//! Handles letterbox preprocessing, inference, confidence filtering and NMS,
//! and maps surviving boxes back to normalized frame coordinates.
use std::path::Path;

use crate::detection::domain::face_locator::FaceLocator;
use crate::shared::face_region::FaceRegion;
use crate::shared::frame::RawFrame;

use crate::shared::execution_provider::{intra_op_threads, preferred_execution_providers};
use super::math::nms;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Letterbox fill value (YOLO convention).
const PAD_VALUE: f32 = 114.0 / 255.0;

pub struct OnnxYoloLocator {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloLocator {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_intra_threads(intra_op_threads())?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!("Loaded face model {} ({input_size}px input)", model_path.display());
        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceLocator for OnnxYoloLocator {
    fn locate(&mut self, frame: &RawFrame) -> Result<Vec<FaceRegion>, Box<dyn std::error::Error>> {
        if !frame.is_well_formed() {
            return Err(format!(
                "frame has {} bytes, expected {}",
                frame.data().len(),
                frame.expected_len()
            )
            .into());
        }
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }

        let (tensor, letterboxed) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let boxes = parse_detections(data, &shape, self.confidence)?;
        let kept = nms(boxes, NMS_IOU_THRESH);

        Ok(kept
            .into_iter()
            .map(|(bbox, _)| {
                let unpadded = letterboxed.to_frame_coords(bbox);
                FaceRegion::from_pixel_box(unpadded, frame.width(), frame.height()).clamped()
            })
            .filter(|region| region.area() > 0.0)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Geometry of a letterbox resize, kept to map detections back.
struct Letterboxed {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterboxed {
    /// Maps a letterbox-space `[x1, y1, x2, y2]` box back to frame pixels.
    fn to_frame_coords(&self, bbox: [f64; 4]) -> [f64; 4] {
        [
            (bbox[0] - self.pad_x as f64) / self.scale,
            (bbox[1] - self.pad_y as f64) / self.scale,
            (bbox[2] - self.pad_x as f64) / self.scale,
            (bbox[3] - self.pad_y as f64) / self.scale,
        ]
    }
}

/// Letterbox-resize a frame to `target_size` x `target_size` RGB, NCHW float32.
fn letterbox(frame: &RawFrame, target_size: u32) -> (ndarray::Array4<f32>, Letterboxed) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).clamp(1, target_size);
    let new_h = ((fh * scale).round() as u32).clamp(1, target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let mut tensor = ndarray::Array4::<f32>::from_elem(
        (1, 3, target_size as usize, target_size as usize),
        PAD_VALUE,
    );

    let src_w = frame.width();
    let src_h = frame.height();
    let format = frame.format();

    // Nearest-neighbor resize + copy into padded region
    for y in 0..new_h {
        let src_y = ((y as f64 / scale) as u32).min(src_h - 1);
        for x in 0..new_w {
            let src_x = ((x as f64 / scale) as u32).min(src_w - 1);
            let (r, g, b) = format.rgb(frame.pixel(src_x, src_y));
            let ty = (pad_y + y) as usize;
            let tx = (pad_x + x) as usize;
            tensor[[0, 0, ty, tx]] = r as f32 / 255.0;
            tensor[[0, 1, ty, tx]] = g as f32 / 255.0;
            tensor[[0, 2, ty, tx]] = b as f32 / 255.0;
        }
    }

    (
        tensor,
        Letterboxed {
            scale,
            pad_x,
            pad_y,
        },
    )
}

// ---------------------------------------------------------------------------
// Output decoding
// ---------------------------------------------------------------------------

/// Decodes YOLO rows `[cx, cy, w, h, conf, ...]` above `confidence` into
/// `([x1, y1, x2, y2], conf)` pairs in letterbox space.
///
/// Accepts `[1, features, detections]` (transposed) and
/// `[1, detections, features]` layouts.
fn parse_detections(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
) -> Result<Vec<([f64; 4], f64)>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 || data.len() < num_dets * num_feats {
        return Err(format!("YOLO output too small for shape {shape:?}").into());
    }

    let value = |det: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_dets + det] as f64
        } else {
            data[det * num_feats + feat] as f64
        }
    };

    let mut boxes = Vec::new();
    for i in 0..num_dets {
        let conf = value(i, 4);
        if conf < confidence {
            continue;
        }
        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        boxes.push((
            [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
            conf,
        ));
    }
    Ok(boxes)
}
