/// BlazeFace face detector using ONNX Runtime via `ort`.
///
/// A lightweight short-range detector that produces face boxes only;
/// landmarks come from a separate [`LandmarkLocator`](crate::detection::domain::landmark_locator::LandmarkLocator).
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::detection_box::DetectionBox;
use crate::shared::frame::Frame;

use super::execution_provider::load_session;
use super::math::{nms, sigmoid, RawDetection};

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output: box (4) + 6 keypoints (12).
const REGRESSOR_STRIDE: usize = 16;

/// BlazeFace face detector backed by an ONNX Runtime session.
pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f64,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path)?;
        Ok(Self {
            session,
            confidence,
            anchors: generate_anchors(),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectionBox>, Box<dyn std::error::Error>> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }

        // 1. Preprocess: resize to 128x128, normalize to [0,1], NCHW
        let input_tensor = preprocess(frame, INPUT_SIZE);

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // BlazeFace outputs two tensors:
        // - regressors: [1, 896, 16] (box deltas + keypoints)
        // - classificators: [1, 896, 1] (confidence logits)
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        // 3. Decode anchor boxes + filter by confidence
        let mut raw_dets = decode(
            reg_data,
            score_data,
            &self.anchors,
            self.confidence,
            frame.width(),
            frame.height(),
        );

        // 4. NMS
        let filtered = nms(&mut raw_dets, NMS_IOU_THRESH);

        // 5. Integer boxes, dropping anything that collapsed during clamping
        let boxes: Vec<DetectionBox> = filtered
            .iter()
            .map(|d| {
                DetectionBox::new(
                    d.x1.floor() as i32,
                    d.y1.floor() as i32,
                    d.x2.ceil() as i32,
                    d.y2.ceil() as i32,
                )
                .with_score(d.score)
                .clamp_to(frame.width(), frame.height())
            })
            .filter(|b| !b.is_degenerate())
            .collect();

        log::debug!(
            "BlazeFace kept {} of {} candidates",
            boxes.len(),
            raw_dets.len()
        );
        Ok(boxes)
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize frame to `size × size` and normalize to [0,1] NCHW float32.
///
/// Gray frames are replicated across the three input channels.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let last_channel = frame.channels() as usize - 1;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c.min(last_channel)]] as f32 / 255.0;
            }
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Turn raw regressor/score outputs into frame-space candidates above `confidence`.
fn decode(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    confidence: f64,
    frame_width: u32,
    frame_height: u32,
) -> Vec<RawDetection> {
    let fw = frame_width as f32;
    let fh = frame_height as f32;
    let num_anchors = anchors.len().min(NUM_ANCHORS);
    let mut raw_dets = Vec::new();

    for (i, &raw_score) in score_data.iter().enumerate().take(num_anchors) {
        let score = sigmoid(raw_score);
        if (score as f64) < confidence {
            continue;
        }

        let anchor = &anchors[i];
        let reg_offset = i * REGRESSOR_STRIDE;
        if reg_offset + 4 > reg_data.len() {
            break;
        }

        // Box center + size relative to anchor
        let cx = anchor[0] + reg_data[reg_offset] / INPUT_SIZE as f32;
        let cy = anchor[1] + reg_data[reg_offset + 1] / INPUT_SIZE as f32;
        let w = reg_data[reg_offset + 2] / INPUT_SIZE as f32;
        let h = reg_data[reg_offset + 3] / INPUT_SIZE as f32;

        let x1 = ((cx - w / 2.0) * fw).max(0.0);
        let y1 = ((cy - h / 2.0) * fh).max(0.0);
        let x2 = ((cx + w / 2.0) * fw).min(fw);
        let y2 = ((cy + h / 2.0) * fh).min(fh);

        raw_dets.push(RawDetection {
            x1: x1 as f64,
            y1: y1 as f64,
            x2: x2 as f64,
            y2: y2 as f64,
            score: score as f64,
        });
    }

    raw_dets
}

/// Generate BlazeFace anchors for the short-range model.
///
/// The short-range model uses two feature map sizes: 16×16 and 8×8,
/// with 2 and 6 anchors per cell respectively.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}
