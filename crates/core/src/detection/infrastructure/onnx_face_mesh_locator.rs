/// MediaPipe face-mesh landmark model using ONNX Runtime via `ort`.
///
/// Crops an enlarged square-ish ROI around each detected face, runs the
/// 192×192 mesh model on it and maps the 468 predicted points back into
/// original-image coordinates.
use std::path::Path;

use image::imageops::FilterType;

use crate::detection::domain::landmark_locator::LandmarkLocator;
use crate::detection::domain::landmark_set::LandmarkSet;
use crate::shared::constants::FACE_MESH_POINTS;
use crate::shared::detection_box::DetectionBox;
use crate::shared::frame::Frame;

use super::execution_provider::load_session;
use super::math::sigmoid;

/// Face-mesh model input resolution.
const INPUT_SIZE: u32 = 192;

/// Fraction by which the detector box is grown before cropping.
const ROI_EXPANSION: f64 = 0.25;

/// Minimum face-presence probability for a mesh to be accepted.
pub const DEFAULT_PRESENCE_THRESHOLD: f64 = 0.5;

pub struct OnnxFaceMeshLocator {
    session: ort::session::Session,
    presence_threshold: f64,
}

impl OnnxFaceMeshLocator {
    pub fn new(
        model_path: &Path,
        presence_threshold: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: load_session(model_path)?,
            presence_threshold,
        })
    }
}

impl LandmarkLocator for OnnxFaceMeshLocator {
    fn locate(
        &mut self,
        frame: &Frame,
        face: &DetectionBox,
    ) -> Result<Option<LandmarkSet>, Box<dyn std::error::Error>> {
        let roi = face
            .expand(ROI_EXPANSION)
            .clamp_to(frame.width(), frame.height());
        if roi.is_degenerate() {
            return Ok(None);
        }

        let input_tensor = preprocess(frame, &roi, INPUT_SIZE)?;
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("Face mesh model produced no outputs".into());
        }

        // Second output, when present, is the face-presence logit.
        if outputs.len() > 1 {
            let flag = outputs[1].try_extract_array::<f32>()?;
            if let Some(&logit) = flag.iter().next() {
                let presence = sigmoid(logit) as f64;
                if presence < self.presence_threshold {
                    log::debug!("Face mesh rejected face (presence {presence:.2})");
                    return Ok(None);
                }
            }
        }

        let mesh = outputs[0].try_extract_array::<f32>()?;
        let values: Vec<f32> = mesh.iter().copied().collect();
        Ok(map_to_frame(&values, &roi, INPUT_SIZE))
    }
}

/// Crop `roi` from the frame, resize to `size × size` and scale to [-1,1] NHWC.
fn preprocess(
    frame: &Frame,
    roi: &DetectionBox,
    size: u32,
) -> Result<ndarray::Array4<f32>, Box<dyn std::error::Error>> {
    let img = frame.to_rgb_image()?;
    let crop = image::imageops::crop_imm(
        &img,
        roi.left as u32,
        roi.top as u32,
        roi.width() as u32,
        roi.height() as u32,
    )
    .to_image();
    let resized = image::imageops::resize(&crop, size, size, FilterType::Triangle);

    let s = size as usize;
    let mut tensor = ndarray::Array4::<f32>::zeros((1, s, s, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, y as usize, x as usize, c]] = pixel[c] as f32 / 127.5 - 1.0;
        }
    }
    Ok(tensor)
}

/// Map flat `[x, y, z] × 468` model-space output back through the ROI.
fn map_to_frame(values: &[f32], roi: &DetectionBox, size: u32) -> Option<LandmarkSet> {
    if values.len() < FACE_MESH_POINTS * 3 {
        return None;
    }
    let scale_x = roi.width() as f64 / size as f64;
    let scale_y = roi.height() as f64 / size as f64;

    let points = values
        .chunks_exact(3)
        .take(FACE_MESH_POINTS)
        .map(|p| {
            (
                roi.left as f64 + p[0] as f64 * scale_x,
                roi.top as f64 + p[1] as f64 * scale_y,
            )
        })
        .collect();
    Some(LandmarkSet::new(points))
}
