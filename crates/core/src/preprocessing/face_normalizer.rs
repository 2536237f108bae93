//! Scale normalization: crop each face, resize to the canonical size and
//! carry its landmarks into the cropped frame.

use image::imageops::FilterType;
use serde::Serialize;

use crate::detection::domain::landmark_set::LandmarkSet;
use crate::preprocessing::gray_normalizer::gray_normalize;
use crate::shared::detection_box::DetectionBox;
use crate::shared::error::PreprocessError;
use crate::shared::frame::Frame;

/// One face ready for the expression model.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedFace {
    pub image: Frame,
    pub landmarks: Vec<RemappedPoint>,
}

/// Landmark position in the canonical crop's pixel grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RemappedPoint {
    pub x: i32,
    pub y: i32,
}

/// Crop `face` out of `frame` and resize it to exactly `target` with
/// linear filtering.
///
/// The box is clamped to the frame first; a box that has no area inside the
/// frame is rejected.
pub fn crop_and_resize(
    frame: &Frame,
    face: &DetectionBox,
    target: (u32, u32),
) -> Result<Frame, PreprocessError> {
    check_target(target)?;
    face.validated()?;
    let roi = face.clamp_to(frame.width(), frame.height()).validated()?;
    let (x, y, w, h) = (
        roi.left as u32,
        roi.top as u32,
        roi.width() as u32,
        roi.height() as u32,
    );
    let (tw, th) = target;

    match frame.channels() {
        1 => {
            let img = frame.to_gray_image()?;
            let crop = image::imageops::crop_imm(&img, x, y, w, h).to_image();
            let resized = image::imageops::resize(&crop, tw, th, FilterType::Triangle);
            Ok(Frame::from_gray_image(resized))
        }
        3 => {
            let img = frame.to_rgb_image()?;
            let crop = image::imageops::crop_imm(&img, x, y, w, h).to_image();
            let resized = image::imageops::resize(&crop, tw, th, FilterType::Triangle);
            Ok(Frame::from_rgb_image(resized))
        }
        other => Err(PreprocessError::ChannelCount {
            expected: 1,
            actual: other,
        }),
    }
}

/// Map original-image points into a `target`-sized frame spanning `face`.
///
/// `x' = (x - left) / (right - left) * target_w`, likewise for y, truncated
/// toward zero. The unclamped box extents are the denominator.
pub fn remap_landmarks(
    points: &[(f64, f64)],
    face: &DetectionBox,
    target: (u32, u32),
) -> Result<Vec<RemappedPoint>, PreprocessError> {
    check_target(target)?;
    let face = face.validated()?;
    let width = face.width() as f64;
    let height = face.height() as f64;
    let (tw, th) = (target.0 as f64, target.1 as f64);

    Ok(points
        .iter()
        .map(|&(x, y)| RemappedPoint {
            x: ((x - face.left as f64) / width * tw) as i32,
            y: ((y - face.top as f64) / height * th) as i32,
        })
        .collect())
}

fn check_target((width, height): (u32, u32)) -> Result<(), PreprocessError> {
    if width == 0 || height == 0 {
        return Err(PreprocessError::InvalidTarget { width, height });
    }
    Ok(())
}

/// Gray-normalize `frame` in place, then crop and remap every face.
///
/// Faces are processed in order, so output `i` belongs to `faces[i]`.
pub fn normalize_faces(
    frame: &mut Frame,
    faces: &[(DetectionBox, LandmarkSet)],
    target: (u32, u32),
) -> Result<Vec<NormalizedFace>, PreprocessError> {
    gray_normalize(frame)?;

    faces
        .iter()
        .map(|(face, landmarks)| {
            Ok(NormalizedFace {
                image: crop_and_resize(frame, face, target)?,
                landmarks: remap_landmarks(landmarks.points(), face, target)?,
            })
        })
        .collect()
}
