use crate::detection::domain::landmark_set::LandmarkSet;
use crate::shared::detection_box::DetectionBox;
use crate::shared::frame::Frame;

/// Domain interface for per-face landmark inference.
///
/// Returns `Ok(None)` when the model cannot place landmarks for `face`;
/// such faces are dropped from the pipeline output.
pub trait LandmarkLocator: Send {
    fn locate(
        &mut self,
        frame: &Frame,
        face: &DetectionBox,
    ) -> Result<Option<LandmarkSet>, Box<dyn std::error::Error>>;
}
