use crate::shared::detection_box::DetectionBox;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Implementations own model sessions that need mutable access to run,
/// hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectionBox>, Box<dyn std::error::Error>>;
}
