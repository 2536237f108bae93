pub mod face_detector;
pub mod landmark_locator;
pub mod landmark_set;
