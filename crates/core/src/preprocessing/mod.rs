pub mod annotate;
pub mod box_blur;
pub mod clahe;
pub mod face_normalizer;
pub mod gray_normalizer;
pub mod median_blur;
pub mod noise;
