use thiserror::Error;

/// Failures of the pixel-level preprocessing steps.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreprocessError {
    #[error("degenerate detection box ({left}, {top}, {right}, {bottom}): width and height must be positive")]
    DegenerateBox {
        left: i32,
        top: i32,
        right: i32,
        bottom: i32,
    },
    #[error("expected a {expected}-channel frame, got {actual} channels")]
    ChannelCount { expected: u8, actual: u8 },
    #[error("blur kernel size must be a positive odd integer no larger than 255, got {0}")]
    InvalidKernel(usize),
    #[error("target size must be non-zero, got {width}x{height}")]
    InvalidTarget { width: u32, height: u32 },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
