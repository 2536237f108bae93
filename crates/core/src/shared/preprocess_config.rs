use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::constants::{
    CANONICAL_SIZE, DEFAULT_BLUR_KERNEL, DEFAULT_CLAHE_CLIP_LIMIT, DEFAULT_CLAHE_GRID,
    DEFAULT_DETECTION_CONFIDENCE, MAX_BLUR_KERNEL,
};
use crate::shared::error::PreprocessError;

/// Filter used to denoise the input before detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Denoiser {
    #[default]
    Mean,
    Median,
}

impl FromStr for Denoiser {
    type Err = PreprocessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            other => Err(PreprocessError::InvalidConfig(format!(
                "denoiser must be 'mean' or 'median', got '{other}'"
            ))),
        }
    }
}

/// Histogram equalization applied before gray normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Equalization {
    /// CLAHE with `clahe_clip_limit` and `clahe_grid`.
    #[default]
    Adaptive,
    Global,
}

impl FromStr for Equalization {
    type Err = PreprocessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adaptive" => Ok(Self::Adaptive),
            "global" => Ok(Self::Global),
            other => Err(PreprocessError::InvalidConfig(format!(
                "equalization must be 'adaptive' or 'global', got '{other}'"
            ))),
        }
    }
}

/// Tunables for the preprocessing pipeline.
///
/// Missing fields in a JSON file fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub denoise: Denoiser,
    pub blur_kernel: usize,
    pub equalization: Equalization,
    pub clahe_clip_limit: f64,
    pub clahe_grid: usize,
    pub target_width: u32,
    pub target_height: u32,
    pub confidence: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            denoise: Denoiser::default(),
            blur_kernel: DEFAULT_BLUR_KERNEL,
            equalization: Equalization::default(),
            clahe_clip_limit: DEFAULT_CLAHE_CLIP_LIMIT,
            clahe_grid: DEFAULT_CLAHE_GRID,
            target_width: CANONICAL_SIZE,
            target_height: CANONICAL_SIZE,
            confidence: DEFAULT_DETECTION_CONFIDENCE,
        }
    }
}

impl PreprocessConfig {
    /// Reads a JSON config file and validates it.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = fs::read_to_string(path)?;
        let config: PreprocessConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    pub fn validate(&self) -> Result<(), PreprocessError> {
        if self.blur_kernel == 0
            || self.blur_kernel % 2 == 0
            || self.blur_kernel > MAX_BLUR_KERNEL
        {
            return Err(PreprocessError::InvalidKernel(self.blur_kernel));
        }
        if self.clahe_clip_limit.is_nan() || self.clahe_clip_limit <= 0.0 {
            return Err(PreprocessError::InvalidConfig(format!(
                "CLAHE clip limit must be positive, got {}",
                self.clahe_clip_limit
            )));
        }
        if self.clahe_grid == 0 {
            return Err(PreprocessError::InvalidConfig(
                "CLAHE grid must be at least 1".into(),
            ));
        }
        if self.target_width == 0 || self.target_height == 0 {
            return Err(PreprocessError::InvalidTarget {
                width: self.target_width,
                height: self.target_height,
            });
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(PreprocessError::InvalidConfig(format!(
                "confidence must be between 0.0 and 1.0, got {}",
                self.confidence
            )));
        }
        Ok(())
    }
}
