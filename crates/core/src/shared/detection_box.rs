use serde::{Deserialize, Serialize};

use crate::shared::error::PreprocessError;

/// Axis-aligned face rectangle in image pixel coordinates.
///
/// `right` and `bottom` are exclusive, so `width = right - left`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    /// Detector confidence in [0, 1]; 1.0 when unknown.
    pub score: f64,
}

impl DetectionBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
            score: 1.0,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Returns `self` unchanged when it has positive extent on both axes.
    pub fn validated(&self) -> Result<DetectionBox, PreprocessError> {
        if self.is_degenerate() {
            return Err(PreprocessError::DegenerateBox {
                left: self.left,
                top: self.top,
                right: self.right,
                bottom: self.bottom,
            });
        }
        Ok(*self)
    }

    /// Intersection with the `[0, width) x [0, height)` image rectangle.
    pub fn clamp_to(&self, width: u32, height: u32) -> DetectionBox {
        let w = width as i32;
        let h = height as i32;
        DetectionBox {
            left: self.left.clamp(0, w),
            top: self.top.clamp(0, h),
            right: self.right.clamp(0, w),
            bottom: self.bottom.clamp(0, h),
            score: self.score,
        }
    }

    /// Grows the box by `ratio` of its size, split evenly on both sides.
    pub fn expand(&self, ratio: f64) -> DetectionBox {
        let pad_x = (self.width() as f64 * ratio / 2.0).round() as i32;
        let pad_y = (self.height() as f64 * ratio / 2.0).round() as i32;
        DetectionBox {
            left: self.left - pad_x,
            top: self.top - pad_y,
            right: self.right + pad_x,
            bottom: self.bottom + pad_y,
            score: self.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    // ── Geometry ─────────────────────────────────────────────────────

    #[test]
    fn test_width_height() {
        let b = DetectionBox::new(10, 20, 110, 70);
        assert_eq!(b.width(), 100);
        assert_eq!(b.height(), 50);
    }

    #[rstest]
    #[case::zero_width(DetectionBox::new(10, 10, 10, 50), true)]
    #[case::zero_height(DetectionBox::new(10, 10, 50, 10), true)]
    #[case::inverted(DetectionBox::new(50, 50, 10, 10), true)]
    #[case::regular(DetectionBox::new(0, 0, 1, 1), false)]
    fn test_is_degenerate(#[case] b: DetectionBox, #[case] expected: bool) {
        assert_eq!(b.is_degenerate(), expected);
    }

    #[test]
    fn test_validated_reports_coordinates() {
        let err = DetectionBox::new(5, 6, 5, 9).validated().unwrap_err();
        assert_eq!(
            err,
            PreprocessError::DegenerateBox {
                left: 5,
                top: 6,
                right: 5,
                bottom: 9
            }
        );
    }

    #[test]
    fn test_clamp_to_frame() {
        let b = DetectionBox::new(-20, -5, 130, 90).clamp_to(100, 80);
        assert_eq!((b.left, b.top, b.right, b.bottom), (0, 0, 100, 80));
    }

    #[test]
    fn test_clamp_outside_frame_becomes_degenerate() {
        let b = DetectionBox::new(200, 200, 300, 300).clamp_to(100, 100);
        assert!(b.is_degenerate());
    }

    #[test]
    fn test_expand_keeps_center() {
        let b = DetectionBox::new(100, 100, 200, 200).expand(0.25);
        assert_eq!((b.left, b.top, b.right, b.bottom), (87, 87, 213, 213));
    }

    #[test]
    fn test_score_is_carried() {
        let b = DetectionBox::new(0, 0, 10, 10).with_score(0.7).expand(0.5);
        assert_relative_eq!(b.score, 0.7);
    }
}
