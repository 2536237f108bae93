//! Ordered facial landmark points in original-image coordinates.

use serde::{Deserialize, Serialize};

use crate::shared::detection_box::DetectionBox;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    points: Vec<(f64, f64)>,
}

impl LandmarkSet {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Fraction of points lying inside `face`.
    pub fn coverage(&self, face: &DetectionBox) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        let inside = self
            .points
            .iter()
            .filter(|(x, y)| {
                *x >= face.left as f64
                    && *x < face.right as f64
                    && *y >= face.top as f64
                    && *y < face.bottom as f64
            })
            .count();
        inside as f64 / self.points.len() as f64
    }
}
