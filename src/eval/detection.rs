//! Model predictions for a single image

use serde::{Deserialize, Serialize};

use crate::data::BoundingBox;
use crate::error::{Error, Result};

/// One predicted box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub label: u32,
    /// Confidence in `[0, 1]`
    pub score: f32,
}

/// All predictions for one image
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Reject scores outside `[0, 1]`
    pub fn validate(&self) -> Result<()> {
        for det in &self.detections {
            if !(0.0..=1.0).contains(&det.score) {
                return Err(Error::batch_shape(format!(
                    "detection score {} outside [0, 1]",
                    det.score
                )));
            }
        }
        Ok(())
    }
}
