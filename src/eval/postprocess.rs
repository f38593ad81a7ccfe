//! Inference post-processing: score threshold and per-class box suppression

use std::cmp::Ordering;

use super::detection::{Detection, DetectionResult};
use crate::error::{Error, Result};

/// Filters raw model output before it is shown or exported
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostProcessor {
    score_threshold: f32,
    nms_iou: Option<f32>,
}

impl PostProcessor {
    /// `score_threshold` and `nms_iou` must lie in `[0, 1]`
    pub fn new(score_threshold: f32, nms_iou: Option<f32>) -> Result<Self> {
        if !(0.0..=1.0).contains(&score_threshold) {
            return Err(Error::config(format!("score threshold {score_threshold} outside [0, 1]")));
        }
        if let Some(iou) = nms_iou.filter(|iou| !(0.0..=1.0).contains(iou)) {
            return Err(Error::config(format!("NMS IoU {iou} outside [0, 1]")));
        }
        Ok(Self { score_threshold, nms_iou })
    }

    /// Keep detections scoring at least the threshold, highest score first,
    /// then drop any box overlapping a kept box of the same label by more
    /// than `nms_iou`
    pub fn apply(&self, result: &DetectionResult) -> DetectionResult {
        let mut candidates: Vec<Detection> =
            result.detections.iter().filter(|d| d.score >= self.score_threshold).copied().collect();
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let Some(max_iou) = self.nms_iou else {
            return DetectionResult::new(candidates);
        };
        let mut keep: Vec<Detection> = Vec::with_capacity(candidates.len());
        for det in candidates {
            let suppressed = keep.iter().any(|k| k.label == det.label && k.bbox.iou(&det.bbox) > max_iou);
            if !suppressed {
                keep.push(det);
            }
        }
        DetectionResult::new(keep)
    }
}
