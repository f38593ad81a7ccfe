//! Per-image, per-category greedy matching of detections to ground truth

use std::cmp::Ordering;

use super::params::AreaRange;
use crate::data::BoundingBox;

/// Matching outcome of one (image, category, area range)
///
/// Detections are in descending score order, truncated to the detection cap
/// the matching ran with. `matched[t][d]` and `ignored[t][d]` are indexed by
/// IoU threshold, then detection.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageEvaluation {
    pub scores: Vec<f64>,
    pub matched: Vec<Vec<bool>>,
    pub ignored: Vec<Vec<bool>>,
    /// Ground-truth boxes inside the area range
    pub num_positives: usize,
}

fn area(bbox: &BoundingBox) -> f64 {
    f64::from(bbox.width()) * f64::from(bbox.height())
}

/// Match `detections` (box, score) against `ground_truth` at every threshold
///
/// Returns `None` when the image has neither ground truth nor detections of
/// the category, so it contributes nothing to accumulation.
pub fn evaluate_image(
    ground_truth: &[BoundingBox],
    detections: &[(BoundingBox, f32)],
    range: AreaRange,
    max_detections: usize,
    iou_thresholds: &[f64],
) -> Option<ImageEvaluation> {
    if ground_truth.is_empty() && detections.is_empty() {
        return None;
    }

    // ground truth inside the range first, order otherwise kept
    let mut gt: Vec<(BoundingBox, bool)> =
        ground_truth.iter().map(|b| (*b, !range.contains(area(b)))).collect();
    gt.sort_by_key(|&(_, ignore)| ignore);

    let mut dt: Vec<(BoundingBox, f32)> = detections.to_vec();
    dt.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    dt.truncate(max_detections);

    let ious: Vec<Vec<f64>> =
        dt.iter().map(|(d, _)| gt.iter().map(|(g, _)| f64::from(d.iou(g))).collect()).collect();

    let n_thresholds = iou_thresholds.len();
    let mut matched = vec![vec![false; dt.len()]; n_thresholds];
    let mut ignored = vec![vec![false; dt.len()]; n_thresholds];

    for (t, &threshold) in iou_thresholds.iter().enumerate() {
        let mut gt_taken = vec![false; gt.len()];
        for (d, row) in ious.iter().enumerate() {
            let mut best_iou = threshold.min(1.0 - 1e-10);
            let mut best: Option<usize> = None;
            for (g, &(_, gt_ignore)) in gt.iter().enumerate() {
                if gt_taken[g] {
                    continue;
                }
                // a real match is never traded for an ignored one
                if matches!(best, Some(m) if !gt[m].1) && gt_ignore {
                    break;
                }
                if row[g] < best_iou {
                    continue;
                }
                best_iou = row[g];
                best = Some(g);
            }
            if let Some(m) = best {
                gt_taken[m] = true;
                matched[t][d] = true;
                ignored[t][d] = gt[m].1;
            }
        }
        for (d, (bbox, _)) in dt.iter().enumerate() {
            if !matched[t][d] && !range.contains(area(bbox)) {
                ignored[t][d] = true;
            }
        }
    }

    Some(ImageEvaluation {
        scores: dt.iter().map(|(_, s)| f64::from(*s)).collect(),
        matched,
        ignored,
        num_positives: gt.iter().filter(|(_, ignore)| !ignore).count(),
    })
}
