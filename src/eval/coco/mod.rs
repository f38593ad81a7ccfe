//! COCO-style box evaluation
//!
//! Detections are matched greedily to ground truth per image and category at
//! ten IoU thresholds, then reduced to interpolated precision at 101 recall
//! levels for every area range and detection cap.

mod accumulator;
mod matching;
mod params;
mod summary;

pub use accumulator::{EvaluationAccumulator, EvaluationTables};
pub use matching::{evaluate_image, ImageEvaluation};
pub use params::{AreaRange, EvalParams, MAX_DETECTIONS, MEDIUM_AREA, SMALL_AREA};
pub use summary::{CocoStats, EvaluationSummary};
