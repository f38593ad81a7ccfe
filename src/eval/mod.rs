//! Detection evaluation
//!
//! - `detection`: per-image model predictions
//! - `coco`: COCO-style AP/AR accumulation over a split
//! - `postprocess`: score thresholding and per-class NMS for inference output
//!
//! ## Example
//!
//! ```rust
//! use detectar::config::IouType;
//! use detectar::data::{BoundingBox, TargetRecord};
//! use detectar::eval::{Detection, DetectionResult, EvaluationAccumulator};
//!
//! let mut target = TargetRecord::new(0);
//! let bbox = BoundingBox::new(0.0, 0.0, 40.0, 40.0).unwrap();
//! target.push(bbox, 1);
//!
//! let mut acc = EvaluationAccumulator::new(vec![target], &[IouType::Bbox]).unwrap();
//! let result = DetectionResult::new(vec![Detection { bbox, label: 1, score: 0.9 }]);
//! acc.update(vec![(0, result)]).unwrap();
//! acc.accumulate().unwrap();
//! let summary = acc.summarize().unwrap();
//! assert!((summary.primary_ap - 1.0).abs() < 1e-9);
//! ```

pub mod coco;
mod detection;
mod postprocess;

pub use coco::{CocoStats, EvaluationAccumulator, EvaluationSummary};
pub use detection::{Detection, DetectionResult};
pub use postprocess::PostProcessor;
