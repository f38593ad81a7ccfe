//! The twelve standard statistics and per-category AP

use ndarray::{s, ArrayViewD, Axis};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::accumulator::EvaluationTables;
use super::params::{AreaRange, EvalParams, MAX_DETECTIONS};
use crate::config::IouType;

/// `(is_ap, iou threshold, area, max detections)` of each statistic
const STAT_LAYOUT: [(bool, Option<f64>, AreaRange, usize); 12] = [
    (true, None, AreaRange::All, 100),
    (true, Some(0.5), AreaRange::All, 100),
    (true, Some(0.75), AreaRange::All, 100),
    (true, None, AreaRange::Small, 100),
    (true, None, AreaRange::Medium, 100),
    (true, None, AreaRange::Large, 100),
    (false, None, AreaRange::All, 1),
    (false, None, AreaRange::All, 10),
    (false, None, AreaRange::All, 100),
    (false, None, AreaRange::Small, 100),
    (false, None, AreaRange::Medium, 100),
    (false, None, AreaRange::Large, 100),
];

/// Mean over valid cells, `-1` when there are none
fn mean_valid(values: ArrayViewD<'_, f64>) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| **v > -1.0)
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        -1.0
    } else {
        sum / count as f64
    }
}

fn cap_index(cap: usize) -> usize {
    MAX_DETECTIONS.iter().position(|&m| m == cap).unwrap_or(MAX_DETECTIONS.len() - 1)
}

/// Statistics of one IoU type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CocoStats {
    pub iou_type: IouType,
    /// AP, AP50, AP75, AP small/medium/large, AR1, AR10, AR100, AR small/medium/large
    pub stats: [f64; 12],
    /// AP @ IoU 0.50:0.95, all areas, 100 detections, per category
    pub per_category: BTreeMap<u32, f64>,
}

impl CocoStats {
    pub fn from_tables(tables: &EvaluationTables, params: &EvalParams) -> Self {
        let mut stats = [-1.0; 12];
        for (slot, &(is_ap, iou, area, cap)) in stats.iter_mut().zip(STAT_LAYOUT.iter()) {
            let a = area.index();
            let m = cap_index(cap);
            let t_range = match iou.and_then(|thr| params.iou_index(thr)) {
                Some(t) => t..t + 1,
                None => 0..params.iou_thresholds.len(),
            };
            *slot = if is_ap {
                mean_valid(tables.precision.slice(s![t_range, .., .., a, m]).into_dyn())
            } else {
                mean_valid(tables.recall.slice(s![t_range, .., a, m]).into_dyn())
            };
        }

        let all = AreaRange::All.index();
        let m = cap_index(100);
        let per_category = tables
            .categories
            .iter()
            .enumerate()
            .map(|(k, &category)| {
                let cell = tables.precision.index_axis(Axis(2), k);
                (category, mean_valid(cell.slice(s![.., .., all, m]).into_dyn()))
            })
            .collect();

        Self { iou_type: tables.iou_type, stats, per_category }
    }

    pub fn ap(&self) -> f64 {
        self.stats[0]
    }

    pub fn ap50(&self) -> f64 {
        self.stats[1]
    }

    pub fn ap75(&self) -> f64 {
        self.stats[2]
    }

    pub fn ar100(&self) -> f64 {
        self.stats[8]
    }

    /// The summary table, one line per statistic
    pub fn lines(&self) -> Vec<String> {
        STAT_LAYOUT
            .iter()
            .zip(self.stats.iter())
            .map(|(&(is_ap, iou, area, cap), value)| {
                let (title, short) =
                    if is_ap { ("Average Precision", "(AP)") } else { ("Average Recall", "(AR)") };
                let iou = match iou {
                    Some(thr) => format!("{thr:.2}"),
                    None => "0.50:0.95".to_string(),
                };
                format!(
                    " {title:<18} {short} @[ IoU={iou:<9} | area={area:>6} | maxDets={cap:>3} ] = {value:.3}"
                )
            })
            .collect()
    }
}

impl fmt::Display for CocoStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Result of [`EvaluationAccumulator::summarize`](super::EvaluationAccumulator::summarize)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    /// AP @ IoU 0.50:0.95, all areas, 100 detections, of the first IoU type
    pub primary_ap: f64,
    pub per_type: Vec<CocoStats>,
}

impl EvaluationSummary {
    pub fn new(per_type: Vec<CocoStats>) -> Self {
        let primary_ap = per_type.first().map(CocoStats::ap).unwrap_or(-1.0);
        Self { primary_ap, per_type }
    }

    pub fn stats(&self, iou_type: IouType) -> Option<&CocoStats> {
        self.per_type.iter().find(|s| s.iou_type == iou_type)
    }
}
