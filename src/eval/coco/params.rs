//! Fixed evaluation grid: IoU thresholds, recall thresholds, area ranges, detection caps

use std::fmt;

/// Boxes up to this area (32²) count as small
pub const SMALL_AREA: f64 = 32.0 * 32.0;
/// Boxes up to this area (96²) count as medium
pub const MEDIUM_AREA: f64 = 96.0 * 96.0;
const MAX_AREA: f64 = 1e10;

/// Detection caps per image, ascending; matching runs once at the largest
pub const MAX_DETECTIONS: [usize; 3] = [1, 10, 100];

/// Object size bucket; bounds are inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AreaRange {
    All,
    Small,
    Medium,
    Large,
}

impl AreaRange {
    pub const ALL: [AreaRange; 4] = [AreaRange::All, AreaRange::Small, AreaRange::Medium, AreaRange::Large];

    pub fn bounds(self) -> (f64, f64) {
        match self {
            AreaRange::All => (0.0, MAX_AREA),
            AreaRange::Small => (0.0, SMALL_AREA),
            AreaRange::Medium => (SMALL_AREA, MEDIUM_AREA),
            AreaRange::Large => (MEDIUM_AREA, MAX_AREA),
        }
    }

    pub fn contains(self, area: f64) -> bool {
        let (lo, hi) = self.bounds();
        area >= lo && area <= hi
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            AreaRange::All => "all",
            AreaRange::Small => "small",
            AreaRange::Medium => "medium",
            AreaRange::Large => "large",
        }
    }
}

impl fmt::Display for AreaRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Threshold grids shared by matching and accumulation
#[derive(Debug, Clone, PartialEq)]
pub struct EvalParams {
    /// `0.50:0.05:0.95`
    pub iou_thresholds: Vec<f64>,
    /// `0:0.01:1`
    pub recall_thresholds: Vec<f64>,
}

impl Default for EvalParams {
    fn default() -> Self {
        Self {
            iou_thresholds: linspace(0.5, 0.95, 10),
            recall_thresholds: linspace(0.0, 1.0, 101),
        }
    }
}

impl EvalParams {
    /// Position of an IoU threshold in the grid
    pub fn iou_index(&self, threshold: f64) -> Option<usize> {
        self.iou_thresholds.iter().position(|t| (t - threshold).abs() < 1e-9)
    }
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_grid() {
        let p = EvalParams::default();
        assert_eq!(p.iou_thresholds.len(), 10);
        assert_eq!(p.recall_thresholds.len(), 101);
        assert_relative_eq!(p.iou_thresholds[9], 0.95, epsilon = 1e-12);
        assert_relative_eq!(p.recall_thresholds[100], 1.0, epsilon = 1e-12);
        assert_eq!(p.iou_index(0.5), Some(0));
        assert_eq!(p.iou_index(0.75), Some(5));
        assert_eq!(p.iou_index(0.33), None);
    }

    #[test]
    fn test_area_ranges_inclusive() {
        assert!(AreaRange::Small.contains(SMALL_AREA));
        assert!(AreaRange::Medium.contains(SMALL_AREA));
        assert!(!AreaRange::Large.contains(SMALL_AREA));
        assert!(AreaRange::Large.contains(100.0 * 100.0));
        assert!(AreaRange::All.contains(0.0));
        assert_eq!(format!("{:>6}", AreaRange::All), "   all");
    }
}
