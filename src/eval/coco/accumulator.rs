//! Accumulates per-image detections and reduces them to precision/recall tables

use ndarray::{Array4, Array5};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use super::matching::{evaluate_image, ImageEvaluation};
use super::params::{AreaRange, EvalParams, MAX_DETECTIONS};
use super::summary::{CocoStats, EvaluationSummary};
use crate::config::IouType;
use crate::data::{BoundingBox, ImageId, TargetRecord};
use crate::error::{Error, Result};
use crate::eval::DetectionResult;

/// Precision and recall of one IoU type
///
/// `precision` is `[iou threshold, recall threshold, category, area, max dets]`
/// and `recall` is `[iou threshold, category, area, max dets]`. Cells with no
/// ground truth hold `-1`.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationTables {
    pub iou_type: IouType,
    pub categories: Vec<u32>,
    pub precision: Array5<f64>,
    pub recall: Array4<f64>,
}

#[derive(Debug)]
enum Phase {
    Collecting,
    Accumulated(Vec<EvaluationTables>),
}

/// COCO-style evaluation over the images of one split
///
/// Results can arrive in any order and in any number of `update` calls;
/// images are always evaluated in identifier order.
#[derive(Debug)]
pub struct EvaluationAccumulator {
    iou_types: Vec<IouType>,
    params: EvalParams,
    ground_truth: BTreeMap<ImageId, TargetRecord>,
    categories: Vec<u32>,
    results: BTreeMap<ImageId, DetectionResult>,
    phase: Phase,
}

impl EvaluationAccumulator {
    /// Accumulator over `ground_truth`; categories are the labels it contains
    pub fn new(ground_truth: Vec<TargetRecord>, iou_types: &[IouType]) -> Result<Self> {
        if iou_types.is_empty() {
            return Err(Error::config("at least one IoU type is required"));
        }
        let mut by_id = BTreeMap::new();
        for target in ground_truth {
            let id = target.image_id;
            if by_id.insert(id, target).is_some() {
                return Err(Error::DuplicateImage(id));
            }
        }
        let categories: BTreeSet<u32> = by_id.values().flat_map(|t| t.labels()).collect();

        Ok(Self {
            iou_types: iou_types.to_vec(),
            params: EvalParams::default(),
            ground_truth: by_id,
            categories: categories.into_iter().collect(),
            results: BTreeMap::new(),
            phase: Phase::Collecting,
        })
    }

    pub fn categories(&self) -> &[u32] {
        &self.categories
    }

    pub fn num_images(&self) -> usize {
        self.ground_truth.len()
    }

    /// Images that have received results so far
    pub fn num_updated(&self) -> usize {
        self.results.len()
    }

    pub fn is_accumulated(&self) -> bool {
        matches!(self.phase, Phase::Accumulated(_))
    }

    /// Merge per-image results
    ///
    /// Nothing is merged if any id is a duplicate (of an earlier update or
    /// within this one) or has no ground truth.
    pub fn update(&mut self, results: Vec<(ImageId, DetectionResult)>) -> Result<()> {
        if self.is_accumulated() {
            return Err(Error::EvaluationState("update called after accumulate".into()));
        }
        let mut seen = BTreeSet::new();
        for (id, result) in &results {
            if !self.ground_truth.contains_key(id) {
                return Err(Error::UnknownImage(*id));
            }
            if self.results.contains_key(id) || !seen.insert(*id) {
                return Err(Error::DuplicateImage(*id));
            }
            result.validate()?;
        }
        debug!(images = results.len(), "evaluation update");
        self.results.extend(results);
        Ok(())
    }

    /// Swap in ground truth for images already known to the accumulator
    ///
    /// Used when the evaluated images went through a transform after the
    /// accumulator was built, so boxes must follow them into the same space.
    pub fn replace_ground_truth(&mut self, targets: &[TargetRecord]) -> Result<()> {
        if self.is_accumulated() {
            return Err(Error::EvaluationState("ground truth replaced after accumulate".into()));
        }
        if let Some(unknown) = targets.iter().find(|t| !self.ground_truth.contains_key(&t.image_id)) {
            return Err(Error::UnknownImage(unknown.image_id));
        }
        for target in targets {
            self.ground_truth.insert(target.image_id, target.clone());
        }
        let categories: BTreeSet<u32> = self.ground_truth.values().flat_map(|t| t.labels()).collect();
        self.categories = categories.into_iter().collect();
        Ok(())
    }

    /// Match and tabulate; a second call does nothing
    ///
    /// Images that never received results count as having no detections.
    pub fn accumulate(&mut self) -> Result<()> {
        if self.is_accumulated() {
            return Ok(());
        }
        let missing = self.ground_truth.len() - self.results.len();
        if missing > 0 {
            debug!(missing, "images without results evaluate as empty");
        }
        let tables = self.iou_types.iter().map(|&t| self.tabulate(t)).collect();
        self.phase = Phase::Accumulated(tables);
        info!(images = self.ground_truth.len(), categories = self.categories.len(), "accumulated evaluation results");
        Ok(())
    }

    /// Tables built by [`accumulate`](Self::accumulate)
    pub fn tables(&self) -> Result<&[EvaluationTables]> {
        match &self.phase {
            Phase::Accumulated(tables) => Ok(tables),
            Phase::Collecting => Err(Error::EvaluationState("accumulate has not been called".into())),
        }
    }

    /// Standard statistics per IoU type; logs the summary lines
    pub fn summarize(&self) -> Result<EvaluationSummary> {
        let tables = self.tables()?;
        let per_type: Vec<CocoStats> =
            tables.iter().map(|t| CocoStats::from_tables(t, &self.params)).collect();
        for stats in &per_type {
            info!(iou_type = ?stats.iou_type, "IoU metric: {:?}", stats.iou_type);
            for line in stats.lines() {
                info!("{line}");
            }
        }
        Ok(EvaluationSummary::new(per_type))
    }

    fn tabulate(&self, iou_type: IouType) -> EvaluationTables {
        let n_t = self.params.iou_thresholds.len();
        let n_r = self.params.recall_thresholds.len();
        let n_k = self.categories.len();
        let n_a = AreaRange::ALL.len();
        let n_m = MAX_DETECTIONS.len();
        let mut precision = Array5::from_elem((n_t, n_r, n_k, n_a, n_m), -1.0);
        let mut recall = Array4::from_elem((n_t, n_k, n_a, n_m), -1.0);
        let largest_cap = MAX_DETECTIONS[n_m - 1];

        for (k, &category) in self.categories.iter().enumerate() {
            let per_image: Vec<(Vec<BoundingBox>, Vec<(BoundingBox, f32)>)> = self
                .ground_truth
                .iter()
                .map(|(id, target)| {
                    let gt = target.annotations.iter().filter(|a| a.label == category).map(|a| a.bbox).collect();
                    let dt = self
                        .results
                        .get(id)
                        .map(|r| {
                            r.detections
                                .iter()
                                .filter(|d| d.label == category)
                                .map(|d| (d.bbox, d.score))
                                .collect()
                        })
                        .unwrap_or_default();
                    (gt, dt)
                })
                .collect();

            for range in AreaRange::ALL {
                let evals: Vec<ImageEvaluation> = per_image
                    .iter()
                    .filter_map(|(gt, dt)| {
                        evaluate_image(gt, dt, range, largest_cap, &self.params.iou_thresholds)
                    })
                    .collect();

                for (m, &cap) in MAX_DETECTIONS.iter().enumerate() {
                    let Some(curves) = self.curves(&evals, cap) else { continue };
                    for (t, (tp_recall, q)) in curves.into_iter().enumerate() {
                        recall[[t, k, range.index(), m]] = tp_recall;
                        for (r, value) in q.into_iter().enumerate() {
                            precision[[t, r, k, range.index(), m]] = value;
                        }
                    }
                }
            }
        }

        EvaluationTables { iou_type, categories: self.categories.clone(), precision, recall }
    }

    /// Final recall and sampled precision per IoU threshold; `None` when no
    /// ground truth falls in this cell
    fn curves(&self, evals: &[ImageEvaluation], cap: usize) -> Option<Vec<(f64, Vec<f64>)>> {
        let positives: usize = evals.iter().map(|e| e.num_positives).sum();
        if positives == 0 {
            return None;
        }

        // (score, image, detection) in image order, then stable by score
        let mut order: Vec<(f64, usize, usize)> = evals
            .iter()
            .enumerate()
            .flat_map(|(i, e)| e.scores.iter().take(cap).enumerate().map(move |(d, &s)| (s, i, d)))
            .collect();
        order.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let npig = positives as f64;
        let curves = (0..self.params.iou_thresholds.len())
            .map(|t| {
                let mut tp = 0.0f64;
                let mut fp = 0.0f64;
                let mut rc = Vec::with_capacity(order.len());
                let mut pr = Vec::with_capacity(order.len());
                for &(_, i, d) in &order {
                    let e = &evals[i];
                    if !e.ignored[t][d] {
                        if e.matched[t][d] {
                            tp += 1.0;
                        } else {
                            fp += 1.0;
                        }
                    }
                    rc.push(tp / npig);
                    pr.push(tp / (tp + fp + f64::EPSILON));
                }
                let final_recall = rc.last().copied().unwrap_or(0.0);

                // precision envelope, non-increasing in recall
                for i in (1..pr.len()).rev() {
                    if pr[i] > pr[i - 1] {
                        pr[i - 1] = pr[i];
                    }
                }
                let q = self
                    .params
                    .recall_thresholds
                    .iter()
                    .map(|&thr| {
                        let idx = rc.partition_point(|&x| x < thr);
                        pr.get(idx).copied().unwrap_or(0.0)
                    })
                    .collect();
                (final_recall, q)
            })
            .collect();
        Some(curves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Detection;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2).unwrap()
    }

    fn ground_truth(n: u64) -> Vec<TargetRecord> {
        (0..n)
            .map(|id| {
                let mut t = TargetRecord::new(id);
                let off = id as f32 * 10.0;
                t.push(bbox(off, off, off + 40.0, off + 40.0), 1);
                if id % 2 == 0 {
                    t.push(bbox(off + 100.0, off, off + 110.0, off + 10.0), 2);
                }
                t
            })
            .collect()
    }

    fn perfect(targets: &[TargetRecord]) -> Vec<(ImageId, DetectionResult)> {
        targets
            .iter()
            .map(|t| {
                let dets = t
                    .annotations
                    .iter()
                    .map(|a| Detection { bbox: a.bbox, label: a.label, score: 0.9 })
                    .collect();
                (t.image_id, DetectionResult::new(dets))
            })
            .collect()
    }

    #[test]
    fn test_perfect_detections_score_one() {
        let gt = ground_truth(4);
        let mut acc = EvaluationAccumulator::new(gt.clone(), &[IouType::Bbox]).unwrap();
        assert_eq!(acc.categories(), &[1, 2]);
        acc.update(perfect(&gt)).unwrap();
        acc.accumulate().unwrap();
        let summary = acc.summarize().unwrap();
        assert_relative_eq!(summary.primary_ap, 1.0, epsilon = 1e-9);
        let stats = &summary.per_type[0];
        assert_relative_eq!(stats.ap50(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(stats.ar100(), 1.0, epsilon = 1e-9);
        // no large objects anywhere
        assert_eq!(stats.stats[5], -1.0);
        assert_relative_eq!(stats.per_category[&2], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let gt = ground_truth(2);
        let mut acc = EvaluationAccumulator::new(gt.clone(), &[IouType::Bbox]).unwrap();
        let results = perfect(&gt);
        acc.update(vec![results[0].clone()]).unwrap();
        assert!(matches!(acc.update(vec![results[0].clone()]), Err(Error::DuplicateImage(0))));

        let mut acc = EvaluationAccumulator::new(gt, &[IouType::Bbox]).unwrap();
        let twice = vec![results[1].clone(), results[1].clone()];
        assert!(matches!(acc.update(twice), Err(Error::DuplicateImage(1))));
        assert_eq!(acc.num_updated(), 0);
    }

    #[test]
    fn test_unknown_image_rejected() {
        let mut acc = EvaluationAccumulator::new(ground_truth(1), &[IouType::Bbox]).unwrap();
        let err = acc.update(vec![(9, DetectionResult::default())]).unwrap_err();
        assert!(matches!(err, Error::UnknownImage(9)));
    }

    #[test]
    fn test_phase_errors() {
        let gt = ground_truth(2);
        let mut acc = EvaluationAccumulator::new(gt.clone(), &[IouType::Bbox]).unwrap();
        assert!(matches!(acc.summarize(), Err(Error::EvaluationState(_))));
        acc.accumulate().unwrap();
        // second accumulate is a no-op
        acc.accumulate().unwrap();
        assert!(matches!(acc.update(perfect(&gt)), Err(Error::EvaluationState(_))));
        assert!(matches!(acc.replace_ground_truth(&gt), Err(Error::EvaluationState(_))));
        assert!(EvaluationAccumulator::new(gt, &[]).is_err());
    }

    #[test]
    fn test_replaced_ground_truth_is_scored() {
        let gt = ground_truth(2);
        let scaled: Vec<TargetRecord> = gt
            .iter()
            .map(|t| {
                let mut s = TargetRecord::new(t.image_id);
                for a in &t.annotations {
                    s.push(a.bbox.scaled(2.0, 2.0), a.label);
                }
                s
            })
            .collect();

        let mut acc = EvaluationAccumulator::new(gt, &[IouType::Bbox]).unwrap();
        acc.replace_ground_truth(&scaled).unwrap();
        acc.update(perfect(&scaled)).unwrap();
        acc.accumulate().unwrap();
        assert_relative_eq!(acc.summarize().unwrap().primary_ap, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_replacing_unknown_image_is_atomic() {
        let gt = ground_truth(1);
        let mut acc = EvaluationAccumulator::new(gt.clone(), &[IouType::Bbox]).unwrap();
        let mut extra = TargetRecord::new(7);
        extra.push(bbox(0.0, 0.0, 1.0, 1.0), 3);
        let err = acc.replace_ground_truth(&[gt[0].clone(), extra]).unwrap_err();
        assert!(matches!(err, Error::UnknownImage(7)));
        assert_eq!(acc.categories(), &[1, 2]);
    }

    #[test]
    fn test_missing_detections_lower_ap() {
        let gt = ground_truth(4);
        let mut full = EvaluationAccumulator::new(gt.clone(), &[IouType::Bbox]).unwrap();
        full.update(perfect(&gt)).unwrap();
        full.accumulate().unwrap();

        let mut partial = EvaluationAccumulator::new(gt.clone(), &[IouType::Bbox]).unwrap();
        let mut results = perfect(&gt);
        results[3].1 = DetectionResult::default();
        partial.update(results).unwrap();
        partial.accumulate().unwrap();

        let full_ap = full.summarize().unwrap().primary_ap;
        let partial_ap = partial.summarize().unwrap().primary_ap;
        assert!(partial_ap < full_ap);
    }

    #[test]
    fn test_false_positive_halves_precision_tail() {
        let mut t = TargetRecord::new(0);
        t.push(bbox(0.0, 0.0, 20.0, 20.0), 1);
        let mut acc = EvaluationAccumulator::new(vec![t], &[IouType::Bbox]).unwrap();
        let dets = vec![
            Detection { bbox: bbox(50.0, 50.0, 70.0, 70.0), label: 1, score: 0.9 },
            Detection { bbox: bbox(0.0, 0.0, 20.0, 20.0), label: 1, score: 0.8 },
        ];
        acc.update(vec![(0, DetectionResult::new(dets))]).unwrap();
        acc.accumulate().unwrap();
        let summary = acc.summarize().unwrap();
        // the match comes second, so precision at every recall level is 1/2
        assert_relative_eq!(summary.primary_ap, 0.5, epsilon = 1e-9);
        // with one detection allowed only the false positive is kept
        assert_relative_eq!(summary.per_type[0].stats[6], 0.0, epsilon = 1e-9);
    }

    proptest! {
        #[test]
        fn update_order_does_not_change_result(split in 0usize..6, reverse in any::<bool>()) {
            let gt = ground_truth(6);
            let mut results = perfect(&gt);
            // degrade a few images so AP is not trivially 1
            results[1].1.detections[0].bbox = bbox(500.0, 500.0, 520.0, 520.0);
            results[4].1 = DetectionResult::default();

            let mut single = EvaluationAccumulator::new(gt.clone(), &[IouType::Bbox]).unwrap();
            single.update(results.clone()).unwrap();
            single.accumulate().unwrap();

            if reverse {
                results.reverse();
            }
            let tail = results.split_off(split);
            let mut chunked = EvaluationAccumulator::new(gt, &[IouType::Bbox]).unwrap();
            chunked.update(results).unwrap();
            chunked.update(tail).unwrap();
            chunked.accumulate().unwrap();

            prop_assert_eq!(single.tables().unwrap(), chunked.tables().unwrap());
        }
    }
}
