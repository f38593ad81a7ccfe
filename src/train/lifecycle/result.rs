//! Lifecycle result types

use serde::Serialize;

use crate::eval::EvaluationSummary;
use crate::train::LossBreakdown;

/// One train + validate cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochReport {
    pub epoch: usize,
    /// Mean train loss over the epoch's batches
    pub train: LossBreakdown,
    /// Mean validation loss over the epoch's batches
    pub validation: LossBreakdown,
    /// Value of the checkpoint policy's monitored metric
    pub monitored: f32,
    pub lr: f32,
    /// Whether the checkpoint policy saw a strict improvement
    pub improved: bool,
    pub stopped_early: bool,
}

/// Result of a training run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitResult {
    /// Epochs completed, including any restored from a checkpoint
    pub epochs: usize,
    pub global_step: usize,
    /// Whether training was stopped early
    pub stopped_early: bool,
    /// Best monitored value the checkpoint policy has seen
    pub best: Option<f32>,
    pub history: Vec<EpochReport>,
    /// Total training time in seconds
    pub elapsed_secs: f64,
}

/// Result of the test stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestReport {
    pub images: usize,
    pub batches: usize,
    pub summary: EvaluationSummary,
}
