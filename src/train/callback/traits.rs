//! Core traits and types for lifecycle hooks
//!
//! - `StageContext` - passed when the train or test stage starts
//! - `StepContext` - passed after every train step
//! - `EpochSummary` - passed after every validation
//! - `LifecycleHook` - the trait all hooks implement
//!
//! Hooks observe; none of the methods return anything, so a hook cannot
//! stop training or skip work.

use std::path::PathBuf;

use crate::config::MonitoredMetric;
use crate::data::Stage;
use crate::train::LossBreakdown;

/// Context passed when a stage starts
#[derive(Clone, Debug, PartialEq)]
pub struct StageContext {
    pub stage: Stage,
    /// Epoch the stage starts at (1-indexed; 0 before any training)
    pub epoch: usize,
    /// Global step the stage starts from
    pub global_step: usize,
    /// Images in the stage's split
    pub dataset_len: usize,
    /// Batches per pass over the split
    pub num_batches: usize,
    pub max_epochs: usize,
}

/// Context passed after each train step
#[derive(Clone, Debug, PartialEq)]
pub struct StepContext {
    pub epoch: usize,
    /// Step within the epoch (1-indexed)
    pub step: usize,
    pub steps_per_epoch: usize,
    pub global_step: usize,
    pub loss: LossBreakdown,
    /// Learning rate after the step (and any schedule advance)
    pub lr: f32,
}

/// Metrics of one completed train/validate cycle
#[derive(Clone, Debug, PartialEq)]
pub struct EpochSummary {
    pub epoch: usize,
    pub max_epochs: usize,
    pub global_step: usize,
    /// Mean train loss over the epoch's batches
    pub train: LossBreakdown,
    /// Mean validation loss over the epoch's batches
    pub validation: LossBreakdown,
    pub lr: f32,
    pub elapsed_secs: f64,
}

/// A checkpoint file that was written
#[derive(Clone, Debug, PartialEq)]
pub struct CheckpointEvent {
    pub epoch: usize,
    pub path: PathBuf,
    pub metric: MonitoredMetric,
    pub value: f32,
    pub is_best: bool,
}

/// Early stopping fired
#[derive(Clone, Debug, PartialEq)]
pub struct EarlyStopEvent {
    pub epoch: usize,
    pub metric: MonitoredMetric,
    pub best: Option<f32>,
    pub patience: usize,
}

/// Trait for lifecycle hooks
///
/// All methods have default no-op implementations, so you only need to
/// implement the events you care about.
pub trait LifecycleHook: Send {
    /// Called once on entry into the first training epoch and into testing
    fn on_stage_start(&mut self, _ctx: &StageContext) {}

    /// Called after each training step
    fn on_train_step_end(&mut self, _ctx: &StepContext) {}

    /// Called after each validation
    fn on_epoch_end(&mut self, _summary: &EpochSummary) {}

    /// Called after each checkpoint file is written
    fn on_checkpoint_saved(&mut self, _event: &CheckpointEvent) {}

    /// Called when early stopping ends training
    fn on_early_stop(&mut self, _event: &EarlyStopEvent) {}

    /// Get hook name for logging
    fn name(&self) -> &'static str {
        "LifecycleHook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hook_impl() {
        struct MinimalHook;
        impl LifecycleHook for MinimalHook {
            fn name(&self) -> &'static str {
                "MinimalHook"
            }
        }

        let mut hook = MinimalHook;
        let ctx = StageContext {
            stage: Stage::Train,
            epoch: 1,
            global_step: 0,
            dataset_len: 4,
            num_batches: 2,
            max_epochs: 3,
        };
        hook.on_stage_start(&ctx);
        hook.on_early_stop(&EarlyStopEvent {
            epoch: 2,
            metric: MonitoredMetric::ValLoss,
            best: Some(0.1),
            patience: 1,
        });
        assert_eq!(hook.name(), "MinimalHook");
    }
}
