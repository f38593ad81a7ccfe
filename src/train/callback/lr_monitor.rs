//! Learning-rate history recording

use std::sync::{Arc, Mutex};

use super::traits::{EpochSummary, LifecycleHook, StepContext};
use crate::config::SchedulerInterval;

/// One recorded learning rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LrRecord {
    pub epoch: usize,
    pub global_step: usize,
    pub lr: f32,
}

/// Records the learning rate every train step or once per epoch
///
/// The history is shared through [`LearningRateMonitor::history`], so it
/// stays readable after the hook is boxed into a controller.
#[derive(Debug, Clone)]
pub struct LearningRateMonitor {
    interval: SchedulerInterval,
    history: Arc<Mutex<Vec<LrRecord>>>,
}

impl LearningRateMonitor {
    pub fn new(interval: SchedulerInterval) -> Self {
        Self { interval, history: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Handle onto the recorded history
    pub fn history(&self) -> Arc<Mutex<Vec<LrRecord>>> {
        Arc::clone(&self.history)
    }

    fn record(&self, record: LrRecord) {
        if let Ok(mut history) = self.history.lock() {
            history.push(record);
        }
    }
}

impl LifecycleHook for LearningRateMonitor {
    fn on_train_step_end(&mut self, ctx: &StepContext) {
        if self.interval == SchedulerInterval::Step {
            self.record(LrRecord { epoch: ctx.epoch, global_step: ctx.global_step, lr: ctx.lr });
        }
    }

    fn on_epoch_end(&mut self, summary: &EpochSummary) {
        if self.interval == SchedulerInterval::Epoch {
            self.record(LrRecord {
                epoch: summary.epoch,
                global_step: summary.global_step,
                lr: summary.lr,
            });
        }
    }

    fn name(&self) -> &'static str {
        "LearningRateMonitor"
    }
}
