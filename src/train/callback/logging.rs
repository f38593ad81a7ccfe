//! Structured progress logging through `tracing`

use tracing::{info, warn};

use super::traits::{CheckpointEvent, EarlyStopEvent, EpochSummary, LifecycleHook, StageContext, StepContext};
use crate::data::Stage;

/// Logs stage entry, every n-th train step, epoch summaries and policy events
#[derive(Debug, Clone)]
pub struct LoggingHook {
    log_every_n_steps: usize,
}

impl LoggingHook {
    /// `log_every_n_steps == 0` silences per-step lines
    pub fn new(log_every_n_steps: usize) -> Self {
        Self { log_every_n_steps }
    }

    /// Whether the step line of `global_step` is emitted
    pub fn should_log_step(&self, global_step: usize) -> bool {
        self.log_every_n_steps > 0 && global_step % self.log_every_n_steps == 0
    }
}

impl LifecycleHook for LoggingHook {
    fn on_stage_start(&mut self, ctx: &StageContext) {
        match ctx.stage {
            Stage::Train => {
                info!(
                    batches = ctx.num_batches,
                    max_epochs = ctx.max_epochs,
                    "Training on {} images",
                    ctx.dataset_len
                );
                if ctx.global_step > 0 {
                    info!(epoch = ctx.epoch, "Training from iteration {}", ctx.global_step);
                }
            }
            Stage::Test => {
                info!(batches = ctx.num_batches, "Inference on {} images", ctx.dataset_len);
            }
            Stage::Validation => {}
        }
    }

    fn on_train_step_end(&mut self, ctx: &StepContext) {
        if self.should_log_step(ctx.global_step) {
            info!(
                epoch = ctx.epoch,
                step = ctx.step,
                steps = ctx.steps_per_epoch,
                loss = ctx.loss.total(),
                loss_classifier = ctx.loss.classification,
                loss_box_reg = ctx.loss.regression,
                lr = ctx.lr,
                "iter {}",
                ctx.global_step
            );
        }
    }

    fn on_epoch_end(&mut self, summary: &EpochSummary) {
        info!(
            train_loss = summary.train.total(),
            val_loss = summary.validation.total(),
            val_loss_classifier = summary.validation.classification,
            val_loss_box_reg = summary.validation.regression,
            lr = summary.lr,
            elapsed_secs = summary.elapsed_secs,
            "epoch {}/{} done",
            summary.epoch,
            summary.max_epochs
        );
    }

    fn on_checkpoint_saved(&mut self, event: &CheckpointEvent) {
        info!(
            path = %event.path.display(),
            metric = event.metric.name(),
            value = event.value,
            best = event.is_best,
            "saved checkpoint for epoch {}",
            event.epoch
        );
    }

    fn on_early_stop(&mut self, event: &EarlyStopEvent) {
        warn!(
            metric = event.metric.name(),
            best = ?event.best,
            patience = event.patience,
            "early stopping at epoch {}",
            event.epoch
        );
    }

    fn name(&self) -> &'static str {
        "LoggingHook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_cadence() {
        let hook = LoggingHook::new(50);
        assert!(!hook.should_log_step(1));
        assert!(hook.should_log_step(50));
        assert!(hook.should_log_step(100));
        assert!(!LoggingHook::new(0).should_log_step(0));
    }
}
