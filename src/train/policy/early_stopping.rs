//! Early stopping when the monitored metric plateaus

use serde::{Deserialize, Serialize};
use tracing::info;

use super::improves;
use crate::config::{EarlyStoppingConfig, MonitorMode, MonitoredMetric};

/// Best value and non-improving streak, persisted with checkpoints
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EarlyStoppingState {
    pub best: Option<f32>,
    pub epochs_without_improvement: usize,
}

/// Stops training once `patience` consecutive validations fail to improve
/// the monitored metric by more than `min_delta`
///
/// The first validation always sets the baseline, so a metric that never
/// improves stops training after exactly `patience + 1` validations.
///
/// # Example
///
/// ```rust
/// use detectar::config::{MonitorMode, MonitoredMetric};
/// use detectar::train::EarlyStopping;
///
/// // Stop if no improvement for 5 epochs, min improvement 0.001
/// let early_stop = EarlyStopping::new(MonitoredMetric::ValLoss, MonitorMode::Min, 5, 0.001);
/// ```
#[derive(Clone, Debug)]
pub struct EarlyStopping {
    monitor: MonitoredMetric,
    mode: MonitorMode,
    /// Number of epochs to wait for improvement
    patience: usize,
    /// Minimum improvement to reset patience
    min_delta: f32,
    state: EarlyStoppingState,
}

impl EarlyStopping {
    pub fn new(monitor: MonitoredMetric, mode: MonitorMode, patience: usize, min_delta: f32) -> Self {
        Self { monitor, mode, patience, min_delta, state: EarlyStoppingState::default() }
    }

    pub fn from_config(config: &EarlyStoppingConfig) -> Self {
        Self::new(config.monitor, config.mode, config.patience, config.min_delta)
    }

    pub fn monitor(&self) -> MonitoredMetric {
        self.monitor
    }

    pub fn patience(&self) -> usize {
        self.patience
    }

    pub fn best(&self) -> Option<f32> {
        self.state.best
    }

    pub fn state(&self) -> EarlyStoppingState {
        self.state
    }

    pub fn restore(&mut self, state: EarlyStoppingState) {
        self.state = state;
    }

    /// Record one validation; returns true when training should stop
    pub fn update(&mut self, value: f32) -> bool {
        if improves(self.mode, value, self.state.best, self.min_delta) {
            self.state.best = Some(value);
            self.state.epochs_without_improvement = 0;
            return false;
        }
        self.state.epochs_without_improvement += 1;
        let stop = self.state.epochs_without_improvement >= self.patience;
        if stop {
            info!(
                metric = self.monitor.name(),
                patience = self.patience,
                best = ?self.state.best,
                "early stopping: no improvement for {} validations",
                self.state.epochs_without_improvement
            );
        }
        stop
    }
}
