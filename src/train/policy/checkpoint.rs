//! Checkpoint policy: persist whenever the monitored metric strictly improves

use std::path::{Path, PathBuf};

use super::improves;
use crate::config::{CheckpointConfig, MonitorMode, MonitoredMetric};

/// Outcome of one validation for the checkpoint policy
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointDecision {
    pub value: f32,
    pub improved: bool,
    /// Files to write for this epoch, in order
    pub paths: Vec<PathBuf>,
}

/// Decides which checkpoint files a validation epoch produces
///
/// An epoch whose monitored value strictly beats the best so far is written
/// to `checkpoint_epoch_{k}.json` and `checkpoint_best.json`. With
/// `save_last`, every epoch also overwrites `checkpoint_last.json`.
#[derive(Clone, Debug)]
pub struct CheckpointPolicy {
    /// Directory to save checkpoints
    checkpoint_dir: PathBuf,
    monitor: MonitoredMetric,
    mode: MonitorMode,
    save_last: bool,
    best: Option<f32>,
}

impl CheckpointPolicy {
    pub fn new(
        checkpoint_dir: impl Into<PathBuf>,
        monitor: MonitoredMetric,
        mode: MonitorMode,
        save_last: bool,
    ) -> Self {
        Self { checkpoint_dir: checkpoint_dir.into(), monitor, mode, save_last, best: None }
    }

    pub fn from_config(config: &CheckpointConfig) -> Self {
        Self::new(&config.dirpath, config.monitor, config.mode, config.save_last)
    }

    pub fn dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    pub fn monitor(&self) -> MonitoredMetric {
        self.monitor
    }

    pub fn best(&self) -> Option<f32> {
        self.best
    }

    pub fn restore(&mut self, best: Option<f32>) {
        self.best = best;
    }

    /// Get checkpoint path for epoch
    pub fn checkpoint_path(&self, epoch: usize) -> PathBuf {
        self.checkpoint_dir.join(format!("checkpoint_epoch_{epoch}.json"))
    }

    /// Get best checkpoint path
    pub fn best_checkpoint_path(&self) -> PathBuf {
        self.checkpoint_dir.join("checkpoint_best.json")
    }

    pub fn last_checkpoint_path(&self) -> PathBuf {
        self.checkpoint_dir.join("checkpoint_last.json")
    }

    /// Record the monitored value of `epoch` and list the files to write
    pub fn evaluate(&mut self, epoch: usize, value: f32) -> CheckpointDecision {
        let improved = improves(self.mode, value, self.best, 0.0);
        let mut paths = Vec::new();
        if improved {
            self.best = Some(value);
            paths.push(self.checkpoint_path(epoch));
            paths.push(self.best_checkpoint_path());
        }
        if self.save_last {
            paths.push(self.last_checkpoint_path());
        }
        CheckpointDecision { value, improved, paths }
    }
}
