//! Per-epoch metrics appended to a CSV file

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use super::traits::{EpochSummary, LifecycleHook};

#[derive(Debug, Serialize)]
struct EpochRow {
    epoch: usize,
    global_step: usize,
    train_loss: f32,
    train_loss_classifier: f32,
    train_loss_box_reg: f32,
    val_loss: f32,
    val_loss_classifier: f32,
    val_loss_box_reg: f32,
    lr: f32,
    elapsed_secs: f64,
}

impl From<&EpochSummary> for EpochRow {
    fn from(s: &EpochSummary) -> Self {
        Self {
            epoch: s.epoch,
            global_step: s.global_step,
            train_loss: s.train.total(),
            train_loss_classifier: s.train.classification,
            train_loss_box_reg: s.train.regression,
            val_loss: s.validation.total(),
            val_loss_classifier: s.validation.classification,
            val_loss_box_reg: s.validation.regression,
            lr: s.lr,
            elapsed_secs: s.elapsed_secs,
        }
    }
}

/// Appends one row per validated epoch; the header is written only when
/// the file is new or empty, so resumed runs keep extending the same file
#[derive(Debug, Clone)]
pub struct CsvMetricsLogger {
    path: PathBuf,
}

impl CsvMetricsLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, row: &EpochRow) -> Result<(), csv::Error> {
        let needs_header = std::fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(needs_header).from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;
        Ok(())
    }
}

impl LifecycleHook for CsvMetricsLogger {
    fn on_epoch_end(&mut self, summary: &EpochSummary) {
        if let Err(e) = self.append(&EpochRow::from(summary)) {
            warn!(path = %self.path.display(), error = %e, "failed to append epoch metrics");
        }
    }

    fn name(&self) -> &'static str {
        "CsvMetricsLogger"
    }
}
