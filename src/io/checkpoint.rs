//! JSON checkpoints of model parameters, optimizer state and counters
//!
//! A checkpoint is written to a sibling temporary file and renamed into
//! place, so a crash mid-write never leaves a truncated checkpoint behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::MonitoredMetric;
use crate::error::{Error, Result};
use crate::optim::{DriverCounters, OptimizerState, Parameter};
use crate::train::EarlyStoppingState;

/// Saved values of one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub name: String,
    pub values: Vec<f32>,
}

/// Policy state needed to continue a run where it left off
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    /// Best monitored value the checkpoint policy has seen
    pub checkpoint_best: Option<f32>,
    pub early_stopping: Option<EarlyStoppingState>,
}

/// Everything `resume_from` restores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub epoch: usize,
    pub global_step: usize,
    pub metric: MonitoredMetric,
    /// Monitored value at `epoch`
    pub value: f32,
    pub parameters: Vec<ParameterSnapshot>,
    pub optimizer: OptimizerState,
    pub scheduler: DriverCounters,
    #[serde(default)]
    pub policies: PolicySnapshot,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Snapshot every parameter, frozen ones included
    pub fn capture_parameters(params: &[Parameter]) -> Vec<ParameterSnapshot> {
        params
            .iter()
            .map(|p| ParameterSnapshot { name: p.name.clone(), values: p.data.to_vec() })
            .collect()
    }

    /// Copy saved values into `params`, matching by name
    ///
    /// Every live parameter must be present with the same length; the
    /// `requires_grad` flags of the live model are left as they are.
    pub fn restore_parameters(&self, path: &Path, params: &mut [Parameter]) -> Result<()> {
        for param in params.iter_mut() {
            let snapshot = self
                .parameters
                .iter()
                .find(|s| s.name == param.name)
                .ok_or_else(|| Error::checkpoint(path, format!("missing parameter '{}'", param.name)))?;
            if snapshot.values.len() != param.data.len() {
                return Err(Error::checkpoint(
                    path,
                    format!(
                        "parameter '{}' has {} saved values, model expects {}",
                        param.name,
                        snapshot.values.len(),
                        param.data.len()
                    ),
                ));
            }
            param.data.iter_mut().zip(&snapshot.values).for_each(|(d, &v)| *d = v);
        }
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write a checkpoint atomically, creating the parent directory if needed
pub fn save_checkpoint(path: impl AsRef<Path>, checkpoint: &Checkpoint) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::checkpoint(path, e))?;
    }

    let data = serde_json::to_string_pretty(checkpoint)
        .map_err(|e| Error::checkpoint(path, format!("JSON serialization failed: {e}")))?;

    let tmp = temp_path(path);
    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(data.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    };
    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        Error::checkpoint(path, e)
    })
}

/// Read a checkpoint written by [`save_checkpoint`]
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<Checkpoint> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).map_err(|e| Error::checkpoint(path, e))?;
    serde_json::from_str(&data)
        .map_err(|e| Error::checkpoint(path, format!("JSON deserialization failed: {e}")))
}
