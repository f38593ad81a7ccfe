//! Validation-epoch policies: checkpointing and early stopping
//!
//! Both policies watch one validation metric in a direction given by
//! [`MonitorMode`]. They are owned and driven by the lifecycle controller;
//! hooks only observe their outcomes.

mod checkpoint;
mod early_stopping;

pub use checkpoint::{CheckpointDecision, CheckpointPolicy};
pub use early_stopping::{EarlyStopping, EarlyStoppingState};

use crate::config::MonitorMode;

/// Whether `value` beats `best` by more than `min_delta`
///
/// With no best yet, any finite value is an improvement.
pub(crate) fn improves(mode: MonitorMode, value: f32, best: Option<f32>, min_delta: f32) -> bool {
    match best {
        None => value.is_finite(),
        Some(best) => match mode {
            MonitorMode::Min => value < best - min_delta,
            MonitorMode::Max => value > best + min_delta,
        },
    }
}
