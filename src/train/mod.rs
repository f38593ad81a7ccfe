//! Detection training lifecycle
//!
//! This module provides:
//! - The `DetectionModel` seam and the `LossBreakdown` record
//! - Single train/validation/test steps (`StepExecutor`)
//! - Checkpoint and early stopping policies
//! - Lifecycle hooks (logging, learning-rate monitoring, CSV metrics)
//! - The `LifecycleController` state machine tying it together
//!
//! # Example
//!
//! ```rust
//! use detectar::config::{MonitorMode, MonitoredMetric};
//! use detectar::train::EarlyStopping;
//!
//! let mut es = EarlyStopping::new(MonitoredMetric::ValLoss, MonitorMode::Min, 2, 0.0);
//! assert!(!es.update(1.0));
//! assert!(!es.update(1.1));
//! assert!(es.update(1.2));
//! ```

pub mod callback;
mod lifecycle;
mod loss;
mod model;
mod policy;
mod step;

pub use callback::{
    CheckpointEvent, CsvMetricsLogger, EarlyStopEvent, EpochSummary, HookManager,
    LearningRateMonitor, LifecycleHook, LoggingHook, LrRecord, StageContext, StepContext,
};
pub use lifecycle::{
    EpochReport, FinishReason, FitResult, LifecycleController, LifecycleState, TestReport,
};
pub use loss::{LossBreakdown, LossMeter};
pub use model::DetectionModel;
pub use policy::{CheckpointDecision, CheckpointPolicy, EarlyStopping, EarlyStoppingState};
pub use step::StepExecutor;
