//! Hook system for lifecycle events
//!
//! Hooks observe the controller at fixed points:
//! - `on_stage_start` on entry into training and into testing
//! - `on_train_step_end` after every optimizer step
//! - `on_epoch_end` after every validation
//! - `on_checkpoint_saved` / `on_early_stop` when a policy acts
//!
//! # Example
//!
//! ```rust
//! use detectar::train::callback::{EpochSummary, LifecycleHook};
//!
//! struct PrintHook;
//!
//! impl LifecycleHook for PrintHook {
//!     fn on_epoch_end(&mut self, summary: &EpochSummary) {
//!         println!("Epoch {} finished with val loss {:.4}", summary.epoch, summary.validation.total());
//!     }
//! }
//! ```

mod csv_logger;
mod logging;
mod lr_monitor;
mod manager;
mod traits;

pub use csv_logger::CsvMetricsLogger;
pub use logging::LoggingHook;
pub use lr_monitor::{LearningRateMonitor, LrRecord};
pub use manager::HookManager;
pub use traits::{
    CheckpointEvent, EarlyStopEvent, EpochSummary, LifecycleHook, StageContext, StepContext,
};
