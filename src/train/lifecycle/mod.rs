//! Lifecycle control: state machine, controller and reports

mod controller;
mod result;
mod state;

pub use controller::LifecycleController;
pub use result::{EpochReport, FitResult, TestReport};
pub use state::{FinishReason, LifecycleState};
