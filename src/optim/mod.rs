//! Optimizers, gradient clipping and learning-rate schedules

mod adam;
mod clip;
mod configurator;
mod driver;
mod optimizer;
mod parameter;
mod scheduler;
mod sgd;

pub use adam::Adam;
pub use clip::clip_grad_norm;
pub use configurator::{build_optimizer, build_scheduler, OptimizationConfigurator, OptimizationSetup};
pub use driver::{DriverCounters, SchedulerCadence, SchedulerDriver};
pub use optimizer::{Optimizer, OptimizerState, ParameterBinding};
pub use parameter::Parameter;
pub use scheduler::{
    ConstantLR, CosineAnnealingLR, ExponentialLR, LRScheduler, LinearWarmupLR, MultiStepLR,
    StepDecayLR,
};
pub use sgd::SGD;
