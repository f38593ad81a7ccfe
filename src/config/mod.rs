//! Declarative configuration: YAML schema, validation and CLI

pub mod cli;
mod loader;
mod schema;
mod validate;

pub use loader::{load_config, parse_config};
pub use schema::{
    AdamParams, AugmentationConfig, BatchSizes, CheckpointConfig, DataConfig, DataLoaderConfig,
    EarlyStoppingConfig, HyperparameterConfig, IouType, MonitorMode, MonitoredMetric,
    OptimizerSpec, SchedulerInterval, SchedulerKind, SchedulerSpec, SgdParams, TrainerConfig,
};
pub use validate::{validate_config, validate_sources, ValidationError};
