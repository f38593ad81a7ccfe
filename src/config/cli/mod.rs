//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! detectar validate config.yaml --check-sources
//! detectar info config.yaml --format yaml
//! detectar stage config.yaml
//! detectar evaluate --ground-truth test.csv --detections predictions.csv
//! ```

mod core;
mod types;

pub use core::{parse_args, Cli, Command, EvaluateArgs, InfoArgs, StageArgs, ValidateArgs};
pub use types::OutputFormat;
