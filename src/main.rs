//! Detectar CLI
//!
//! # Usage
//!
//! ```bash
//! # Validate config (and check that the record sources exist)
//! detectar validate config.yaml --check-sources
//!
//! # Show config info
//! detectar info config.yaml --format yaml
//!
//! # Stage the datasets and report split sizes
//! detectar stage config.yaml
//!
//! # Offline COCO evaluation of a detections CSV
//! detectar evaluate --ground-truth test.csv --detections predictions.csv --score-threshold 0.05
//! ```

use clap::Parser;
use detectar::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
