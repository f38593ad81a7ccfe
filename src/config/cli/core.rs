//! Core CLI types - Cli, Command, and argument structs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::types::OutputFormat;

/// Detectar: object-detection training and evaluation lifecycle
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "detectar")]
#[command(author = "PAIML")]
#[command(version)]
#[command(about = "Object-detection training lifecycle: staging, batching, COCO evaluation")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Validate a configuration file
    Validate(ValidateArgs),

    /// Display the resolved configuration
    Info(InfoArgs),

    /// Stage the record sources and report split sizes
    Stage(StageArgs),

    /// Evaluate a detections CSV against a ground-truth record source
    Evaluate(EvaluateArgs),
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Also check that the record sources exist
    #[arg(long)]
    pub check_sources: bool,
}

/// Arguments for the info command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InfoArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the stage command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct StageArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

/// Arguments for the evaluate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct EvaluateArgs {
    /// Ground-truth CSV (filename,xmin,ymin,xmax,ymax,labels)
    #[arg(long, value_name = "CSV")]
    pub ground_truth: PathBuf,

    /// Detections CSV (filename,xmin,ymin,xmax,ymax,labels,scores)
    #[arg(long, value_name = "CSV")]
    pub detections: PathBuf,

    /// Drop detections scoring below this before evaluation
    #[arg(long)]
    pub score_threshold: Option<f32>,

    /// Apply per-class non-maximum suppression at this IoU
    #[arg(long)]
    pub nms_iou: Option<f32>,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Parse CLI arguments from an iterator (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}
