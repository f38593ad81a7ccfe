//! Stage command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::cli::StageArgs;
use crate::config::{load_config, validate_config};
use crate::data::{DatasetSplit, DatasetStager, Stage};

/// One line per split: image count, annotation rows, serialized size
pub fn format_split(split: &DatasetSplit) -> String {
    let stats = split.stats();
    format!(
        "  {:<10} {:>6} images {:>8} boxes {:>8.2} MiB  augmentations: {:?}",
        split.stage().to_string(),
        split.len(),
        stats.rows,
        stats.mebibytes(),
        split.pipeline().describe()
    )
}

pub fn run_stage(args: StageArgs, level: LogLevel) -> Result<(), String> {
    let cfg = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    validate_config(&cfg).map_err(|e| format!("Validation failed: {e}"))?;

    let staged = DatasetStager::new(cfg.data.clone(), cfg.augmentations.clone())
        .stage()
        .map_err(|e| format!("Staging failed: {e}"))?;

    log(level, LogLevel::Normal, "Staged datasets:");
    for stage in [Stage::Train, Stage::Validation, Stage::Test] {
        log(level, LogLevel::Normal, &format_split(staged.split(stage)));
    }
    Ok(())
}
