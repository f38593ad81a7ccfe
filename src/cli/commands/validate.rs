//! Validate command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::cli::ValidateArgs;
use crate::config::{load_config, validate_config, validate_sources, HyperparameterConfig};

/// Format data configuration as a string
pub fn format_data_info(cfg: &HyperparameterConfig) -> String {
    let mut lines = vec![
        format!("  Train source: {}", cfg.data.train_csv.display()),
        format!("  Validation source: {}", cfg.data.valid_csv.display()),
        format!("  Test source: {}", cfg.data.test_csv.display()),
    ];
    if let Some(root) = &cfg.data.image_root {
        lines.push(format!("  Image root: {}", root.display()));
    }
    lines.push(format!(
        "  Batch sizes: train={} valid={} test={}",
        cfg.batch_size.train, cfg.batch_size.valid, cfg.batch_size.test
    ));
    lines.push(format!(
        "  Workers: {} (prefetch {})",
        cfg.dataloader.num_workers, cfg.dataloader.prefetch_factor
    ));
    lines.join("\n")
}

/// Format optimizer and schedule as a string
pub fn format_optimizer_info(cfg: &HyperparameterConfig) -> String {
    [
        format!("  Optimizer: {}", cfg.optimizer.name()),
        format!("  Learning rate: {}", cfg.optimizer.lr()),
        format!(
            "  Scheduler: {} (every {} {:?})",
            cfg.scheduler.kind.name(),
            cfg.scheduler.frequency,
            cfg.scheduler.interval
        ),
    ]
    .join("\n")
}

/// Format trainer and policy settings as a string
pub fn format_training_info(cfg: &HyperparameterConfig) -> String {
    let mut lines = vec![format!("  Epochs: {}", cfg.trainer.max_epochs)];
    if let Some(clip) = cfg.trainer.grad_clip {
        lines.push(format!("  Gradient clipping: {clip}"));
    }
    lines.push(format!(
        "  Checkpoints: {} (monitor {} {:?})",
        cfg.checkpoint.dirpath.display(),
        cfg.checkpoint.monitor.name(),
        cfg.checkpoint.mode
    ));
    if let Some(es) = &cfg.early_stopping {
        lines.push(format!(
            "  Early stopping: {} {:?}, patience {}, min_delta {}",
            es.monitor.name(),
            es.mode,
            es.patience,
            es.min_delta
        ));
    }
    lines.join("\n")
}

/// Print detailed configuration summary
pub fn print_detailed_summary(cfg: &HyperparameterConfig) {
    println!();
    println!("Configuration Summary:");
    println!("{}", format_data_info(cfg));
    println!();
    println!("{}", format_optimizer_info(cfg));
    println!();
    println!("{}", format_training_info(cfg));
}

pub fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(level, LogLevel::Normal, &format!("Validating config: {}", args.config.display()));

    let cfg = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    validate_config(&cfg).map_err(|e| format!("Validation failed: {e}"))?;
    if args.check_sources {
        validate_sources(&cfg).map_err(|e| format!("Validation failed: {e}"))?;
    }

    log(level, LogLevel::Normal, "Configuration is valid");

    if level == LogLevel::Verbose {
        print_detailed_summary(&cfg);
    }

    Ok(())
}
