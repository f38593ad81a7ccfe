//! Info command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::cli::{InfoArgs, OutputFormat};
use crate::config::load_config;

pub fn run_info(args: InfoArgs, level: LogLevel) -> Result<(), String> {
    let cfg = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;

    match args.format {
        OutputFormat::Text => {
            log(level, LogLevel::Normal, "Configuration Info:");
            println!();
            println!("Train source: {}", cfg.data.train_csv.display());
            println!("Optimizer: {} (lr={})", cfg.optimizer.name(), cfg.optimizer.lr());
            println!("Scheduler: {}", cfg.scheduler.kind.name());
            println!("Epochs: {}", cfg.trainer.max_epochs);
            println!(
                "Batch size: train={} valid={} test={}",
                cfg.batch_size.train, cfg.batch_size.valid, cfg.batch_size.test
            );

            if cfg.early_stopping.is_some() {
                println!("Early stopping: enabled");
            }
            if cfg.trainer.resume_from.is_some() {
                println!("Resume: enabled");
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&cfg)
                .map_err(|e| format!("JSON serialization error: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Yaml => {
            let yaml =
                serde_yaml::to_string(&cfg).map_err(|e| format!("YAML serialization error: {e}"))?;
            println!("{yaml}");
        }
    }

    Ok(())
}
