//! Loading configuration from YAML

use super::schema::HyperparameterConfig;
use super::validate::validate_config;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Parse and validate a YAML document
pub fn parse_config(yaml: &str) -> Result<HyperparameterConfig> {
    let cfg: HyperparameterConfig = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse YAML config: {e}")))?;

    validate_config(&cfg).map_err(|e| Error::config(format!("Invalid config: {e}")))?;

    Ok(cfg)
}

/// Load a configuration file (without staging any data)
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<HyperparameterConfig> {
    let yaml_content = fs::read_to_string(config_path.as_ref()).map_err(|e| {
        Error::config(format!(
            "Failed to read config file {}: {}",
            config_path.as_ref().display(),
            e
        ))
    })?;

    parse_config(&yaml_content)
}
