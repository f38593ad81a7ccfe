//! Configuration validation logic

use super::error::ValidationError;
use crate::config::schema::HyperparameterConfig;
use crate::data::TransformSpec;

fn check_augmentations(stage: &'static str, specs: &[TransformSpec]) -> Result<(), ValidationError> {
    for spec in specs {
        spec.validate().map_err(|e| ValidationError::InvalidAugmentation {
            stage,
            message: e.to_string(),
        })?;
    }
    Ok(())
}

/// Validate value ranges of a configuration
///
/// Checks:
/// - Batch sizes, prefetch factor, epoch budget and log interval are non-zero
/// - Gradient clip is positive and early stopping `min_delta` non-negative
/// - Augmentation parameters are usable
/// - At least one IoU type is requested
pub fn validate_config(cfg: &HyperparameterConfig) -> Result<(), ValidationError> {
    for (stage, size) in
        [("train", cfg.batch_size.train), ("valid", cfg.batch_size.valid), ("test", cfg.batch_size.test)]
    {
        if size == 0 {
            return Err(ValidationError::InvalidBatchSize { stage, size });
        }
    }

    if cfg.dataloader.prefetch_factor == 0 {
        return Err(ValidationError::InvalidPrefetchFactor(0));
    }

    if cfg.trainer.max_epochs == 0 {
        return Err(ValidationError::InvalidEpochs(0));
    }

    if let Some(grad_clip) = cfg.trainer.grad_clip {
        if !(grad_clip > 0.0) {
            return Err(ValidationError::InvalidGradClip(grad_clip));
        }
    }

    if cfg.trainer.log_every_n_steps == 0 {
        return Err(ValidationError::InvalidLogInterval(0));
    }

    if let Some(es) = &cfg.early_stopping {
        if !(es.min_delta >= 0.0) {
            return Err(ValidationError::InvalidMinDelta(es.min_delta));
        }
    }

    check_augmentations("train", &cfg.augmentations.train)?;
    check_augmentations("valid", &cfg.augmentations.valid)?;
    check_augmentations("test", &cfg.augmentations.test)?;

    if cfg.iou_types.is_empty() {
        return Err(ValidationError::EmptyIouTypes);
    }

    Ok(())
}

/// Check that every record source (and the image root, if set) exists
pub fn validate_sources(cfg: &HyperparameterConfig) -> Result<(), ValidationError> {
    for (stage, path) in [
        ("train", &cfg.data.train_csv),
        ("valid", &cfg.data.valid_csv),
        ("test", &cfg.data.test_csv),
    ] {
        if !path.exists() {
            return Err(ValidationError::SourceNotFound { stage, path: path.display().to_string() });
        }
    }
    if let Some(root) = &cfg.data.image_root {
        if !root.is_dir() {
            return Err(ValidationError::ImageRootNotFound(root.display().to_string()));
        }
    }
    Ok(())
}
