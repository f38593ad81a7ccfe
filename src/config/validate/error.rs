//! Validation error types

/// Validation error type
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{stage} record source does not exist: {path}")]
    SourceNotFound { stage: &'static str, path: String },

    #[error("Image root does not exist: {0}")]
    ImageRootNotFound(String),

    #[error("Invalid {stage} batch size: {size} (must be > 0)")]
    InvalidBatchSize { stage: &'static str, size: usize },

    #[error("Invalid prefetch factor: {0} (must be > 0)")]
    InvalidPrefetchFactor(usize),

    #[error("Invalid max epochs: {0} (must be > 0)")]
    InvalidEpochs(usize),

    #[error("Invalid gradient clip value: {0} (must be > 0.0)")]
    InvalidGradClip(f32),

    #[error("Invalid step log interval: {0} (must be > 0)")]
    InvalidLogInterval(usize),

    #[error("Invalid early stopping min_delta: {0} (must be >= 0.0)")]
    InvalidMinDelta(f32),

    #[error("Invalid {stage} augmentation: {message}")]
    InvalidAugmentation { stage: &'static str, message: String },

    #[error("At least one IoU type must be evaluated")]
    EmptyIouTypes,
}

impl From<ValidationError> for crate::Error {
    fn from(err: ValidationError) -> Self {
        crate::Error::Configuration(err.to_string())
    }
}
