//! Error types for the detection training lifecycle
//!
//! Every failure in the core is fatal for the operation that raised it.
//! Nothing is retried in-process; recovery means restarting from the last
//! checkpoint that was written successfully.

use std::path::PathBuf;

use crate::data::ImageId;

/// Errors raised by staging, stepping, evaluation and lifecycle control
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad or missing configuration, or an unreadable/empty record source
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed batch (empty, or images/targets/ids of different lengths)
    #[error("Batch shape error: {0}")]
    BatchShape(String),

    /// The accumulator already holds results for this image
    #[error("Duplicate image id {0} passed to the evaluation accumulator")]
    DuplicateImage(ImageId),

    /// The accumulator has no ground truth for this image
    #[error("Image id {0} has no ground truth in the evaluation set")]
    UnknownImage(ImageId),

    /// A data-loading worker stopped without delivering its batch
    #[error("Data-loading worker failed: {0}")]
    Worker(String),

    /// Optimizer or scheduler could not be built or applied
    #[error("Optimization error: {0}")]
    Optimization(String),

    /// A loss component was negative or not finite
    #[error("Invalid loss component {component}: {value}")]
    InvalidLoss {
        /// Component name
        component: &'static str,
        /// Offending value
        value: f32,
    },

    /// The accumulator was used out of order (update after accumulate, ...)
    #[error("Evaluation state error: {0}")]
    EvaluationState(String),

    /// The lifecycle controller was asked for a transition its state forbids
    #[error("Cannot {action} while in state {from}")]
    InvalidTransition {
        /// State the controller was in
        from: String,
        /// Requested operation
        action: &'static str,
    },

    /// Checkpoint could not be written or read back
    #[error("Checkpoint error at {path}: {message}")]
    Checkpoint {
        /// Checkpoint file
        path: PathBuf,
        /// Underlying cause
        message: String,
    },

    /// Filesystem failure outside checkpointing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for the crate
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for [`Error::Configuration`]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Shorthand for [`Error::BatchShape`]
    pub fn batch_shape(msg: impl Into<String>) -> Self {
        Self::BatchShape(msg.into())
    }

    /// Shorthand for [`Error::Optimization`]
    pub fn optimization(msg: impl Into<String>) -> Self {
        Self::Optimization(msg.into())
    }

    pub(crate) fn checkpoint(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Checkpoint { path: path.into(), message: message.to_string() }
    }
}
