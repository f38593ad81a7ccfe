//! Configuration validation
//!
//! Checks value ranges of a parsed configuration before anything runs.
//! Optimizer and scheduler parameters are checked when the optimizer is
//! built, since they only become meaningful against the model's parameters.

mod error;
mod validator;


pub use error::ValidationError;
pub use validator::{validate_config, validate_sources};
