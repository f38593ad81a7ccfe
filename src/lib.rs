//! # Detectar: object-detection training lifecycle
//!
//! Detectar drives a detection model through a declarative training and
//! evaluation lifecycle:
//!
//! - **config**: YAML hyperparameter schema, validation and CLI parsing
//! - **data**: CSV record sources, augmentation, collation and prefetching loaders
//! - **optim**: SGD/Adam/AdamW, gradient clipping and learning-rate schedules
//! - **train**: step executor, checkpoint/early-stopping policies, hooks and the
//!   lifecycle controller
//! - **eval**: COCO-style AP/AR accumulation and inference post-processing
//! - **io**: atomic JSON checkpoints
//!
//! The network itself lives behind [`train::DetectionModel`].

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod eval;
pub mod io;
pub mod optim;
pub mod train;

pub use error::{Error, Result};
