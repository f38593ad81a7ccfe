//! Checkpoint persistence

mod checkpoint;

pub use checkpoint::{
    load_checkpoint, save_checkpoint, Checkpoint, ParameterSnapshot, PolicySnapshot,
};
