//! Learning rate schedulers
//!
//! Provides learning rate scheduling strategies for training:
//! - `ConstantLR` - Keeps the initial rate
//! - `StepDecayLR` - Step decay by factor every N advances
//! - `MultiStepLR` - Decay by factor at each milestone
//! - `ExponentialLR` - Decay by factor every advance
//! - `CosineAnnealingLR` - Smooth cosine decay
//! - `LinearWarmupLR` - Linear warmup from 0 to target
//!
//! A scheduler only counts advances. Whether an advance happens per train
//! step or per epoch is decided by [`crate::optim::SchedulerDriver`].

mod constant;
mod cosine_annealing;
mod exponential;
mod linear_warmup;
mod multi_step;
mod step_decay;


pub use constant::ConstantLR;
pub use cosine_annealing::CosineAnnealingLR;
pub use exponential::ExponentialLR;
pub use linear_warmup::LinearWarmupLR;
pub use multi_step::MultiStepLR;
pub use step_decay::StepDecayLR;

use super::Optimizer;

/// Learning rate scheduler trait
pub trait LRScheduler: Send {
    /// Get the current learning rate
    fn get_lr(&self) -> f32;

    /// Advance the schedule by one
    fn step(&mut self);

    /// Advances taken so far
    fn advances(&self) -> usize;

    /// Jump to `advances` (for checkpoint resume)
    fn set_advances(&mut self, advances: usize);

    /// Apply the current learning rate to an optimizer
    fn apply(&self, optimizer: &mut dyn Optimizer) {
        optimizer.set_lr(self.get_lr());
    }
}
