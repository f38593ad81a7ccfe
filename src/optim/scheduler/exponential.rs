//! Exponential decay learning rate scheduler

use super::LRScheduler;

/// Formula: lr_t = lr_initial * gamma^t
pub struct ExponentialLR {
    lr_initial: f32,
    gamma: f32,
    current_step: usize,
}

impl ExponentialLR {
    pub fn new(lr_initial: f32, gamma: f32) -> Self {
        Self { lr_initial, gamma, current_step: 0 }
    }
}

impl LRScheduler for ExponentialLR {
    fn get_lr(&self) -> f32 {
        self.lr_initial * self.gamma.powi(self.current_step as i32)
    }

    fn step(&mut self) {
        self.current_step += 1;
    }

    fn advances(&self) -> usize {
        self.current_step
    }

    fn set_advances(&mut self, advances: usize) {
        self.current_step = advances;
    }
}
