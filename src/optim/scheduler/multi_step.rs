//! Multi-step decay learning rate scheduler

use super::LRScheduler;

/// Multiplies the learning rate by gamma once each milestone is reached
///
/// Formula: lr_t = lr_initial * gamma^(number of milestones <= t)
pub struct MultiStepLR {
    lr_initial: f32,
    gamma: f32,
    milestones: Vec<usize>,
    current_step: usize,
}

impl MultiStepLR {
    pub fn new(lr_initial: f32, mut milestones: Vec<usize>, gamma: f32) -> Self {
        milestones.sort_unstable();
        Self { lr_initial, gamma, milestones, current_step: 0 }
    }
}

impl LRScheduler for MultiStepLR {
    fn get_lr(&self) -> f32 {
        let passed = self.milestones.partition_point(|&m| m <= self.current_step);
        self.lr_initial * self.gamma.powi(passed as i32)
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
