//! Constant learning rate

use super::LRScheduler;

/// Keeps the initial learning rate; advances are only counted
pub struct ConstantLR {
    lr: f32,
    current_step: usize,
}

impl ConstantLR {
    pub fn new(lr: f32) -> Self {
        Self { lr, current_step: 0 }
    }
}

impl LRScheduler for ConstantLR {
    fn get_lr(&self) -> f32 {
        self.lr
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
