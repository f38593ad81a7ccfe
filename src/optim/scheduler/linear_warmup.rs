//! Linear ramp from zero to the configured rate

use super::LRScheduler;

/// `lr(n) = base_lr * min(1, n / warmup_steps)`; with no warmup steps the
/// base rate applies from the first batch
pub struct LinearWarmupLR {
    base_lr: f32,
    warmup_steps: usize,
    advances: usize,
}

impl LinearWarmupLR {
    pub fn new(base_lr: f32, warmup_steps: usize) -> Self {
        Self { base_lr, warmup_steps, advances: 0 }
    }
}

impl LRScheduler for LinearWarmupLR {
    fn get_lr(&self) -> f32 {
        match self.warmup_steps {
            0 => self.base_lr,
            n if self.advances >= n => self.base_lr,
            n => self.base_lr * self.advances as f32 / n as f32,
        }
    }

    fn step(&mut self) {
        self.advances += 1;
    }

    fn advances(&self) -> usize {
        self.advances
    }

    fn set_advances(&mut self, advances: usize) {
        self.advances = advances;
    }
}
