//! Cosine annealing over a fixed number of advances

use std::f32::consts::PI;

use super::LRScheduler;

/// Half-cosine from `base_lr` down to `eta_min` over `t_max` advances,
/// then flat at `eta_min`
///
/// `lr(n) = eta_min + (base_lr - eta_min) * (1 + cos(pi * n / t_max)) / 2`
pub struct CosineAnnealingLR {
    base_lr: f32,
    eta_min: f32,
    t_max: usize,
    advances: usize,
}

impl CosineAnnealingLR {
    pub fn new(base_lr: f32, t_max: usize, eta_min: f32) -> Self {
        Self { base_lr, eta_min, t_max, advances: 0 }
    }
}

impl LRScheduler for CosineAnnealingLR {
    fn get_lr(&self) -> f32 {
        if self.advances >= self.t_max {
            return self.eta_min;
        }
        let phase = PI * self.advances as f32 / self.t_max as f32;
        self.eta_min + (self.base_lr - self.eta_min) * (1.0 + phase.cos()) / 2.0
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
