//! Drives a learning-rate schedule at its configured cadence

use serde::{Deserialize, Serialize};

use super::scheduler::LRScheduler;
use super::Optimizer;
use crate::config::SchedulerInterval;

/// When the schedule advances: every `frequency` train steps or epochs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerCadence {
    pub interval: SchedulerInterval,
    pub frequency: usize,
}

/// Step, epoch and advance counts, persisted with checkpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DriverCounters {
    pub steps: usize,
    pub epochs: usize,
    pub advances: usize,
}

/// Owns a schedule and advances it from the controller's step/epoch events
pub struct SchedulerDriver {
    scheduler: Box<dyn LRScheduler>,
    cadence: SchedulerCadence,
    steps: usize,
    epochs: usize,
}

impl SchedulerDriver {
    pub fn new(scheduler: Box<dyn LRScheduler>, cadence: SchedulerCadence) -> Self {
        Self { scheduler, cadence, steps: 0, epochs: 0 }
    }

    pub fn cadence(&self) -> SchedulerCadence {
        self.cadence
    }

    /// Learning rate the schedule currently prescribes
    pub fn lr(&self) -> f32 {
        self.scheduler.get_lr()
    }

    /// Number of times the schedule has advanced
    pub fn advances(&self) -> usize {
        self.scheduler.advances()
    }

    /// Record one optimizer step; returns whether the schedule advanced
    pub fn on_train_step(&mut self, optimizer: &mut dyn Optimizer) -> bool {
        self.steps += 1;
        self.tick(SchedulerInterval::Step, self.steps, optimizer)
    }

    /// Record the end of a training epoch; returns whether the schedule advanced
    pub fn on_epoch_end(&mut self, optimizer: &mut dyn Optimizer) -> bool {
        self.epochs += 1;
        self.tick(SchedulerInterval::Epoch, self.epochs, optimizer)
    }

    fn tick(&mut self, interval: SchedulerInterval, count: usize, optimizer: &mut dyn Optimizer) -> bool {
        if self.cadence.interval != interval || count % self.cadence.frequency.max(1) != 0 {
            return false;
        }
        self.scheduler.step();
        self.scheduler.apply(optimizer);
        true
    }

    pub fn counters(&self) -> DriverCounters {
        DriverCounters { steps: self.steps, epochs: self.epochs, advances: self.scheduler.advances() }
    }

    /// Restore counters from a checkpoint and re-apply the learning rate
    pub fn restore(&mut self, counters: DriverCounters, optimizer: &mut dyn Optimizer) {
        self.steps = counters.steps;
        self.epochs = counters.epochs;
        self.scheduler.set_advances(counters.advances);
        self.scheduler.apply(optimizer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::{ConstantLR, ExponentialLR, Parameter, SGD};
    use ndarray::arr1;

    fn optimizer() -> SGD {
        SGD::new(&[Parameter::new("w", arr1(&[0.0]))], 1.0, 0.0, 0.0, false).unwrap()
    }

    #[test]
    fn test_epoch_cadence_advances_once_per_epoch() {
        let mut opt = optimizer();
        let cadence = SchedulerCadence { interval: SchedulerInterval::Epoch, frequency: 1 };
        let mut driver = SchedulerDriver::new(Box::new(ConstantLR::new(1.0)), cadence);
        for _ in 0..3 {
            for _ in 0..5 {
                assert!(!driver.on_train_step(&mut opt));
            }
            assert!(driver.on_epoch_end(&mut opt));
        }
        assert_eq!(driver.advances(), 3);
    }

    #[test]
    fn test_step_cadence_every_two_steps() {
        let mut opt = optimizer();
        let cadence = SchedulerCadence { interval: SchedulerInterval::Step, frequency: 2 };
        let mut driver = SchedulerDriver::new(Box::new(ExponentialLR::new(1.0, 0.5)), cadence);
        let fired: Vec<bool> = (0..6).map(|_| driver.on_train_step(&mut opt)).collect();
        assert_eq!(fired, vec![false, true, false, true, false, true]);
        assert!(!driver.on_epoch_end(&mut opt));
        assert_eq!(driver.advances(), 3);
        assert_eq!(opt.lr(), 0.125);
    }

    #[test]
    fn test_restore_counters() {
        let mut opt = optimizer();
        let cadence = SchedulerCadence { interval: SchedulerInterval::Epoch, frequency: 1 };
        let mut driver = SchedulerDriver::new(Box::new(ExponentialLR::new(1.0, 0.5)), cadence);
        driver.restore(DriverCounters { steps: 10, epochs: 2, advances: 2 }, &mut opt);
        assert_eq!(driver.counters().steps, 10);
        assert_eq!(opt.lr(), 0.25);
    }
}
