//! Build the optimizer and learning-rate schedule from configuration

use tracing::info;

use super::driver::{SchedulerCadence, SchedulerDriver};
use super::scheduler::{
    ConstantLR, CosineAnnealingLR, ExponentialLR, LRScheduler, LinearWarmupLR, MultiStepLR,
    StepDecayLR,
};
use super::{Adam, Optimizer, Parameter, SGD};
use crate::config::{HyperparameterConfig, OptimizerSpec, SchedulerKind, SchedulerSpec};
use crate::error::{Error, Result};

/// Optimizer bound to the trainable parameters, plus its schedule
pub struct OptimizationSetup {
    pub optimizer: Box<dyn Optimizer>,
    pub scheduler: SchedulerDriver,
}

fn positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::optimization(format!("{name} must be > 0, got {value}")))
    }
}

fn non_negative(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::optimization(format!("{name} must be >= 0, got {value}")))
    }
}

fn non_zero(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(Error::optimization(format!("{name} must be > 0")));
    }
    Ok(())
}

/// Build optimizer from configuration, bound to every parameter with `requires_grad`
pub fn build_optimizer(spec: &OptimizerSpec, params: &[Parameter]) -> Result<Box<dyn Optimizer>> {
    positive("learning rate", spec.lr())?;
    match *spec {
        OptimizerSpec::Sgd(p) => {
            non_negative("momentum", p.momentum)?;
            non_negative("weight_decay", p.weight_decay)?;
            Ok(Box::new(SGD::new(params, p.lr, p.momentum, p.weight_decay, p.nesterov)?))
        }
        OptimizerSpec::Adam(p) => {
            non_negative("weight_decay", p.weight_decay)?;
            Ok(Box::new(Adam::new(params, p.lr, p.betas, p.eps, p.weight_decay)?))
        }
        OptimizerSpec::AdamW(p) => {
            non_negative("weight_decay", p.weight_decay)?;
            Ok(Box::new(Adam::adamw(params, p.lr, p.betas, p.eps, p.weight_decay)?))
        }
    }
}

/// Build a schedule starting from `lr`
pub fn build_scheduler(spec: &SchedulerSpec, lr: f32) -> Result<SchedulerDriver> {
    non_zero("scheduler frequency", spec.frequency)?;
    let scheduler: Box<dyn LRScheduler> = match &spec.kind {
        SchedulerKind::Constant => Box::new(ConstantLR::new(lr)),
        SchedulerKind::Step { step_size, gamma } => {
            non_zero("step_size", *step_size)?;
            positive("gamma", *gamma)?;
            Box::new(StepDecayLR::new(lr, *step_size, *gamma))
        }
        SchedulerKind::MultiStep { milestones, gamma } => {
            positive("gamma", *gamma)?;
            Box::new(MultiStepLR::new(lr, milestones.clone(), *gamma))
        }
        SchedulerKind::Exponential { gamma } => {
            positive("gamma", *gamma)?;
            Box::new(ExponentialLR::new(lr, *gamma))
        }
        SchedulerKind::Cosine { t_max, eta_min } => {
            non_zero("t_max", *t_max)?;
            non_negative("eta_min", *eta_min)?;
            Box::new(CosineAnnealingLR::new(lr, *t_max, *eta_min))
        }
        SchedulerKind::LinearWarmup { warmup_steps } => {
            non_zero("warmup_steps", *warmup_steps)?;
            Box::new(LinearWarmupLR::new(lr, *warmup_steps))
        }
    };
    let cadence = SchedulerCadence { interval: spec.interval, frequency: spec.frequency };
    Ok(SchedulerDriver::new(scheduler, cadence))
}

/// Builds the optimization stack consumed by the train step
pub struct OptimizationConfigurator;

impl OptimizationConfigurator {
    /// One optimizer over the trainable parameters and one schedule wrapping it
    pub fn configure(config: &HyperparameterConfig, params: &[Parameter]) -> Result<OptimizationSetup> {
        let mut optimizer = build_optimizer(&config.optimizer, params)?;
        let scheduler = build_scheduler(&config.scheduler, config.optimizer.lr())?;
        // schedules such as linear warmup start below the base rate
        optimizer.set_lr(scheduler.lr());

        info!(
            optimizer = optimizer.name(),
            lr = optimizer.lr(),
            trainable = optimizer.binding().len(),
            frozen = params.len() - optimizer.binding().len(),
            scheduler = config.scheduler.kind.name(),
            interval = ?config.scheduler.interval,
            frequency = config.scheduler.frequency,
            "optimization configured"
        );

        Ok(OptimizationSetup { optimizer, scheduler })
    }
}
