//! Stochastic Gradient Descent optimizer

use ndarray::Array1;
use std::collections::{BTreeMap, HashMap};

use super::optimizer::{check_kind, OptimizerState, ParameterBinding};
use super::{Optimizer, Parameter};
use crate::error::{Error, Result};

const MOMENTUM_BUFFER: &str = "momentum_buffer";

/// SGD with optional momentum, Nesterov momentum and L2 weight decay
///
/// Update, per parameter `p` with gradient `g`:
///
/// ```text
/// g = g + weight_decay * p
/// b = momentum * b + g          (b = g on the first step)
/// g = g + momentum * b          (nesterov)   or   g = b
/// p = p - lr * g
/// ```
pub struct SGD {
    lr: f32,
    momentum: f32,
    weight_decay: f32,
    nesterov: bool,
    binding: ParameterBinding,
    velocities: HashMap<String, Array1<f32>>,
    step_count: u64,
}

impl SGD {
    /// Create an SGD optimizer bound to the trainable parameters of `params`
    pub fn new(
        params: &[Parameter],
        lr: f32,
        momentum: f32,
        weight_decay: f32,
        nesterov: bool,
    ) -> Result<Self> {
        if nesterov && momentum <= 0.0 {
            return Err(Error::optimization("nesterov momentum requires momentum > 0"));
        }
        Ok(Self {
            lr,
            momentum,
            weight_decay,
            nesterov,
            binding: ParameterBinding::bind(params)?,
            velocities: HashMap::new(),
            step_count: 0,
        })
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }
}

impl Optimizer for SGD {
    fn name(&self) -> &'static str {
        "sgd"
    }

    fn step(&mut self, params: &mut [Parameter]) -> Result<()> {
        let selected = self.binding.select(params)?;
        self.step_count += 1;

        for param in selected {
            let Some(grad) = param.grad.as_ref() else { continue };
            if grad.len() != param.data.len() {
                return Err(Error::optimization(format!(
                    "gradient of '{}' has {} values, parameter has {}",
                    param.name,
                    grad.len(),
                    param.data.len()
                )));
            }

            let mut update = grad.clone();
            if self.weight_decay != 0.0 {
                update.scaled_add(self.weight_decay, &param.data);
            }

            if self.momentum > 0.0 {
                let buffer = match self.velocities.remove(&param.name) {
                    Some(mut b) => {
                        b *= self.momentum;
                        b += &update;
                        b
                    }
                    None => update.clone(),
                };
                if self.nesterov {
                    update.scaled_add(self.momentum, &buffer);
                } else {
                    update.assign(&buffer);
                }
                self.velocities.insert(param.name.clone(), buffer);
            }

            param.data.scaled_add(-self.lr, &update);
        }
        Ok(())
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn binding(&self) -> &ParameterBinding {
        &self.binding
    }

    fn state(&self) -> OptimizerState {
        let buffers: BTreeMap<String, Vec<f32>> =
            self.velocities.iter().map(|(name, v)| (name.clone(), v.to_vec())).collect();
        let mut slots = BTreeMap::new();
        slots.insert(MOMENTUM_BUFFER.to_string(), buffers);
        OptimizerState { kind: self.name().to_string(), lr: self.lr, step_count: self.step_count, slots }
    }

    fn load_state(&mut self, mut state: OptimizerState) -> Result<()> {
        check_kind(self.name(), &state)?;
        self.lr = state.lr;
        self.step_count = state.step_count;
        self.velocities = state
            .slots
            .remove(MOMENTUM_BUFFER)
            .unwrap_or_default()
            .into_iter()
            .filter(|(name, _)| self.binding.contains(name))
            .map(|(name, v)| (name, Array1::from(v)))
            .collect();
        Ok(())
    }
}
