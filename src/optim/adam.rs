//! Adam and AdamW optimizers

use ndarray::{Array1, Zip};
use std::collections::{BTreeMap, HashMap};

use super::optimizer::{check_kind, OptimizerState, ParameterBinding};
use super::{Optimizer, Parameter};
use crate::error::{Error, Result};

const EXP_AVG: &str = "exp_avg";
const EXP_AVG_SQ: &str = "exp_avg_sq";

/// How weight decay enters the update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WeightDecay {
    /// Added to the gradient (Adam)
    L2,
    /// Applied to the parameters directly (AdamW)
    Decoupled,
}

/// Adam optimizer
///
/// With `decoupled` weight decay this is AdamW:
///
/// Standard Adam with L2: θ_t = θ_{t-1} - lr * m̂_t / (√v̂_t + ε), with g += λ * θ_{t-1}
/// AdamW: θ_t = (1 - lr * λ) * θ_{t-1} - lr * m̂_t / (√v̂_t + ε)
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    decay: WeightDecay,
    t: u64,
    binding: ParameterBinding,
    m: HashMap<String, Array1<f32>>, // First moment
    v: HashMap<String, Array1<f32>>, // Second moment
}

impl Adam {
    /// Adam with L2 weight decay
    pub fn new(
        params: &[Parameter],
        lr: f32,
        betas: (f32, f32),
        epsilon: f32,
        weight_decay: f32,
    ) -> Result<Self> {
        Self::build(params, lr, betas, epsilon, weight_decay, WeightDecay::L2)
    }

    /// AdamW: Adam with decoupled weight decay
    pub fn adamw(
        params: &[Parameter],
        lr: f32,
        betas: (f32, f32),
        epsilon: f32,
        weight_decay: f32,
    ) -> Result<Self> {
        Self::build(params, lr, betas, epsilon, weight_decay, WeightDecay::Decoupled)
    }

    fn build(
        params: &[Parameter],
        lr: f32,
        (beta1, beta2): (f32, f32),
        epsilon: f32,
        weight_decay: f32,
        decay: WeightDecay,
    ) -> Result<Self> {
        for (name, beta) in [("beta1", beta1), ("beta2", beta2)] {
            if !(0.0..1.0).contains(&beta) {
                return Err(Error::optimization(format!("{name} {beta} outside [0, 1)")));
            }
        }
        if !(epsilon > 0.0) {
            return Err(Error::optimization(format!("epsilon {epsilon} must be > 0")));
        }
        Ok(Self {
            lr,
            beta1,
            beta2,
            epsilon,
            weight_decay,
            decay,
            t: 0,
            binding: ParameterBinding::bind(params)?,
            m: HashMap::new(),
            v: HashMap::new(),
        })
    }

    /// Get optimizer step counter.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.t
    }

    /// Get weight decay hyperparameter.
    #[must_use]
    pub fn weight_decay(&self) -> f32 {
        self.weight_decay
    }
}

fn to_slot(buffers: &HashMap<String, Array1<f32>>) -> BTreeMap<String, Vec<f32>> {
    buffers.iter().map(|(name, b)| (name.clone(), b.to_vec())).collect()
}

impl Optimizer for Adam {
    fn name(&self) -> &'static str {
        match self.decay {
            WeightDecay::L2 => "adam",
            WeightDecay::Decoupled => "adamw",
        }
    }

    fn step(&mut self, params: &mut [Parameter]) -> Result<()> {
        let selected = self.binding.select(params)?;
        self.t += 1;

        let bias1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias2 = 1.0 - self.beta2.powi(self.t as i32);

        for param in selected {
            let Some(grad) = param.grad.as_ref() else { continue };
            let n = param.data.len();
            if grad.len() != n {
                return Err(Error::optimization(format!(
                    "gradient of '{}' has {} values, parameter has {n}",
                    param.name,
                    grad.len()
                )));
            }

            let mut g = grad.clone();
            match self.decay {
                WeightDecay::L2 if self.weight_decay != 0.0 => {
                    g.scaled_add(self.weight_decay, &param.data);
                }
                WeightDecay::Decoupled if self.weight_decay != 0.0 => {
                    param.data *= 1.0 - self.lr * self.weight_decay;
                }
                _ => {}
            }

            let m = self.m.entry(param.name.clone()).or_insert_with(|| Array1::zeros(n));
            let v = self.v.entry(param.name.clone()).or_insert_with(|| Array1::zeros(n));
            if m.len() != n || v.len() != n {
                return Err(Error::optimization(format!(
                    "moment buffers of '{}' do not match its size {n}",
                    param.name
                )));
            }

            let (beta1, beta2, lr, eps) = (self.beta1, self.beta2, self.lr, self.epsilon);
            Zip::from(&mut param.data).and(m).and(v).and(&g).for_each(|p, m, v, &g| {
                // m_t = β1 * m_{t-1} + (1 - β1) * g
                *m = beta1 * *m + (1.0 - beta1) * g;
                // v_t = β2 * v_{t-1} + (1 - β2) * g²
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                *p -= lr * m_hat / (v_hat.sqrt() + eps);
            });
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
        let mut slots = BTreeMap::new();
        slots.insert(EXP_AVG.to_string(), to_slot(&self.m));
        slots.insert(EXP_AVG_SQ.to_string(), to_slot(&self.v));
        OptimizerState { kind: self.name().to_string(), lr: self.lr, step_count: self.t, slots }
    }

    fn load_state(&mut self, mut state: OptimizerState) -> Result<()> {
        check_kind(self.name(), &state)?;
        let mut restore = |slot: &str| -> HashMap<String, Array1<f32>> {
            state
                .slots
                .remove(slot)
                .unwrap_or_default()
                .into_iter()
                .filter(|(name, _)| self.binding.contains(name))
                .map(|(name, b)| (name, Array1::from(b)))
                .collect()
        };
        let m = restore(EXP_AVG);
        let v = restore(EXP_AVG_SQ);
        self.m = m;
        self.v = v;
        self.lr = state.lr;
        self.t = state.step_count;
        Ok(())
    }
}
