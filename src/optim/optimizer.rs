//! Optimizer trait and parameter binding

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Parameter;
use crate::error::{Error, Result};

/// Serializable optimizer state, stored in checkpoints
///
/// `slots` maps a buffer name (for example `exp_avg`) to the per-parameter
/// buffers, keyed by parameter name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OptimizerState {
    pub kind: String,
    pub lr: f32,
    pub step_count: u64,
    pub slots: BTreeMap<String, BTreeMap<String, Vec<f32>>>,
}

/// Names of the parameters an optimizer updates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBinding {
    names: Vec<String>,
}

impl ParameterBinding {
    /// Bind every parameter with `requires_grad`
    pub fn bind(params: &[Parameter]) -> Result<Self> {
        let names: Vec<String> =
            params.iter().filter(|p| p.requires_grad).map(|p| p.name.clone()).collect();
        if names.is_empty() {
            return Err(Error::optimization("model has no trainable parameters"));
        }
        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Bound parameters of `params`, failing if any of them has been frozen
    pub fn select<'a>(&self, params: &'a mut [Parameter]) -> Result<Vec<&'a mut Parameter>> {
        let mut selected = Vec::with_capacity(self.names.len());
        for param in params.iter_mut() {
            if !self.contains(&param.name) {
                continue;
            }
            if !param.requires_grad {
                return Err(Error::optimization(format!(
                    "parameter '{}' was frozen after the optimizer was built",
                    param.name
                )));
            }
            selected.push(param);
        }
        Ok(selected)
    }
}

/// Trait for optimization algorithms
pub trait Optimizer: Send {
    /// Short kind name (`sgd`, `adam`, `adamw`)
    fn name(&self) -> &'static str;

    /// Update every bound parameter that carries a gradient
    fn step(&mut self, params: &mut [Parameter]) -> Result<()>;

    /// Zero out all gradients
    fn zero_grad(&self, params: &mut [Parameter]) {
        for param in params {
            param.zero_grad();
        }
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);

    /// Parameters this optimizer was built for
    fn binding(&self) -> &ParameterBinding;

    /// Snapshot of step count, learning rate and buffers
    fn state(&self) -> OptimizerState;

    /// Restore a snapshot taken from an optimizer of the same kind
    fn load_state(&mut self, state: OptimizerState) -> Result<()>;
}

/// Reject a state snapshot taken from a different optimizer kind
pub(crate) fn check_kind(expected: &str, state: &OptimizerState) -> Result<()> {
    if state.kind != expected {
        return Err(Error::optimization(format!(
            "cannot load {} optimizer state into {expected}",
            state.kind
        )));
    }
    Ok(())
}
