//! Named trainable parameters

use ndarray::Array1;

/// A flat parameter vector owned by a model
///
/// Optimizers bind parameters by name when they are built; the name is the
/// key their per-parameter state is stored under and the key checkpoints use.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub data: Array1<f32>,
    pub grad: Option<Array1<f32>>,
    pub requires_grad: bool,
}

impl Parameter {
    /// Trainable parameter
    pub fn new(name: impl Into<String>, data: Array1<f32>) -> Self {
        Self { name: name.into(), data, grad: None, requires_grad: true }
    }

    /// Parameter excluded from optimization
    pub fn frozen(name: impl Into<String>, data: Array1<f32>) -> Self {
        Self { requires_grad: false, ..Self::new(name, data) }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn set_grad(&mut self, grad: Array1<f32>) {
        self.grad = Some(grad);
    }

    /// Accumulate into the existing gradient
    pub fn accumulate_grad(&mut self, grad: &Array1<f32>) {
        match &mut self.grad {
            Some(existing) => *existing += grad,
            None => self.grad = Some(grad.clone()),
        }
    }

    pub fn zero_grad(&mut self) {
        self.grad = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_frozen_parameter() {
        let p = Parameter::frozen("backbone.w", arr1(&[1.0, 2.0]));
        assert!(!p.requires_grad);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_accumulate_grad() {
        let mut p = Parameter::new("w", arr1(&[0.0, 0.0]));
        p.accumulate_grad(&arr1(&[1.0, 2.0]));
        p.accumulate_grad(&arr1(&[0.5, 0.5]));
        assert_eq!(p.grad, Some(arr1(&[1.5, 2.5])));
        p.zero_grad();
        assert!(p.grad.is_none());
    }
}
