//! Gradient clipping utilities

use super::Parameter;

/// Clip gradients by global norm
///
/// Computes the global norm over the gradients of every trainable parameter
/// and scales them down if it exceeds `max_norm`, preserving the relative
/// magnitudes of gradients across parameters.
///
/// Algorithm:
/// 1. global_norm = sqrt(sum of all gradient squared norms)
/// 2. If global_norm > max_norm, every gradient is multiplied by max_norm / global_norm
///
/// Returns the global norm before clipping.
pub fn clip_grad_norm(params: &mut [Parameter], max_norm: f32) -> f32 {
    let total_norm_sq: f32 = params
        .iter()
        .filter(|p| p.requires_grad)
        .filter_map(|p| p.grad.as_ref())
        .map(|g| g.iter().map(|&x| x * x).sum::<f32>())
        .sum();

    let global_norm = total_norm_sq.sqrt();

    if global_norm > max_norm {
        let clip_coef = max_norm / global_norm;
        for grad in params.iter_mut().filter(|p| p.requires_grad).filter_map(|p| p.grad.as_mut()) {
            *grad *= clip_coef;
        }
    }

    global_norm
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    fn with_grad(name: &str, grad: &[f32]) -> Parameter {
        let mut p = Parameter::new(name, arr1(&vec![0.0; grad.len()]));
        p.set_grad(arr1(grad));
        p
    }

    #[test]
    fn test_clip_scales_to_max_norm() {
        let mut params = vec![with_grad("a", &[3.0]), with_grad("b", &[4.0])];
        let norm = clip_grad_norm(&mut params, 1.0);
        assert_abs_diff_eq!(norm, 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(params[0].grad.as_ref().unwrap()[0], 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(params[1].grad.as_ref().unwrap()[0], 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_no_clip_below_threshold() {
        let mut params = vec![with_grad("a", &[0.3, 0.4])];
        let norm = clip_grad_norm(&mut params, 1.0);
        assert_abs_diff_eq!(norm, 0.5, epsilon = 1e-6);
        assert_eq!(params[0].grad, Some(arr1(&[0.3, 0.4])));
    }

    #[test]
    fn test_frozen_gradients_ignored() {
        let mut frozen = with_grad("f", &[100.0]);
        frozen.requires_grad = false;
        let mut params = vec![with_grad("a", &[1.0]), frozen];
        assert_abs_diff_eq!(clip_grad_norm(&mut params, 10.0), 1.0, epsilon = 1e-6);
    }
}
