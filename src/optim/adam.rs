//! Adam (adaptive moment estimation).
//!
//! ```text
//! mean     = β1·mean + (1-β1)·grad
//! variance = β2·variance + (1-β2)·grad²
//! meanHat  = mean / (1 - β1^t)
//! varHat   = variance / (1 - β2^t)
//! param   -= η · meanHat / (sqrt(varHat) + ε)
//! ```
//!
//! `t` is 1-indexed. The moment estimates are owned by exactly one parameter
//! group and are only touched by that group's update, so separate layers can
//! step concurrently.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::tensor::Tensor;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        AdamConfig {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }
}

impl AdamConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, beta) in [("beta1", self.beta1), ("beta2", self.beta2)] {
            if !(beta.is_finite() && (0.0..1.0).contains(&beta)) {
                return Err(Error::InvalidConfig(format!(
                    "adam {name} must be finite and in [0,1), got {beta}"
                )));
            }
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "adam epsilon must be finite and > 0, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// First and second moment estimates for one list of parameter tensors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdamState {
    mean: Vec<Tensor>,
    variance: Vec<Tensor>,
}

impl AdamState {
    /// Zeroed moments shaped like `params`.
    pub fn zeros_like(params: &[Tensor]) -> AdamState {
        AdamState {
            mean: params.iter().map(Tensor::zeros_like).collect(),
            variance: params.iter().map(Tensor::zeros_like).collect(),
        }
    }

    pub fn mean(&self) -> &[Tensor] {
        &self.mean
    }

    pub fn variance(&self) -> &[Tensor] {
        &self.variance
    }

    pub fn reset(&mut self) {
        self.mean.iter_mut().for_each(|m| m.fill(0.0));
        self.variance.iter_mut().for_each(|v| v.fill(0.0));
    }

    /// Applies one Adam step to `params` in place.
    ///
    /// `grad_scale` multiplies every gradient before it enters the moments
    /// (used to average an accumulated minibatch).
    pub fn step(
        &mut self,
        params: &mut [Tensor],
        grads: &[Tensor],
        t: usize,
        learning_rate: f64,
        config: &AdamConfig,
        grad_scale: f64,
    ) -> Result<()> {
        if params.len() != grads.len() || params.len() != self.mean.len() {
            return Err(Error::InvalidConfig(format!(
                "adam state tracks {} tensors, got {} parameters and {} gradients",
                self.mean.len(),
                params.len(),
                grads.len()
            )));
        }

        let t = t.max(1) as f64;
        let mean_correction = 1.0 - config.beta1.powf(t);
        let variance_correction = 1.0 - config.beta2.powf(t);

        let moments = self.mean.iter_mut().zip(self.variance.iter_mut());
        for ((param, grad), (mean, variance)) in params.iter_mut().zip(grads).zip(moments) {
            if param.shape() != grad.shape() || param.shape() != mean.shape() {
                return Err(Error::ShapeMismatch {
                    op: "adam step",
                    left: param.shape(),
                    right: grad.shape(),
                });
            }
            let values = param.as_mut_slice().iter_mut();
            let state = mean.as_mut_slice().iter_mut().zip(variance.as_mut_slice().iter_mut());
            for ((w, &g), (m, v)) in values.zip(grad.as_slice()).zip(state) {
                let g = g * grad_scale;
                *m = config.beta1 * *m + (1.0 - config.beta1) * g;
                *v = config.beta2 * *v + (1.0 - config.beta2) * g * g;
                let m_hat = *m / mean_correction;
                let v_hat = *v / variance_correction;
                *w -= learning_rate * m_hat / (v_hat.sqrt() + config.epsilon);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn single(value: f64) -> Vec<Tensor> {
        vec![Tensor::vector(vec![value])]
    }

    #[test]
    fn defaults() {
        let config = AdamConfig::default();
        assert_eq!(config.beta1, 0.9);
        assert_eq!(config.beta2, 0.999);
        assert_eq!(config.epsilon, 1e-7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let bad_beta = AdamConfig { beta1: 1.0, ..AdamConfig::default() };
        assert!(bad_beta.validate().is_err());
        let bad_eps = AdamConfig { epsilon: 0.0, ..AdamConfig::default() };
        assert!(bad_eps.validate().is_err());
    }

    #[test]
    fn first_step_moves_by_learning_rate() {
        // With bias correction, step one is lr * g / (|g| + eps).
        let mut params = single(1.0);
        let grads = single(0.5);
        let mut state = AdamState::zeros_like(&params);
        state.step(&mut params, &grads, 1, 0.01, &AdamConfig::default(), 1.0).unwrap();
        assert_relative_eq!(params[0][0], 1.0 - 0.01 * 0.5 / (0.5 + 1e-7), epsilon = 1e-12);
        assert_relative_eq!(state.mean()[0][0], 0.05, epsilon = 1e-12);
        assert_relative_eq!(state.variance()[0][0], 0.00025, epsilon = 1e-12);
    }

    #[test]
    fn zero_gradient_at_first_step_is_finite() {
        let mut params = single(2.0);
        let mut state = AdamState::zeros_like(&params);
        state.step(&mut params, &single(0.0), 1, 0.1, &AdamConfig::default(), 1.0).unwrap();
        assert_eq!(params[0][0], 2.0);
        assert!(params[0][0].is_finite());
    }

    #[test]
    fn effective_step_shrinks_under_a_fixed_gradient() {
        let config = AdamConfig::default();
        let mut params = single(0.0);
        let mut state = AdamState::zeros_like(&params);
        let grads = single(1.0);

        let mut previous_step = f64::INFINITY;
        for t in 1..=50 {
            let before = params[0][0];
            state.step(&mut params, &grads, t, 0.001, &config, 1.0).unwrap();
            let step = (before - params[0][0]).abs();
            assert!(step <= previous_step + 1e-15, "step grew at t={t}");
            previous_step = step;
        }
    }

    #[test]
    fn gradient_scale_averages_before_the_moments() {
        let mut a = single(1.0);
        let mut b = single(1.0);
        let mut sa = AdamState::zeros_like(&a);
        let mut sb = AdamState::zeros_like(&b);
        sa.step(&mut a, &single(4.0), 1, 0.1, &AdamConfig::default(), 0.25).unwrap();
        sb.step(&mut b, &single(1.0), 1, 0.1, &AdamConfig::default(), 1.0).unwrap();
        assert_relative_eq!(a[0][0], b[0][0], epsilon = 1e-12);
        assert_eq!(sa, sb);
    }

    #[test]
    fn rejects_mismatched_lists() {
        let mut params = single(1.0);
        let mut state = AdamState::zeros_like(&params);
        let grads = vec![Tensor::vector(vec![1.0]), Tensor::vector(vec![1.0])];
        assert!(state.step(&mut params, &grads, 1, 0.1, &AdamConfig::default(), 1.0).is_err());
    }
}
