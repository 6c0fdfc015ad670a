use crate::error::Result;
use crate::math::tensor::Tensor;

/// Plain gradient descent: `w -= lr * grad`.
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }

    /// Applies one update to every tensor in `params` from the matching
    /// entry in `grads`, scaled by `grad_scale` first.
    pub fn step(&self, params: &mut [Tensor], grads: &[Tensor], grad_scale: f64) -> Result<()> {
        for (param, grad) in params.iter_mut().zip(grads) {
            param.add_scaled(grad, -self.learning_rate * grad_scale)?;
        }
        Ok(())
    }
}
