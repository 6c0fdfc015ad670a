use crate::error::Result;
use crate::loss::check_lengths;
use crate::loss::loss_type::Loss;
use crate::math::tensor::Tensor;

/// Categorical cross-entropy for use after a Softmax layer.
///
/// The gradient is taken with respect to the probabilities, not the logits;
/// `SoftmaxLayer::backward` applies its own Jacobian.
pub struct CrossEntropyLoss;

/// Probabilities are clamped to `[EPS, 1]` so `ln` and the division stay finite.
const EPS: f64 = 1e-12;

impl Loss for CrossEntropyLoss {
    /// L = -Σ expected[i] · ln(predicted[i])
    fn loss(&self, predicted: &Tensor, expected: &Tensor) -> Result<f64> {
        check_lengths(predicted, expected)?;
        Ok(predicted.as_slice().iter().zip(expected.as_slice())
            .map(|(p, y)| -y * p.clamp(EPS, 1.0).ln())
            .sum())
    }

    /// ∂L/∂p_i = -expected[i] / predicted[i]
    fn gradient(&self, predicted: &Tensor, expected: &Tensor) -> Result<Tensor> {
        check_lengths(predicted, expected)?;
        let data = predicted.as_slice().iter().zip(expected.as_slice())
            .map(|(p, y)| -y / p.clamp(EPS, 1.0))
            .collect();
        Ok(Tensor::vector(data))
    }
}
