use crate::error::Result;
use crate::loss::check_lengths;
use crate::loss::loss_type::Loss;
use crate::math::tensor::Tensor;

pub struct MseLoss;

impl Loss for MseLoss {
    /// Scalar MSE: mean((predicted - expected)²)
    fn loss(&self, predicted: &Tensor, expected: &Tensor) -> Result<f64> {
        check_lengths(predicted, expected)?;
        let n = predicted.len() as f64;
        Ok(predicted.as_slice().iter().zip(expected.as_slice())
            .map(|(p, y)| (p - y).powi(2))
            .sum::<f64>() / n)
    }

    /// Per-output gradient: 2(predicted - expected) / n
    fn gradient(&self, predicted: &Tensor, expected: &Tensor) -> Result<Tensor> {
        check_lengths(predicted, expected)?;
        let n = predicted.len() as f64;
        let data = predicted.as_slice().iter().zip(expected.as_slice())
            .map(|(p, y)| 2.0 * (p - y) / n)
            .collect();
        Ok(Tensor::vector(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn loss_and_gradient() {
        let p = Tensor::vector(vec![1.0, 3.0]);
        let y = Tensor::vector(vec![0.0, 1.0]);
        assert_relative_eq!(MseLoss.loss(&p, &y).unwrap(), 2.5);
        assert_eq!(MseLoss.gradient(&p, &y).unwrap().as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn rejects_length_mismatch() {
        let p = Tensor::vector(vec![1.0, 3.0]);
        assert!(MseLoss.loss(&p, &Tensor::vector(vec![1.0])).is_err());
    }
}
