use crate::error::Result;
use crate::loss::check_lengths;
use crate::loss::loss_type::Loss;
use crate::math::tensor::Tensor;

pub struct BceLoss;

const EPS: f64 = 1e-12;

fn clamp(p: f64) -> f64 {
    p.clamp(EPS, 1.0 - EPS)
}

impl Loss for BceLoss {
    /// Scalar BCE: -mean(y·ln(p) + (1-y)·ln(1-p))
    fn loss(&self, predicted: &Tensor, expected: &Tensor) -> Result<f64> {
        check_lengths(predicted, expected)?;
        let n = predicted.len() as f64;
        Ok(predicted.as_slice().iter().zip(expected.as_slice())
            .map(|(&p, y)| {
                let p = clamp(p);
                -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
            })
            .sum::<f64>() / n)
    }

    /// Per-output gradient: (p - y) / (p·(1 - p)·n)
    fn gradient(&self, predicted: &Tensor, expected: &Tensor) -> Result<Tensor> {
        check_lengths(predicted, expected)?;
        let n = predicted.len() as f64;
        let data = predicted.as_slice().iter().zip(expected.as_slice())
            .map(|(&p, y)| {
                let p = clamp(p);
                (p - y) / (p * (1.0 - p) * n)
            })
            .collect();
        Ok(Tensor::vector(data))
    }
}
