use rand::RngCore;
use rand_distr::{Distribution, StandardNormal};

use crate::math::tensor::Tensor;

/// He initialization: samples from N(0, sqrt(2 / fan_in)).
///
/// The variance 2/fan_in keeps ReLU activations from shrinking layer after
/// layer, and random draws break the symmetry a zero start would leave.
pub fn he_normal(shape: [usize; 3], fan_in: usize, rng: &mut dyn RngCore) -> Tensor {
    let std_dev = (2.0 / fan_in.max(1) as f64).sqrt();
    let mut out = Tensor::zeros(shape);
    for v in out.as_mut_slice() {
        let z: f64 = StandardNormal.sample(&mut *rng);
        *v = z * std_dev;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn he_normal_has_expected_spread() {
        let mut rng = StdRng::seed_from_u64(7);
        let t = he_normal([100, 100, 1], 50, &mut rng);
        let n = t.len() as f64;
        let mean = t.sum() / n;
        let var = t.as_slice().iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 0.01);
        assert!((var - 2.0 / 50.0).abs() < 0.004);
    }

    #[test]
    fn he_normal_is_reproducible_and_nonzero() {
        let a = he_normal([3, 3, 1], 9, &mut StdRng::seed_from_u64(1));
        let b = he_normal([3, 3, 1], 9, &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
        assert!(a.as_slice().iter().any(|&v| v != 0.0));
    }
}
