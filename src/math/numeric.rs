use crate::math::tensor::Tensor;

/// Central finite-difference gradient of a scalar function.
///
/// `grad[i] = (f(x + h·e_i) - f(x - h·e_i)) / 2h`. This is the oracle the
/// analytic backward passes are checked against.
pub fn finite_difference_gradient<F>(mut f: F, x: &Tensor, h: f64) -> Tensor
where
    F: FnMut(&Tensor) -> f64,
{
    let mut grad = Tensor::zeros_like(x);
    let mut probe = x.clone();
    for i in 0..x.len() {
        let original = probe[i];

        probe[i] = original + h;
        let plus = f(&probe);
        probe[i] = original - h;
        let minus = f(&probe);
        probe[i] = original;

        grad[i] = (plus - minus) / (2.0 * h);
    }
    grad
}
