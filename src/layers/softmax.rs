use crate::error::{Error, Result};
use crate::layers::layer::{cached, Layer, LayerKind};
use crate::math::tensor::Tensor;

/// Normalizes a vector into a probability distribution.
///
/// The forward pass subtracts the maximum before exponentiating. The backward
/// pass is the full Jacobian-vector product `dx_i = s_i (g_i - Σ_j g_j s_j)`,
/// so it composes with any loss, not only cross entropy.
#[derive(Debug, Default)]
pub struct SoftmaxLayer {
    output: Option<Tensor>,
}

impl SoftmaxLayer {
    pub fn new() -> SoftmaxLayer {
        SoftmaxLayer::default()
    }
}

impl Layer for SoftmaxLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Softmax
    }

    fn input_size(&self) -> Option<usize> {
        None
    }

    fn output_size(&self) -> Option<usize> {
        None
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        if input.is_empty() {
            return Err(Error::InvalidShape("softmax of an empty vector".into()));
        }
        let max = input
            .as_slice()
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let exps = input.flatten().map(|v| (v - max).exp());
        let out = &exps / exps.sum();
        self.output = Some(out.clone());
        Ok(out)
    }

    fn backward(&mut self, output_gradient: &Tensor) -> Result<Tensor> {
        let s = cached(&self.output, LayerKind::Softmax)?;
        if output_gradient.len() != s.len() {
            return Err(Error::InputSizeMismatch {
                kind: LayerKind::Softmax.name(),
                expected: s.len(),
                actual: output_gradient.len(),
            });
        }
        let g = output_gradient.flatten();
        let weighted = s.hadamard(&g)?.sum();
        Ok(s.hadamard(&g.map(|v| v - weighted))?)
    }
}
