use crate::activation::activation::ActivationFunction;
use crate::error::{Error, Result};
use crate::layers::layer::{cached, Layer, LayerKind};
use crate::math::tensor::Tensor;

/// Applies an [`ActivationFunction`] to every value. Accepts any length and
/// keeps the input's shape.
#[derive(Debug)]
pub struct ActivationLayer {
    activation: ActivationFunction,
    input: Option<Tensor>,
}

impl ActivationLayer {
    pub fn new(activation: ActivationFunction) -> ActivationLayer {
        ActivationLayer {
            activation,
            input: None,
        }
    }

    pub fn activation(&self) -> ActivationFunction {
        self.activation
    }
}

impl Layer for ActivationLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Activation
    }

    fn input_size(&self) -> Option<usize> {
        None
    }

    fn output_size(&self) -> Option<usize> {
        None
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let activation = self.activation;
        let out = input.map(|v| activation.function(v));
        self.input = Some(input.clone());
        Ok(out)
    }

    fn backward(&mut self, output_gradient: &Tensor) -> Result<Tensor> {
        let x = cached(&self.input, LayerKind::Activation)?;
        if output_gradient.len() != x.len() {
            return Err(Error::InputSizeMismatch {
                kind: LayerKind::Activation.name(),
                expected: x.len(),
                actual: output_gradient.len(),
            });
        }
        let data = x
            .as_slice()
            .iter()
            .zip(output_gradient.as_slice())
            .map(|(&v, &g)| g * self.activation.derivative(v))
            .collect();
        Tensor::from_vec(x.shape(), data)
    }
}
