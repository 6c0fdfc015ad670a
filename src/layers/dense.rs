use log::trace;
use rand::RngCore;

use crate::error::{Error, Result};
use crate::layers::layer::{cached, check_input, Layer, LayerKind, ParameterizedLayer};
use crate::layers::params::ParameterSet;
use crate::math::init::he_normal;
use crate::math::tensor::Tensor;

/// Fully connected layer: `y = x·W + b`.
///
/// `W` has shape `(output_size, input_size, 1)` so that a `(input_size, 1, 1)`
/// column multiplies straight into an `(output_size, 1, 1)` column. Apply a
/// nonlinearity with a following [`ActivationLayer`](super::ActivationLayer).
#[derive(Debug)]
pub struct DenseLayer {
    input_size: usize,
    output_size: usize,
    params: ParameterSet,
    input: Option<Tensor>,
}

impl DenseLayer {
    /// He-initialized layer drawn from the thread RNG. Use
    /// [`ParameterizedLayer::initialize_parameters`] to re-draw reproducibly.
    pub fn new(input_size: usize, output_size: usize) -> Result<DenseLayer> {
        if input_size == 0 || output_size == 0 {
            return Err(Error::InvalidConfig(format!(
                "dense layer needs positive sizes, got {input_size} -> {output_size}"
            )));
        }
        trace!("dense layer {input_size} -> {output_size}");

        let mut layer = DenseLayer {
            input_size,
            output_size,
            params: ParameterSet::new(
                vec![Tensor::new(output_size, input_size, 1)],
                vec![Tensor::new(output_size, 1, 1)],
            ),
            input: None,
        };
        layer.initialize_parameters(&mut rand::thread_rng());
        Ok(layer)
    }
}

impl Layer for DenseLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Dense
    }

    fn input_size(&self) -> Option<usize> {
        Some(self.input_size)
    }

    fn output_size(&self) -> Option<usize> {
        Some(self.output_size)
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        check_input(self.kind(), self.input_size, input)?;
        let x = input.flatten();
        let out = x
            .matmul(&self.params.weights()[0])?
            .try_add(&self.params.biases()[0])?;
        self.input = Some(x);
        Ok(out)
    }

    fn backward(&mut self, output_gradient: &Tensor) -> Result<Tensor> {
        check_input(self.kind(), self.output_size, output_gradient)?;
        let x = cached(&self.input, LayerKind::Dense)?;
        let g = output_gradient.flatten();

        let weight_gradient = x.transpose().matmul(&g)?;
        let input_gradient = g.matmul(&self.params.weights()[0].transpose())?;

        self.params.accumulate_weight(0, &weight_gradient)?;
        self.params.accumulate_bias(0, &g)?;
        Ok(input_gradient)
    }

    fn as_parameterized(&self) -> Option<&dyn ParameterizedLayer> {
        Some(self)
    }

    fn as_parameterized_mut(&mut self) -> Option<&mut dyn ParameterizedLayer> {
        Some(self)
    }
}

impl ParameterizedLayer for DenseLayer {
    fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.params
    }

    fn initialize_parameters(&mut self, rng: &mut dyn RngCore) {
        self.params.weights_mut()[0] =
            he_normal([self.output_size, self.input_size, 1], self.input_size, rng);
        self.params.biases_mut()[0].fill(0.0);
        self.params.reset_state();
    }
}
