use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layers::params::ParameterSet;
use crate::math::tensor::Tensor;
use crate::optim::optimizer_type::ParameterUpdate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Dense,
    Activation,
    Softmax,
    Convolutional,
    MaxPooling,
    Lstm,
}

impl LayerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Dense => "dense",
            LayerKind::Activation => "activation",
            LayerKind::Softmax => "softmax",
            LayerKind::Convolutional => "convolutional",
            LayerKind::MaxPooling => "max_pooling",
            LayerKind::Lstm => "lstm",
        }
    }
}

/// Forward/backward contract shared by every layer.
///
/// `forward` remembers whatever `backward` needs; it may be called any number
/// of times and only the most recent input counts. `backward` receives
/// `∂L/∂output` and returns `∂L/∂input`.
pub trait Layer: Send + Sync {
    fn kind(&self) -> LayerKind;

    /// Flat input length, or `None` for layers that accept any length.
    fn input_size(&self) -> Option<usize>;

    fn output_size(&self) -> Option<usize>;

    fn forward(&mut self, input: &Tensor) -> Result<Tensor>;

    fn backward(&mut self, output_gradient: &Tensor) -> Result<Tensor>;

    fn as_parameterized(&self) -> Option<&dyn ParameterizedLayer> {
        None
    }

    fn as_parameterized_mut(&mut self) -> Option<&mut dyn ParameterizedLayer> {
        None
    }
}

/// A layer that owns trainable weights.
///
/// `backward` adds its parameter gradients into the [`ParameterSet`]; they
/// are only applied (and then drained) by `update_parameters`.
pub trait ParameterizedLayer: Layer {
    fn parameters(&self) -> &ParameterSet;

    fn parameters_mut(&mut self) -> &mut ParameterSet;

    /// Re-draws the weights from a He-normal distribution and zeroes biases,
    /// gradients and optimizer state.
    fn initialize_parameters(&mut self, rng: &mut dyn RngCore);

    fn weights(&self) -> &[Tensor] {
        self.parameters().weights()
    }

    fn biases(&self) -> &[Tensor] {
        self.parameters().biases()
    }

    fn weight_gradients(&self) -> &[Tensor] {
        self.parameters().weight_gradients()
    }

    fn bias_gradients(&self) -> &[Tensor] {
        self.parameters().bias_gradients()
    }

    /// Replaces the weights and biases, e.g. with values from a saved model.
    /// Shapes must match the current ones exactly.
    fn load_parameters(&mut self, weights: Vec<Tensor>, biases: Vec<Tensor>) -> Result<()> {
        self.parameters_mut().load(weights, biases)
    }

    fn drain_gradients(&mut self) {
        self.parameters_mut().drain_gradients();
    }

    fn update_parameters(&mut self, update: &ParameterUpdate) -> Result<()> {
        self.parameters_mut().apply(update)
    }
}

/// Rejects inputs whose flat length differs from `expected`.
pub(crate) fn check_input(kind: LayerKind, expected: usize, input: &Tensor) -> Result<()> {
    if input.len() != expected {
        return Err(Error::InputSizeMismatch {
            kind: kind.name(),
            expected,
            actual: input.len(),
        });
    }
    Ok(())
}

/// Returns the cached forward value or the "backward before forward" error.
pub(crate) fn cached<'a>(slot: &'a Option<Tensor>, kind: LayerKind) -> Result<&'a Tensor> {
    slot.as_ref().ok_or(Error::BackwardBeforeForward(kind.name()))
}
