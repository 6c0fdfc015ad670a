use crate::error::{Error, Result};
use crate::math::tensor::Tensor;
use crate::optim::adam::AdamState;
use crate::optim::optimizer_type::{OptimizerType, ParameterUpdate};
use crate::optim::sgd::Sgd;

/// Weights, biases, their gradient buffers and the Adam moments for one layer.
///
/// Gradients always accumulate. Online training applies after every sample,
/// minibatch training after every batch; both drain on apply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    weights: Vec<Tensor>,
    biases: Vec<Tensor>,
    weight_gradients: Vec<Tensor>,
    bias_gradients: Vec<Tensor>,
    weight_moments: AdamState,
    bias_moments: AdamState,
}

impl ParameterSet {
    pub fn new(weights: Vec<Tensor>, biases: Vec<Tensor>) -> ParameterSet {
        ParameterSet {
            weight_gradients: weights.iter().map(Tensor::zeros_like).collect(),
            bias_gradients: biases.iter().map(Tensor::zeros_like).collect(),
            weight_moments: AdamState::zeros_like(&weights),
            bias_moments: AdamState::zeros_like(&biases),
            weights,
            biases,
        }
    }

    pub fn weights(&self) -> &[Tensor] {
        &self.weights
    }

    pub fn biases(&self) -> &[Tensor] {
        &self.biases
    }

    pub fn weight_gradients(&self) -> &[Tensor] {
        &self.weight_gradients
    }

    pub fn bias_gradients(&self) -> &[Tensor] {
        &self.bias_gradients
    }

    /// Total number of trainable scalars.
    pub fn count(&self) -> usize {
        self.weights.iter().chain(&self.biases).map(Tensor::len).sum()
    }

    pub(crate) fn weights_mut(&mut self) -> &mut [Tensor] {
        &mut self.weights
    }

    pub(crate) fn biases_mut(&mut self) -> &mut [Tensor] {
        &mut self.biases
    }

    pub(crate) fn accumulate_weight(&mut self, index: usize, gradient: &Tensor) -> Result<()> {
        accumulate(&mut self.weight_gradients, index, gradient)
    }

    pub(crate) fn accumulate_bias(&mut self, index: usize, gradient: &Tensor) -> Result<()> {
        accumulate(&mut self.bias_gradients, index, gradient)
    }

    pub fn drain_gradients(&mut self) {
        self.weight_gradients.iter_mut().for_each(|g| g.fill(0.0));
        self.bias_gradients.iter_mut().for_each(|g| g.fill(0.0));
    }

    /// Clears gradients and optimizer moments. Called after the weights are
    /// replaced wholesale.
    pub fn reset_state(&mut self) {
        self.drain_gradients();
        self.weight_moments.reset();
        self.bias_moments.reset();
    }

    pub fn load(&mut self, weights: Vec<Tensor>, biases: Vec<Tensor>) -> Result<()> {
        check_shapes("weights", &self.weights, &weights)?;
        check_shapes("biases", &self.biases, &biases)?;
        self.weights = weights;
        self.biases = biases;
        self.reset_state();
        Ok(())
    }

    /// Applies the accumulated gradients and drains them. An invalid update
    /// is rejected before any parameter moves.
    pub fn apply(&mut self, update: &ParameterUpdate) -> Result<()> {
        update.validate()?;
        match update.optimizer {
            OptimizerType::GradientDescent => {
                let sgd = Sgd::new(update.learning_rate);
                sgd.step(&mut self.weights, &self.weight_gradients, update.gradient_scale)?;
                sgd.step(&mut self.biases, &self.bias_gradients, update.gradient_scale)?;
            }
            OptimizerType::Adam(config) => {
                self.weight_moments.step(
                    &mut self.weights,
                    &self.weight_gradients,
                    update.step,
                    update.learning_rate,
                    &config,
                    update.gradient_scale,
                )?;
                // layers without biases skip the bias branch
                if !self.biases.is_empty() {
                    self.bias_moments.step(
                        &mut self.biases,
                        &self.bias_gradients,
                        update.step,
                        update.learning_rate,
                        &config,
                        update.gradient_scale,
                    )?;
                }
            }
        }
        self.drain_gradients();
        Ok(())
    }
}

fn accumulate(buffers: &mut [Tensor], index: usize, gradient: &Tensor) -> Result<()> {
    let count = buffers.len();
    let buffer = buffers.get_mut(index).ok_or_else(|| {
        Error::InvalidShape(format!("parameter index {index} out of range for {count} tensors"))
    })?;
    buffer.add_scaled(gradient, 1.0)
}

fn check_shapes(what: &str, current: &[Tensor], incoming: &[Tensor]) -> Result<()> {
    if current.len() != incoming.len() {
        return Err(Error::InvalidShape(format!(
            "expected {} {what} tensors, got {}",
            current.len(),
            incoming.len()
        )));
    }
    for (old, new) in current.iter().zip(incoming) {
        if old.shape() != new.shape() {
            return Err(Error::ShapeMismatch {
                op: "load parameters",
                left: old.shape(),
                right: new.shape(),
            });
        }
    }
    Ok(())
}
