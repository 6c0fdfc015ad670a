use log::{debug, trace};
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::layers::layer::Layer;
use crate::loss::loss_type::LossType;
use crate::math::tensor::Tensor;
use crate::optim::optimizer_type::ParameterUpdate;
use crate::train::loop_fn::train_loop;
use crate::train::train_config::TrainConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    /// Layers may be added; no parameterized-layer list is cached.
    Idle,
    /// A training run is in progress and the parameterized layers are cached.
    Training,
}

/// An ordered stack of layers trained against one loss.
pub struct Network {
    layers: Vec<Box<dyn Layer>>,
    loss: LossType,
    state: NetworkState,
    parameterized: Vec<usize>,
}

impl Network {
    pub fn new(loss: LossType) -> Network {
        Network {
            layers: Vec::new(),
            loss,
            state: NetworkState::Idle,
            parameterized: Vec::new(),
        }
    }

    /// Appends a layer, rejecting it if its declared input size disagrees
    /// with the declared output size of the layers before it.
    pub fn add<L: Layer + 'static>(&mut self, layer: L) -> Result<()> {
        self.add_boxed(Box::new(layer))
    }

    pub fn add_boxed(&mut self, layer: Box<dyn Layer>) -> Result<()> {
        if self.state == NetworkState::Training {
            return Err(Error::InvalidConfig("cannot add layers while training".into()));
        }
        if let (Some(expected), Some(actual)) = (self.output_size(), layer.input_size()) {
            if expected != actual {
                return Err(Error::LayerSizeMismatch {
                    layer: self.layers.len(),
                    kind: layer.kind().name(),
                    expected,
                    actual,
                });
            }
        }
        trace!(
            "layer {} ({}): {:?} -> {:?}",
            self.layers.len(),
            layer.kind().name(),
            layer.input_size(),
            layer.output_size()
        );
        self.layers.push(layer);
        Ok(())
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&dyn Layer> {
        self.layers.get(index).map(|layer| &**layer)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut (dyn Layer + 'static)> {
        self.layers.get_mut(index).map(|layer| &mut **layer)
    }

    pub fn loss(&self) -> LossType {
        self.loss
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }

    /// Input size declared by the first size-aware layer.
    pub fn input_size(&self) -> Option<usize> {
        self.layers.iter().find_map(|layer| layer.input_size())
    }

    /// Output size declared by the last size-aware layer.
    pub fn output_size(&self) -> Option<usize> {
        self.layers.iter().rev().find_map(|layer| layer.output_size())
    }

    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .filter_map(|layer| layer.as_parameterized())
            .map(|layer| layer.parameters().count())
            .sum()
    }

    /// Re-draws every layer's parameters from one seeded RNG, in layer order.
    pub fn initialize_parameters(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        for layer in self.layers.iter_mut() {
            if let Some(layer) = layer.as_parameterized_mut() {
                layer.initialize_parameters(&mut rng);
            }
        }
    }

    /// Forward pass with no effect on parameters. Calling it twice with the
    /// same input gives bit-identical output.
    pub fn predict(&mut self, input: &Tensor) -> Result<Tensor> {
        self.forward(input)
    }

    pub fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        if self.layers.is_empty() {
            return Err(Error::InvalidConfig("network has no layers".into()));
        }
        let mut current = input.clone();
        for (i, layer) in self.layers.iter_mut().enumerate() {
            current = layer.forward(&current).map_err(|e| at_layer(e, i))?;
        }
        Ok(current)
    }

    /// Pushes `∂L/∂output` back through every layer and returns `∂L/∂input`.
    /// Parameter gradients accumulate inside the layers.
    pub fn backward(&mut self, loss_gradient: &Tensor) -> Result<Tensor> {
        let mut gradient = loss_gradient.clone();
        for (i, layer) in self.layers.iter_mut().enumerate().rev() {
            gradient = layer.backward(&gradient).map_err(|e| at_layer(e, i))?;
        }
        Ok(gradient)
    }

    /// Caches the positions of the parameterized layers and enters `Training`.
    pub fn begin_training(&mut self) {
        self.parameterized = self
            .layers
            .iter()
            .enumerate()
            .filter(|(_, layer)| layer.as_parameterized().is_some())
            .map(|(i, _)| i)
            .collect();
        self.state = NetworkState::Training;
        debug!("cached {} parameterized layers", self.parameterized.len());
    }

    pub fn finish_training(&mut self) {
        self.parameterized.clear();
        self.state = NetworkState::Idle;
    }

    /// Indices of the parameterized layers cached by `begin_training`.
    pub fn parameterized_layers(&self) -> &[usize] {
        &self.parameterized
    }

    /// Applies and drains the accumulated gradients of every parameterized
    /// layer. Layers own disjoint state, so they update in parallel.
    pub fn update_parameters(&mut self, update: &ParameterUpdate) -> Result<()> {
        update.validate()?;
        let cached = match self.state {
            NetworkState::Training => Some(&self.parameterized),
            NetworkState::Idle => None,
        };
        self.layers
            .par_iter_mut()
            .enumerate()
            .filter(|(i, _)| cached.map_or(true, |indices| indices.binary_search(i).is_ok()))
            .filter_map(|(_, layer)| layer.as_parameterized_mut())
            .try_for_each(|layer| layer.update_parameters(update))
    }

    pub fn drain_gradients(&mut self) {
        for layer in self.layers.iter_mut() {
            if let Some(layer) = layer.as_parameterized_mut() {
                layer.drain_gradients();
            }
        }
    }

    /// Trains on `(xs[i], ys[i])` pairs and returns the mean loss of the last
    /// completed epoch. See [`train_loop`].
    pub fn train(&mut self, xs: &[Tensor], ys: &[Tensor], config: &TrainConfig) -> Result<f64> {
        train_loop(self, xs, ys, config)
    }
}

/// Tags a layer's input size complaint with its position in the stack.
fn at_layer(error: Error, layer: usize) -> Error {
    match error {
        Error::InputSizeMismatch { kind, expected, actual } => Error::LayerSizeMismatch {
            layer,
            kind,
            expected,
            actual,
        },
        other => other,
    }
}
