use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::error::Result;
use crate::layers::{
    ActivationLayer, ConvolutionalLayer, DenseLayer, Layer, LstmLayer, MaxPoolingLayer, SoftmaxLayer,
};
use crate::loss::loss_type::LossType;
use crate::network::network::Network;

fn one() -> usize {
    1
}

/// Describes one layer in a network specification.
///
/// Serialized with a `type` tag, e.g.
/// `{"type": "convolutional", "input_size": 81, "kernel_size": 3, "stride": 2, "filters": 2}`.
/// `channels` and `filters` default to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Dense {
        input_size: usize,
        output_size: usize,
    },
    Activation {
        activation: ActivationFunction,
    },
    Softmax,
    Convolutional {
        input_size: usize,
        kernel_size: usize,
        stride: usize,
        #[serde(default = "one")]
        channels: usize,
        #[serde(default = "one")]
        filters: usize,
    },
    MaxPooling {
        input_size: usize,
        pool_size: usize,
        stride: usize,
        #[serde(default = "one")]
        channels: usize,
    },
    Lstm {
        features: usize,
        hidden_units: usize,
        sequence_length: usize,
        output_size: usize,
    },
}

impl LayerSpec {
    /// Constructs the described layer with freshly initialized parameters.
    pub fn build(&self) -> Result<Box<dyn Layer>> {
        let layer: Box<dyn Layer> = match *self {
            LayerSpec::Dense { input_size, output_size } => {
                Box::new(DenseLayer::new(input_size, output_size)?)
            }
            LayerSpec::Activation { activation } => Box::new(ActivationLayer::new(activation)),
            LayerSpec::Softmax => Box::new(SoftmaxLayer::new()),
            LayerSpec::Convolutional {
                input_size,
                kernel_size,
                stride,
                channels,
                filters,
            } => Box::new(ConvolutionalLayer::new(input_size, kernel_size, stride, channels, filters)?),
            LayerSpec::MaxPooling {
                input_size,
                pool_size,
                stride,
                channels,
            } => Box::new(MaxPoolingLayer::new(input_size, pool_size, stride, channels)?),
            LayerSpec::Lstm {
                features,
                hidden_units,
                sequence_length,
                output_size,
            } => Box::new(LstmLayer::new(features, hidden_units, sequence_length, output_size)?),
        };
        Ok(layer)
    }
}

/// A fully serializable description of a network architecture plus its
/// training loss type.
///
/// `NetworkSpec` can be saved to / loaded from JSON independently of any
/// trained weights, so architecture configurations can be stored before
/// training starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Human-readable name.
    pub name: String,
    /// Ordered list of layer descriptions (input → output).
    pub layers: Vec<LayerSpec>,
    /// Loss function to pair with this network during training.
    #[serde(default)]
    pub loss: LossType,
}

impl NetworkSpec {
    /// Builds every layer in order. With a seed, parameters are re-drawn from
    /// it so the same spec and seed always give the same network.
    pub fn build(&self, seed: Option<u64>) -> Result<Network> {
        let mut network = Network::new(self.loss);
        for layer in &self.layers {
            network.add_boxed(layer.build()?)?;
        }
        if let Some(seed) = seed {
            network.initialize_parameters(seed);
        }
        Ok(network)
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `NetworkSpec` from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<NetworkSpec> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
