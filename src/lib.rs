pub mod activation;
pub mod error;
pub mod layers;
pub mod loss;
pub mod math;
pub mod network;
pub mod ops;
pub mod optim;
pub mod train;

// Convenience re-exports
pub use activation::activation::ActivationFunction;
pub use error::{Error, ErrorKind, Result};
pub use layers::{
    ActivationLayer, ConvolutionalLayer, DenseLayer, Layer, LayerKind, LstmLayer, MaxPoolingLayer,
    ParameterizedLayer, SoftmaxLayer,
};
pub use loss::{Loss, LossType};
pub use math::tensor::Tensor;
pub use network::{LayerSpec, Network, NetworkSpec, NetworkState};
pub use optim::{AdamConfig, OptimizerType, ParameterUpdate};
pub use train::{EpochStats, TrainConfig, TrainingMode};
