pub mod activation_layer;
pub mod conv;
pub mod dense;
pub mod layer;
pub mod lstm;
pub mod max_pool;
pub mod params;
pub mod softmax;

pub use activation_layer::ActivationLayer;
pub use conv::ConvolutionalLayer;
pub use dense::DenseLayer;
pub use layer::{Layer, LayerKind, ParameterizedLayer};
pub use lstm::LstmLayer;
pub use max_pool::MaxPoolingLayer;
pub use params::ParameterSet;
pub use softmax::SoftmaxLayer;
