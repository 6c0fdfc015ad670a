pub mod convolution;

pub use convolution::{correlate, input_gradient, output_dim, weight_gradient};
