pub mod adam;
pub mod optimizer_type;
pub mod sgd;

pub use adam::{AdamConfig, AdamState};
pub use optimizer_type::{OptimizerType, ParameterUpdate};
pub use sgd::Sgd;
