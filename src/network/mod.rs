pub mod network;
pub mod spec;

pub use network::{Network, NetworkState};
pub use spec::{LayerSpec, NetworkSpec};
