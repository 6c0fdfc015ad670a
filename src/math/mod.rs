pub mod init;
pub mod numeric;
pub mod tensor;

pub use init::he_normal;
pub use numeric::finite_difference_gradient;
pub use tensor::Tensor;
