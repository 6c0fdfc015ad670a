pub mod bce;
pub mod cross_entropy;
pub mod loss_type;
pub mod mse;

pub use bce::BceLoss;
pub use cross_entropy::CrossEntropyLoss;
pub use loss_type::{Loss, LossType};
pub use mse::MseLoss;

use crate::error::{Error, Result};
use crate::math::tensor::Tensor;

/// Every loss compares vectors of equal length.
pub(crate) fn check_lengths(predicted: &Tensor, expected: &Tensor) -> Result<()> {
    if predicted.len() != expected.len() || predicted.is_empty() {
        return Err(Error::ShapeMismatch {
            op: "loss",
            left: predicted.shape(),
            right: expected.shape(),
        });
    }
    Ok(())
}
