use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::loss::{BceLoss, CrossEntropyLoss, MseLoss};
use crate::math::tensor::Tensor;

/// A scalar loss and its gradient with respect to the prediction.
pub trait Loss: Send + Sync {
    fn loss(&self, predicted: &Tensor, expected: &Tensor) -> Result<f64>;

    fn gradient(&self, predicted: &Tensor, expected: &Tensor) -> Result<Tensor>;
}

/// Selects which loss function the network trains against.
///
/// - `Mse`               : Mean-squared error; pair with Identity or Sigmoid output.
/// - `CrossEntropy`      : Categorical cross-entropy; pair with a Softmax layer.
/// - `BinaryCrossEntropy`: Binary cross-entropy; pair with Sigmoid output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    #[default]
    Mse,
    CrossEntropy,
    BinaryCrossEntropy,
}

impl LossType {
    pub fn name(&self) -> &'static str {
        match self {
            LossType::Mse => "mse",
            LossType::CrossEntropy => "cross_entropy",
            LossType::BinaryCrossEntropy => "binary_cross_entropy",
        }
    }

    fn function(&self) -> &'static dyn Loss {
        match self {
            LossType::Mse => &MseLoss,
            LossType::CrossEntropy => &CrossEntropyLoss,
            LossType::BinaryCrossEntropy => &BceLoss,
        }
    }
}

impl Loss for LossType {
    fn loss(&self, predicted: &Tensor, expected: &Tensor) -> Result<f64> {
        self.function().loss(predicted, expected)
    }

    fn gradient(&self, predicted: &Tensor, expected: &Tensor) -> Result<Tensor> {
        self.function().gradient(predicted, expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_to_the_named_loss() {
        let p = Tensor::vector(vec![0.5, 0.5]);
        let y = Tensor::vector(vec![1.0, 0.0]);
        assert_eq!(
            LossType::Mse.loss(&p, &y).unwrap(),
            MseLoss.loss(&p, &y).unwrap()
        );
        assert_eq!(
            LossType::CrossEntropy.gradient(&p, &y).unwrap(),
            CrossEntropyLoss.gradient(&p, &y).unwrap()
        );
    }

    #[test]
    fn serde_names() {
        let json = serde_json::to_string(&LossType::BinaryCrossEntropy).unwrap();
        assert_eq!(json, "\"binary_cross_entropy\"");
    }
}
