use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::optim::adam::AdamConfig;

/// Which update rule `update_parameters` applies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerType {
    GradientDescent,
    Adam(AdamConfig),
}

impl Default for OptimizerType {
    fn default() -> Self {
        OptimizerType::Adam(AdamConfig::default())
    }
}

impl OptimizerType {
    pub fn adam() -> OptimizerType {
        OptimizerType::default()
    }

    pub fn name(&self) -> &'static str {
        match self {
            OptimizerType::GradientDescent => "gradient_descent",
            OptimizerType::Adam(_) => "adam",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            OptimizerType::GradientDescent => Ok(()),
            OptimizerType::Adam(config) => config.validate(),
        }
    }
}

/// Everything a parameterized layer needs to apply one optimizer step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterUpdate {
    pub optimizer: OptimizerType,
    pub learning_rate: f64,
    /// 1-indexed Adam time step. Ignored by gradient descent.
    pub step: usize,
    /// Multiplies every gradient before use; `1/len` averages a minibatch.
    pub gradient_scale: f64,
}

impl ParameterUpdate {
    pub fn new(optimizer: OptimizerType, learning_rate: f64, step: usize) -> ParameterUpdate {
        ParameterUpdate {
            optimizer,
            learning_rate,
            step,
            gradient_scale: 1.0,
        }
    }

    pub fn with_gradient_scale(mut self, gradient_scale: f64) -> ParameterUpdate {
        self.gradient_scale = gradient_scale;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be finite and > 0, got {}",
                self.learning_rate
            )));
        }
        if !(self.gradient_scale.is_finite() && self.gradient_scale > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "gradient scale must be finite and > 0, got {}",
                self.gradient_scale
            )));
        }
        self.optimizer.validate()
    }
}
