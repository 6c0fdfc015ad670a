use std::sync::mpsc;
use std::sync::{atomic::AtomicBool, Arc};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::optim::optimizer_type::OptimizerType;
use crate::train::epoch_stats::EpochStats;

/// When accumulated gradients are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrainingMode {
    /// Update after every sample.
    #[default]
    Online,
    /// Accumulate over `batch_size` samples, then apply once.
    Minibatch { batch_size: usize },
}

impl TrainingMode {
    pub fn batch_size(&self) -> usize {
        match self {
            TrainingMode::Online => 1,
            TrainingMode::Minibatch { batch_size } => *batch_size,
        }
    }
}

/// Configuration for a `train_loop` run.
///
/// # Fields
/// - `epochs`       : total number of full passes over the training data
/// - `mode`         : online or minibatch updates
/// - `optimizer`    : gradient descent or Adam (with its betas and epsilon)
/// - `learning_rate`: step size η
/// - `average_gradients`: divide a minibatch's summed gradient by its length
///                     before the step; off applies the plain sum
/// - `shuffle`      : visit samples in a fresh random order every epoch
/// - `seed`         : seeds the shuffle; `None` draws from OS entropy
/// - `progress_tx`  : optional channel sender; one `EpochStats` is sent per
///                     completed epoch. If the receiver is dropped the loop
///                     terminates early.
/// - `stop_flag`    : optional atomic flag; when set to `true` from another
///                     thread the loop terminates after the current epoch.
pub struct TrainConfig {
    pub epochs: usize,
    pub mode: TrainingMode,
    pub optimizer: OptimizerType,
    pub learning_rate: f64,
    pub average_gradients: bool,
    pub shuffle: bool,
    pub seed: Option<u64>,
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            epochs: 1,
            mode: TrainingMode::Online,
            optimizer: OptimizerType::default(),
            learning_rate: 0.001,
            average_gradients: false,
            shuffle: false,
            seed: None,
            progress_tx: None,
            stop_flag: None,
        }
    }
}

impl TrainConfig {
    /// Online Adam with default betas, no shuffling, no progress channel and
    /// no stop flag.
    pub fn new(epochs: usize, learning_rate: f64) -> Self {
        TrainConfig {
            epochs,
            learning_rate,
            ..TrainConfig::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.mode.batch_size() == 0 {
            return Err(Error::InvalidConfig("batch_size must be at least 1".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be finite and > 0, got {}",
                self.learning_rate
            )));
        }
        self.optimizer.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_online_adam() {
        let config = TrainConfig::new(10, 0.1);
        assert_eq!(config.mode, TrainingMode::Online);
        assert_eq!(config.optimizer, OptimizerType::adam());
        assert!(!config.average_gradients);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_batch_is_rejected() {
        let config = TrainConfig {
            mode: TrainingMode::Minibatch { batch_size: 0 },
            ..TrainConfig::new(1, 0.1)
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn mode_serde() {
        let json = serde_json::to_string(&TrainingMode::Minibatch { batch_size: 8 }).unwrap();
        assert_eq!(json, r#"{"type":"minibatch","batch_size":8}"#);
    }
}
