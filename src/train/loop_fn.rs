use std::sync::atomic::Ordering;
use std::time::Instant;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Error, Result};
use crate::loss::loss_type::Loss;
use crate::math::tensor::Tensor;
use crate::network::network::Network;
use crate::optim::optimizer_type::ParameterUpdate;
use crate::train::epoch_stats::EpochStats;
use crate::train::train_config::TrainConfig;

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Trains `network` for `config.epochs` epochs and returns the mean training
/// loss of the **last completed epoch** (`0.0` if no epoch ran).
///
/// # Arguments
/// - `network`: mutable reference to the network; modified in place
/// - `xs`     : training samples, each of the network's input size
/// - `ys`     : corresponding targets, each of the network's output size
/// - `config` : hyperparameters, optional progress channel, optional stop flag
///
/// Everything about the data and the config is validated before the first
/// epoch. The network is back in `Idle` when this returns, error or not.
///
/// # Early termination
/// The loop breaks early if:
/// - the `progress_tx` receiver has been dropped, **or**
/// - `config.stop_flag` is set to `true`.
///
/// A non-finite sample loss aborts the run with [`Error::NonFiniteLoss`].
pub fn train_loop(
    network: &mut Network,
    xs: &[Tensor],
    ys: &[Tensor],
    config: &TrainConfig,
) -> Result<f64> {
    config.validate()?;
    validate_data(network, xs, ys)?;

    info!(
        "training {} layers ({} parameterized, {} parameters) on {} samples: {} epochs, {:?}, {} lr {}",
        network.layers().len(),
        network.layers().iter().filter(|l| l.as_parameterized().is_some()).count(),
        network.parameter_count(),
        xs.len(),
        config.epochs,
        config.mode,
        config.optimizer.name(),
        config.learning_rate
    );

    network.begin_training();
    // gradients left over from manual backward calls or an aborted run
    network.drain_gradients();
    let result = run_epochs(network, xs, ys, config);
    network.finish_training();

    match &result {
        Ok(loss) => info!("training finished, last epoch loss {loss:.6}"),
        Err(e) => warn!("training aborted: {e}"),
    }
    result
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn validate_data(network: &Network, xs: &[Tensor], ys: &[Tensor]) -> Result<()> {
    if xs.len() != ys.len() {
        return Err(Error::SampleCountMismatch {
            inputs: xs.len(),
            targets: ys.len(),
        });
    }
    if xs.is_empty() {
        return Err(Error::EmptyDataset);
    }
    if network.layers().is_empty() {
        return Err(Error::InvalidConfig("network has no layers".into()));
    }

    if let Some(expected) = network.input_size() {
        let first = network.layers().iter().position(|l| l.input_size().is_some()).unwrap_or(0);
        if let Some(x) = xs.iter().find(|x| x.len() != expected) {
            return Err(Error::LayerSizeMismatch {
                layer: first,
                kind: network.layers()[first].kind().name(),
                expected,
                actual: x.len(),
            });
        }
    }
    if let Some(expected) = network.output_size() {
        let last = network.layers().iter().rposition(|l| l.output_size().is_some()).unwrap_or(0);
        if let Some(y) = ys.iter().find(|y| y.len() != expected) {
            return Err(Error::LayerSizeMismatch {
                layer: last,
                kind: network.layers()[last].kind().name(),
                expected,
                actual: y.len(),
            });
        }
    }
    Ok(())
}

fn run_epochs(network: &mut Network, xs: &[Tensor], ys: &[Tensor], config: &TrainConfig) -> Result<f64> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut order: Vec<usize> = (0..xs.len()).collect();
    // Adam time step; keeps counting across epochs.
    let mut updates = 0usize;
    let mut last_train_loss = 0.0;

    for epoch in 1..=config.epochs {
        if stop_requested(config) {
            warn!("stop flag raised, ending before epoch {epoch}");
            break;
        }

        let t_start = Instant::now();
        if config.shuffle {
            order.shuffle(&mut rng);
        }

        // ── One full pass over the training data ───────────────────────────
        let mut total_loss = 0.0;
        for batch in order.chunks(config.mode.batch_size()) {
            for &i in batch {
                total_loss += train_sample(network, &xs[i], &ys[i], epoch, i)?;
            }
            updates += 1;
            let scale = if config.average_gradients {
                1.0 / batch.len() as f64
            } else {
                1.0
            };
            let update = ParameterUpdate::new(config.optimizer, config.learning_rate, updates)
                .with_gradient_scale(scale);
            network.update_parameters(&update)?;
        }

        let train_loss = total_loss / xs.len() as f64;
        last_train_loss = train_loss;
        let elapsed_ms = t_start.elapsed().as_millis() as u64;
        debug!("epoch {epoch}/{}: loss {train_loss:.6} in {elapsed_ms} ms", config.epochs);

        // ── Emit progress ─────────────────────────────────────────────────
        if let Some(ref tx) = config.progress_tx {
            let stats = EpochStats {
                epoch,
                total_epochs: config.epochs,
                train_loss,
                elapsed_ms,
            };
            // If the receiver has been dropped, stop training.
            if tx.send(stats).is_err() {
                warn!("progress receiver dropped, ending after epoch {epoch}");
                break;
            }
        }
    }

    Ok(last_train_loss)
}

/// Forward, loss and backward for one sample. Returns the sample loss.
fn train_sample(
    network: &mut Network,
    x: &Tensor,
    y: &Tensor,
    epoch: usize,
    sample: usize,
) -> Result<f64> {
    let loss_fn = network.loss();
    let prediction = network.forward(x)?;
    let loss = loss_fn.loss(&prediction, y)?;
    if !loss.is_finite() {
        return Err(Error::NonFiniteLoss {
            epoch,
            sample,
            value: loss,
        });
    }
    let gradient = loss_fn.gradient(&prediction, y)?;
    network.backward(&gradient)?;
    Ok(loss)
}

fn stop_requested(config: &TrainConfig) -> bool {
    config
        .stop_flag
        .as_ref()
        .map_or(false, |flag| flag.load(Ordering::Relaxed))
}
