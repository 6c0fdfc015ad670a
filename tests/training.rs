use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use approx::assert_relative_eq;
use ferrite_grad::{
    ActivationFunction, ActivationLayer, ConvolutionalLayer, DenseLayer, Error, ErrorKind, Layer,
    LossType, Network, NetworkState, OptimizerType, SoftmaxLayer, Tensor, TrainConfig,
    TrainingMode,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn xor_data() -> (Vec<Tensor>, Vec<Tensor>) {
    let xs = vec![
        Tensor::vector(vec![0.0, 0.0]),
        Tensor::vector(vec![0.0, 1.0]),
        Tensor::vector(vec![1.0, 0.0]),
        Tensor::vector(vec![1.0, 1.0]),
    ];
    let ys = vec![
        Tensor::vector(vec![0.0]),
        Tensor::vector(vec![1.0]),
        Tensor::vector(vec![1.0]),
        Tensor::vector(vec![0.0]),
    ];
    (xs, ys)
}

fn xor_network(seed: u64) -> Network {
    let mut net = Network::new(LossType::Mse);
    net.add(DenseLayer::new(2, 3).unwrap()).unwrap();
    net.add(ActivationLayer::new(ActivationFunction::ReLU)).unwrap();
    net.add(DenseLayer::new(3, 1).unwrap()).unwrap();
    net.initialize_parameters(seed);
    net
}

#[test]
fn xor_is_learned() {
    // Three ReLU units get stuck on some initial draws, so restart from a
    // handful of seeds and require one clean solve.
    let (xs, ys) = xor_data();
    let config = TrainConfig::new(1000, 0.1);

    let solved = (0..20u64).any(|seed| {
        let mut net = xor_network(seed);
        net.train(&xs, &ys, &config).unwrap();
        xs.iter().zip(&ys).all(|(x, y)| {
            let prediction = net.predict(x).unwrap();
            (prediction[0] - y[0]).abs() < 0.1
        })
    });
    assert!(solved, "no seed learned XOR");
}

#[test]
fn single_convolution_fits_a_scalar_target() {
    for seed in 0..3u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let x = Tensor::vector((0..9).map(|_| rng.gen::<f64>()).collect());
        let y = Tensor::vector(vec![rng.gen::<f64>()]);

        let mut net = Network::new(LossType::Mse);
        net.add(ConvolutionalLayer::new(9, 3, 1, 1, 1).unwrap()).unwrap();
        net.initialize_parameters(seed);

        let config = TrainConfig::new(500, 0.01);
        net.train(&[x.clone()], &[y.clone()], &config).unwrap();
        let prediction = net.predict(&x).unwrap();
        assert!(
            (prediction[0] - y[0]).abs() < 1e-4,
            "seed {seed}: {} vs {}",
            prediction[0],
            y[0]
        );
    }
}

#[test]
fn minibatch_gradient_descent_lowers_the_loss() {
    let mut rng = StdRng::seed_from_u64(21);
    let xs: Vec<Tensor> = (0..16)
        .map(|_| Tensor::vector(vec![rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)]))
        .collect();
    // a linear target the dense layer can represent exactly
    let ys: Vec<Tensor> = xs
        .iter()
        .map(|x| Tensor::vector(vec![0.5 * x[0] - 2.0 * x[1] + 0.25]))
        .collect();

    let mut net = Network::new(LossType::Mse);
    net.add(DenseLayer::new(2, 1).unwrap()).unwrap();
    net.initialize_parameters(21);

    let first = TrainConfig {
        mode: TrainingMode::Minibatch { batch_size: 5 },
        optimizer: OptimizerType::GradientDescent,
        ..TrainConfig::new(1, 0.02)
    };
    let initial = net.train(&xs, &ys, &first).unwrap();

    let rest = TrainConfig {
        mode: TrainingMode::Minibatch { batch_size: 5 },
        optimizer: OptimizerType::GradientDescent,
        shuffle: true,
        seed: Some(3),
        ..TrainConfig::new(300, 0.02)
    };
    let last = net.train(&xs, &ys, &rest).unwrap();
    assert!(last < initial * 0.01, "loss went from {initial} to {last}");
    assert_eq!(net.state(), NetworkState::Idle);
}

fn single_weight_network() -> Network {
    let mut net = Network::new(LossType::Mse);
    net.add(DenseLayer::new(1, 1).unwrap()).unwrap();
    net.layer_mut(0)
        .unwrap()
        .as_parameterized_mut()
        .unwrap()
        .load_parameters(vec![Tensor::vector(vec![1.0])], vec![Tensor::vector(vec![0.0])])
        .unwrap();
    net
}

fn one_batch_of_two(average_gradients: bool) -> (f64, f64) {
    let xs = vec![Tensor::vector(vec![1.0]), Tensor::vector(vec![3.0])];
    let ys = vec![Tensor::vector(vec![0.0]), Tensor::vector(vec![0.0])];
    let mut net = single_weight_network();
    let config = TrainConfig {
        mode: TrainingMode::Minibatch { batch_size: 2 },
        optimizer: OptimizerType::GradientDescent,
        average_gradients,
        ..TrainConfig::new(1, 0.1)
    };
    net.train(&xs, &ys, &config).unwrap();
    let layer = net.layer(0).unwrap().as_parameterized().unwrap();
    (layer.weights()[0][0], layer.biases()[0][0])
}

#[test]
fn minibatch_update_applies_the_summed_gradient() {
    // dL/dw = 2*w*x*x per sample: 2 and 18, sum 20
    // dL/db = 2*w*x: 2 and 6, sum 8
    let (w, b) = one_batch_of_two(false);
    assert_relative_eq!(w, 1.0 - 0.1 * 20.0, epsilon = 1e-12);
    assert_relative_eq!(b, -0.1 * 8.0, epsilon = 1e-12);
}

#[test]
fn averaged_minibatch_update_applies_the_mean_gradient() {
    let (w, b) = one_batch_of_two(true);
    assert_relative_eq!(w, 0.0, epsilon = 1e-12);
    assert_relative_eq!(b, -0.4, epsilon = 1e-12);
}

#[test]
fn softmax_classifier_learns_two_clusters() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for i in 0..40 {
        let class = i % 2;
        let centre = if class == 0 { -1.0 } else { 1.0 };
        xs.push(Tensor::vector(vec![
            centre + rng.gen_range(-0.3..0.3),
            centre + rng.gen_range(-0.3..0.3),
        ]));
        let mut y = Tensor::new(2, 1, 1);
        y[class] = 1.0;
        ys.push(y);
    }

    let mut net = Network::new(LossType::CrossEntropy);
    net.add(DenseLayer::new(2, 2).unwrap()).unwrap();
    net.add(SoftmaxLayer::new()).unwrap();
    net.initialize_parameters(8);

    let loss = net.train(&xs, &ys, &TrainConfig::new(50, 0.05)).unwrap();
    assert!(loss < 0.1, "cross entropy stayed at {loss}");
    for (x, y) in xs.iter().zip(&ys) {
        let p = net.predict(x).unwrap();
        let predicted = if p[0] > p[1] { 0 } else { 1 };
        assert_eq!(y[predicted], 1.0);
    }
}

#[test]
fn predict_twice_is_bit_identical() {
    let mut net = xor_network(4);
    let x = Tensor::vector(vec![0.3, 0.9]);
    let a = net.predict(&x).unwrap();
    let b = net.predict(&x).unwrap();
    assert_eq!(a.as_slice(), b.as_slice());
}

#[test]
fn progress_is_reported_once_per_epoch() {
    let (xs, ys) = xor_data();
    let (tx, rx) = mpsc::channel();
    let config = TrainConfig {
        progress_tx: Some(tx),
        ..TrainConfig::new(5, 0.01)
    };
    let mut net = xor_network(1);
    let last = net.train(&xs, &ys, &config).unwrap();
    drop(config);

    let stats: Vec<_> = rx.iter().collect();
    assert_eq!(stats.len(), 5);
    assert_eq!(stats[0].epoch, 1);
    assert_eq!(stats[4].total_epochs, 5);
    assert_eq!(stats[4].train_loss, last);
}

#[test]
fn dropped_receiver_ends_training() {
    let (xs, ys) = xor_data();
    let (tx, rx) = mpsc::channel();
    drop(rx);
    let config = TrainConfig {
        progress_tx: Some(tx),
        ..TrainConfig::new(1000, 0.01)
    };
    let mut net = xor_network(1);
    assert!(net.train(&xs, &ys, &config).is_ok());
    assert_eq!(net.state(), NetworkState::Idle);
}

#[test]
fn raised_stop_flag_skips_every_epoch() {
    let (xs, ys) = xor_data();
    let flag = Arc::new(AtomicBool::new(true));
    let config = TrainConfig {
        stop_flag: Some(Arc::clone(&flag)),
        ..TrainConfig::new(10, 0.1)
    };
    let mut net = xor_network(2);
    let before = net.layer(0).unwrap().as_parameterized().unwrap().weights().to_vec();
    assert_eq!(net.train(&xs, &ys, &config).unwrap(), 0.0);
    let after = net.layer(0).unwrap().as_parameterized().unwrap().weights().to_vec();
    assert_eq!(before, after);
    assert!(flag.load(Ordering::Relaxed));
}

#[test]
fn mismatched_sample_counts_are_usage_errors() {
    let (xs, ys) = xor_data();
    let mut net = xor_network(0);
    let err = net.train(&xs, &ys[..3], &TrainConfig::new(1, 0.1)).unwrap_err();
    assert!(matches!(err, Error::SampleCountMismatch { inputs: 4, targets: 3 }));
    assert_eq!(err.kind(), ErrorKind::Usage);

    let err = net.train(&[], &[], &TrainConfig::new(1, 0.1)).unwrap_err();
    assert!(matches!(err, Error::EmptyDataset));
}

#[test]
fn wrong_sample_sizes_are_configuration_errors() {
    let mut net = xor_network(0);
    let xs = vec![Tensor::vector(vec![1.0, 2.0, 3.0])];
    let ys = vec![Tensor::vector(vec![1.0])];
    let err = net.train(&xs, &ys, &TrainConfig::new(1, 0.1)).unwrap_err();
    assert!(matches!(err, Error::LayerSizeMismatch { layer: 0, expected: 2, actual: 3, .. }));
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let xs = vec![Tensor::vector(vec![1.0, 2.0])];
    let ys = vec![Tensor::vector(vec![1.0, 0.0])];
    let err = net.train(&xs, &ys, &TrainConfig::new(1, 0.1)).unwrap_err();
    assert!(matches!(err, Error::LayerSizeMismatch { layer: 2, expected: 1, actual: 2, .. }));
}

#[test]
fn zero_batch_size_is_rejected_before_training() {
    let (xs, ys) = xor_data();
    let config = TrainConfig {
        mode: TrainingMode::Minibatch { batch_size: 0 },
        ..TrainConfig::new(1, 0.1)
    };
    assert!(matches!(
        xor_network(0).train(&xs, &ys, &config),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn non_finite_loss_aborts_the_run() {
    let mut net = xor_network(0);
    let xs = vec![Tensor::vector(vec![f64::NAN, 0.0])];
    let ys = vec![Tensor::vector(vec![0.0])];
    let err = net.train(&xs, &ys, &TrainConfig::new(3, 0.1)).unwrap_err();
    assert!(matches!(err, Error::NonFiniteLoss { epoch: 1, sample: 0, .. }));
    assert_eq!(err.kind(), ErrorKind::Numerical);
    assert_eq!(net.state(), NetworkState::Idle);
    // the run stops before the NaN can reach any parameter
    for layer in net.layers().iter().filter_map(|l| l.as_parameterized()) {
        assert!(layer.weights().iter().all(|w| w.as_slice().iter().all(|v| v.is_finite())));
    }
    assert!(net.predict(&Tensor::vector(vec![0.5, 0.5])).unwrap()[0].is_finite());
}

#[test]
fn ill_formed_convolution_fails_at_construction() {
    let err = ConvolutionalLayer::new(16, 3, 2, 1, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn backward_before_forward_is_a_usage_error() {
    let mut layer = DenseLayer::new(2, 2).unwrap();
    let err = layer.backward(&Tensor::vector(vec![1.0, 1.0])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
}
