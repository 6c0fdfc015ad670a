use serde::{Deserialize, Serialize};

/// Element-wise activation functions.
///
/// Softmax is not listed here: it couples every output to every input, so it
/// lives in its own layer (`layers::softmax::SoftmaxLayer`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFunction {
    Sigmoid,
    #[serde(rename = "relu")]
    ReLU,
    Tanh,
    Identity,
    #[serde(rename = "leaky_relu")]
    LeakyReLU { alpha: f64 },
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            ActivationFunction::ReLU => if x < 0.0 { 0.0 } else { x },
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::Identity => x,
            ActivationFunction::LeakyReLU { alpha } => if x < 0.0 { alpha * x } else { x },
        }
    }

    /// Derivative evaluated at the pre-activation `x`.
    ///
    /// ReLU uses 0 at the kink. The piecewise variants return NaN for a NaN
    /// input.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => {
                let fx = self.function(x);
                fx * (1.0 - fx)
            }
            ActivationFunction::ReLU => match x {
                x if x > 0.0 => 1.0,
                x if x <= 0.0 => 0.0,
                _ => f64::NAN,
            },
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::Identity => 1.0,
            ActivationFunction::LeakyReLU { alpha } => match x {
                x if x > 0.0 => 1.0,
                x if x <= 0.0 => *alpha,
                _ => f64::NAN,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActivationFunction::Sigmoid => "sigmoid",
            ActivationFunction::ReLU => "relu",
            ActivationFunction::Tanh => "tanh",
            ActivationFunction::Identity => "identity",
            ActivationFunction::LeakyReLU { .. } => "leaky_relu",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ALL: [ActivationFunction; 5] = [
        ActivationFunction::Sigmoid,
        ActivationFunction::ReLU,
        ActivationFunction::Tanh,
        ActivationFunction::Identity,
        ActivationFunction::LeakyReLU { alpha: 0.1 },
    ];

    #[test]
    fn derivatives_match_central_differences() {
        let h = 1e-6;
        for f in ALL {
            for &x in &[-1.7, -0.3, 0.4, 2.2] {
                let numeric = (f.function(x + h) - f.function(x - h)) / (2.0 * h);
                assert_relative_eq!(f.derivative(x), numeric, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn relu_is_flat_at_and_below_zero() {
        assert_eq!(ActivationFunction::ReLU.function(-3.0), 0.0);
        assert_eq!(ActivationFunction::ReLU.derivative(0.0), 0.0);
        assert_eq!(ActivationFunction::ReLU.derivative(0.5), 1.0);
    }

    #[test]
    fn nan_passes_through_every_function() {
        for f in ALL {
            assert!(f.function(f64::NAN).is_nan(), "{} hid a NaN", f.name());
        }
        assert!(ActivationFunction::ReLU.derivative(f64::NAN).is_nan());
        assert!(ActivationFunction::LeakyReLU { alpha: 0.1 }.derivative(f64::NAN).is_nan());
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&ActivationFunction::ReLU).unwrap();
        assert_eq!(json, "\"relu\"");
        let tanh: ActivationFunction = serde_json::from_str("\"tanh\"").unwrap();
        assert_eq!(tanh, ActivationFunction::Tanh);
    }
}
