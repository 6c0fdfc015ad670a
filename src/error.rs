use thiserror::Error;

/// Broad classes of failure. Every one of them is fatal to the current call;
/// the engine never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Layer sizes, kernel/stride combinations or tensor shapes that can never work.
    Configuration,
    /// NaN/Inf produced while training.
    Numerical,
    /// Calls made in the wrong order or with inconsistent arguments.
    Usage,
    /// Failure reading or writing a `NetworkSpec` file.
    Io,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("shape mismatch in {op}: {left:?} vs {right:?}")]
    ShapeMismatch {
        op: &'static str,
        left: [usize; 3],
        right: [usize; 3],
    },

    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("layer {layer} ({kind}) expects {expected} inputs, got {actual}")]
    LayerSizeMismatch {
        layer: usize,
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{kind} layer expects {expected} values, got {actual}")]
    InputSizeMismatch {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{0} layer received a gradient before any forward pass")]
    BackwardBeforeForward(&'static str),

    #[error("got {inputs} inputs but {targets} targets")]
    SampleCountMismatch { inputs: usize, targets: usize },

    #[error("training set is empty")]
    EmptyDataset,

    #[error("loss became {value} at epoch {epoch}, sample {sample}")]
    NonFiniteLoss {
        epoch: usize,
        sample: usize,
        value: f64,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ShapeMismatch { .. }
            | Error::InvalidShape(_)
            | Error::InvalidConfig(_)
            | Error::LayerSizeMismatch { .. }
            | Error::InputSizeMismatch { .. } => ErrorKind::Configuration,
            Error::NonFiniteLoss { .. } => ErrorKind::Numerical,
            Error::BackwardBeforeForward(_)
            | Error::SampleCountMismatch { .. }
            | Error::EmptyDataset => ErrorKind::Usage,
            Error::Io(_) | Error::Json(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
