use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used across the crate.
pub type Result<T> = std::result::Result<T, NetError>;

/// Broad classification of a `NetError`.
///
/// Configuration errors mean the caller handed in something inconsistent
/// with the network's hyperparameters; numeric errors mean the computation
/// itself produced non-finite values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Numeric,
}

/// The crate's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum NetError {
    /// A hyperparameter is invalid (zero dimension, even filter, bad scale...).
    Configuration(String),
    /// A tensor does not have the shape the network was configured for.
    ShapeMismatch {
        what: &'static str,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    /// A ground-truth label is not a valid class index.
    LabelOutOfRange {
        index: usize,
        label: usize,
        num_classes: usize,
    },
    /// A NaN or infinity showed up where a finite value is required.
    NonFinite { what: &'static str },
}

impl NetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetError::NonFinite { .. } => ErrorKind::Numeric,
            _ => ErrorKind::Configuration,
        }
    }
}

impl Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::Configuration(reason) => write!(f, "invalid configuration: {reason}"),
            NetError::ShapeMismatch { what, got, expected } => {
                write!(f, "shape mismatch for {what}: got {got:?}, expected {expected:?}")
            }
            NetError::LabelOutOfRange {
                index,
                label,
                num_classes,
            } => write!(
                f,
                "label {label} at position {index} is outside [0, {num_classes})"
            ),
            NetError::NonFinite { what } => write!(f, "non-finite values encountered in {what}"),
        }
    }
}

impl Error for NetError {}
