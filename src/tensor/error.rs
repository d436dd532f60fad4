use thiserror::Error;

use super::Device;

/// Errors raised by tensor construction and tensor operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TensorError {
    /// The shapes involved in an operation are not compatible.
    #[error("shape mismatch in {op}: {left:?} vs {right:?}")]
    ShapeMismatch {
        op: &'static str,
        left: Vec<usize>,
        right: Vec<usize>,
    },

    /// Two operands live on different devices.
    #[error("device mismatch in {op}: {left} vs {right}")]
    DeviceMismatch {
        op: &'static str,
        left: Device,
        right: Device,
    },

    /// The requested device has no kernels in this build.
    #[error("device {0} is not available")]
    DeviceUnavailable(Device),

    /// A class label fell outside `[0, num_classes)`.
    #[error("target {target} at position {position} is out of bounds for {num_classes} classes")]
    InvalidClassIndex {
        position: usize,
        target: i64,
        num_classes: usize,
    },

    #[error("index {index:?} is out of bounds for shape {shape:?}")]
    IndexOutOfBounds {
        index: Vec<usize>,
        shape: Vec<usize>,
    },

    /// An operation that needs exactly one element got more.
    #[error("expected a single element but tensor has shape {0:?}")]
    NotAScalar(Vec<usize>),

    #[error("tensor has no gradient")]
    NoGradient,

    #[error("array of length {len} cannot be viewed as shape {shape:?}")]
    InvalidLength { len: usize, shape: Vec<usize> },

    #[error("cannot sample from the empty range {0}")]
    InvalidRange(String),

    /// A count could not be represented in the element type.
    #[error("{0} cannot be represented in the element type")]
    Cast(usize),
}

impl TensorError {
    pub(crate) fn shape_mismatch(op: &'static str, left: &[usize], right: &[usize]) -> Self {
        Self::ShapeMismatch {
            op,
            left: left.to_vec(),
            right: right.to_vec(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TensorError>;
