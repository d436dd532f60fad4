use thiserror::Error;

use crate::tensor::TensorError;

/// Errors from the optimizer and the training loop.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Tensor(#[from] TensorError),

    /// A hyperparameter or loop setting is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Writing a metrics line failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrainError {
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, TrainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_errors_pass_through() {
        let err: TrainError = TensorError::NoGradient.into();
        assert_eq!(err.to_string(), TensorError::NoGradient.to_string());
    }

    #[test]
    fn invalid_config_display() {
        let err = TrainError::invalid_config("batch size must be positive");
        assert_eq!(
            err.to_string(),
            "invalid configuration: batch size must be positive"
        );
    }
}
