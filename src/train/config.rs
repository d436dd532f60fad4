use super::{Result, TrainError};

/// Settings for one training run.
///
/// ```
/// use mnist_sgd::train::TrainConfig;
///
/// let config = TrainConfig::default();
/// assert_eq!(config.batch_size, 64);
/// assert_eq!(config.log_interval, 1000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub batch_size: usize,
    pub learning_rate: f32,
    pub momentum: f32,
    /// A metrics line is written whenever `iteration % log_interval == 0`.
    pub log_interval: usize,
    /// The running loss is divided by this, not by the number of iterations
    /// since the last report.
    pub loss_divisor: f64,
    pub max_iterations: usize,
    /// Labels are sampled from `[0, sampled_classes)`.
    pub sampled_classes: i64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            learning_rate: 0.01,
            momentum: 0.5,
            log_interval: 1000,
            loss_divisor: 100.0,
            max_iterations: 100_000_000,
            sampled_classes: 9,
        }
    }
}

impl TrainConfig {
    /// Checks the loop settings. Optimizer settings are checked by the
    /// optimizer itself.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(TrainError::invalid_config("batch size must be positive"));
        }
        if self.log_interval == 0 {
            return Err(TrainError::invalid_config("log interval must be positive"));
        }
        if !(self.loss_divisor > 0.0) {
            return Err(TrainError::invalid_config(format!(
                "loss divisor must be positive, got {}",
                self.loss_divisor
            )));
        }
        if self.sampled_classes <= 0 {
            return Err(TrainError::invalid_config(format!(
                "at least one class must be sampled, got {}",
                self.sampled_classes
            )));
        }
        Ok(())
    }
}

#[test]
fn test_validate_rejects_zero_interval() {
    let config = TrainConfig {
        log_interval: 0,
        ..TrainConfig::default()
    };
    assert!(matches!(config.validate(), Err(TrainError::InvalidConfig(_))));
}

#[test]
fn test_validate_rejects_empty_batches() {
    let config = TrainConfig {
        batch_size: 0,
        ..TrainConfig::default()
    };
    assert!(config.validate().is_err());
}
