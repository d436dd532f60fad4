use std::fmt;
use std::time::{Duration, Instant};

/// Running loss between two reports, plus the time since the last one.
#[derive(Debug)]
pub struct LossMeter {
    running_loss: f64,
    divisor: f64,
    started: Instant,
}

impl LossMeter {
    pub fn new(divisor: f64) -> Self {
        Self {
            running_loss: 0.0,
            divisor,
            started: Instant::now(),
        }
    }

    pub fn record(&mut self, loss: f32) {
        self.running_loss += f64::from(loss);
    }

    pub fn running_loss(&self) -> f64 {
        self.running_loss
    }

    /// Returns `(running_loss / divisor, elapsed)` and starts a new window.
    pub fn flush(&mut self) -> (f64, Duration) {
        let average = self.running_loss / self.divisor;
        let elapsed = self.started.elapsed();
        self.running_loss = 0.0;
        self.started = Instant::now();
        (average, elapsed)
    }
}

/// One metrics line.
///
/// ```
/// use std::time::Duration;
/// use mnist_sgd::train::Report;
///
/// let report = Report {
///     epoch: 1,
///     batch: 1,
///     loss: 0.023_456,
///     elapsed: Duration::from_millis(1500),
/// };
/// assert_eq!(
///     report.to_string(),
///     "[Epoch 1, Batch     1] loss: 0.023 time: 1.5"
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub epoch: usize,
    pub batch: usize,
    pub loss: f64,
    pub elapsed: Duration,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Epoch {}, Batch {:5}] loss: {:.3} time: ",
            self.epoch, self.batch, self.loss
        )?;
        let secs = self.elapsed.as_secs_f64();
        // whole seconds keep their trailing ".0"
        if secs.fract() == 0.0 {
            write!(f, "{secs:.1}")
        } else {
            write!(f, "{secs}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn flush_divides_by_fixed_divisor_and_resets() {
        let mut meter = LossMeter::new(100.0);
        for _ in 0..10 {
            meter.record(2.0);
        }
        let (average, _) = meter.flush();
        assert_relative_eq!(average, 0.2);
        assert_eq!(meter.running_loss(), 0.0);
    }

    #[test]
    fn report_pads_batch_number() {
        let report = Report {
            epoch: 1,
            batch: 12001,
            loss: 2.2,
            elapsed: Duration::from_secs(3),
        };
        assert_eq!(report.to_string(), "[Epoch 1, Batch 12001] loss: 2.200 time: 3.0");
    }

    #[test]
    fn report_prints_fractional_seconds_in_full() {
        let report = Report {
            epoch: 1,
            batch: 1001,
            loss: 0.0,
            elapsed: Duration::from_millis(2250),
        };
        assert_eq!(
            report.to_string(),
            "[Epoch 1, Batch  1001] loss: 0.000 time: 2.25"
        );
    }
}
