//! The training loop and its supporting state.

mod cancel;
mod config;
mod meter;

use std::io::Write;

use rand::Rng;
use tracing::{debug, info, warn};

pub use cancel::CancellationToken;
pub use config::TrainConfig;
pub use crate::error::{Result, TrainError};
pub use meter::{LossMeter, Report};

use crate::data::{Batch, SyntheticBatches};
use crate::nn::Module;
use crate::optim::Sgd;
use crate::tensor::{functional, Device, RcTensor, TensorLike};

/// What a finished (or cancelled) run did.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub iterations: usize,
    pub reports: usize,
    pub cancelled: bool,
    pub last_loss: Option<f32>,
}

/// Owns everything a run mutates: the model, the optimizer and the device
/// they live on.
#[derive(Debug)]
pub struct Trainer<M> {
    model: M,
    optimizer: Sgd<f32>,
    device: Device,
    config: TrainConfig,
}

impl<M> Trainer<M>
where
    M: Module<f32, InputType = RcTensor<f32>, OutputType = RcTensor<f32>>,
{
    /// Moves `model` to `device` and sets up its optimizer.
    pub fn new(mut model: M, device: Device, config: TrainConfig) -> Result<Self> {
        config.validate()?;
        model.to(device)?;
        let optimizer = Sgd::new(&model.params(), config.learning_rate, config.momentum)?;
        info!(%device, ?config, "trainer ready");
        Ok(Self {
            model,
            optimizer,
            device,
            config,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn optimizer(&self) -> &Sgd<f32> {
        &self.optimizer
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// A batch source shaped by this trainer's config.
    pub fn batches<R: Rng>(&self, rng: R) -> SyntheticBatches<R> {
        SyntheticBatches::new(rng, self.config.batch_size, self.config.sampled_classes)
    }

    /// Forward, backward and update for one batch. Returns the batch loss.
    pub fn train_step(&mut self, batch: &Batch) -> Result<f32> {
        let batch = batch.to(self.device)?;
        self.optimizer.zero_grad(&self.model);
        let output = self.model.forward(batch.inputs)?;
        let loss = functional::cross_entropy(&output, &batch.targets)?;
        // cleared a second time on purpose; the first clear already did the work
        self.optimizer.zero_grad(&self.model);
        loss.backward()?;
        self.optimizer.step(&mut self.model)?;
        Ok(loss.elem()?)
    }

    /// Runs up to `config.max_iterations` steps on batches from `batches`,
    /// writing a [`Report`] line to `out` every `config.log_interval`
    /// iterations, starting with the first.
    ///
    /// `epoch` is zero-based; reports print it one-based.
    pub fn train<R, W>(
        &mut self,
        epoch: usize,
        batches: &mut SyntheticBatches<R>,
        cancel: &CancellationToken,
        out: &mut W,
    ) -> Result<TrainSummary>
    where
        R: Rng,
        W: Write,
    {
        if batches.batch_size() != self.config.batch_size
            || batches.sampled_classes() != self.config.sampled_classes
        {
            return Err(TrainError::invalid_config(format!(
                "batch source yields {} samples over {} classes, config expects {} over {}",
                batches.batch_size(),
                batches.sampled_classes(),
                self.config.batch_size,
                self.config.sampled_classes
            )));
        }
        info!(
            epoch,
            max_iterations = self.config.max_iterations,
            batch_size = batches.batch_size(),
            "starting training"
        );
        let mut summary = TrainSummary {
            iterations: 0,
            reports: 0,
            cancelled: false,
            last_loss: None,
        };
        let mut meter = LossMeter::new(self.config.loss_divisor);

        for i in 0..self.config.max_iterations {
            if cancel.is_cancelled() {
                info!(iterations = summary.iterations, "training cancelled");
                summary.cancelled = true;
                break;
            }

            let batch = batches.next_batch()?;
            let loss = self.train_step(&batch)?;
            if !loss.is_finite() {
                warn!(iteration = i, loss, "non-finite loss");
            }
            meter.record(loss);
            summary.iterations += 1;
            summary.last_loss = Some(loss);

            if i % self.config.log_interval == 0 {
                let (average, elapsed) = meter.flush();
                let report = Report {
                    epoch: epoch + 1,
                    batch: i + 1,
                    loss: average,
                    elapsed,
                };
                writeln!(out, "{report}")?;
                summary.reports += 1;
                debug!(iteration = i, loss = average, "reported");
            }
        }

        info!(
            iterations = summary.iterations,
            reports = summary.reports,
            "training finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{Linear, Net, IMAGE_FEATURES, NUM_CLASSES};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_config(max_iterations: usize) -> TrainConfig {
        TrainConfig {
            batch_size: 2,
            max_iterations,
            ..TrainConfig::default()
        }
    }

    fn trainer(max_iterations: usize) -> Trainer<Net<f32>> {
        let mut rng = StdRng::seed_from_u64(42);
        let net = Net::new(&mut rng).unwrap();
        Trainer::new(net, Device::Cpu, small_config(max_iterations)).unwrap()
    }

    fn run(trainer: &mut Trainer<Net<f32>>, cancel: &CancellationToken) -> (TrainSummary, String) {
        let mut batches = trainer.batches(StdRng::seed_from_u64(1));
        let mut out = Vec::new();
        let summary = trainer.train(0, &mut batches, cancel, &mut out).unwrap();
        (summary, String::from_utf8(out).unwrap())
    }

    #[test]
    fn first_iteration_is_reported() {
        let mut trainer = trainer(1);
        let (summary, out) = run(&mut trainer, &CancellationToken::new());
        assert_eq!(summary.iterations, 1);
        assert_eq!(summary.reports, 1);
        assert!(out.starts_with("[Epoch 1, Batch     1] loss: 0.0"));
        assert!(summary.last_loss.unwrap().is_finite());
    }

    #[test]
    fn one_line_per_thousand_iterations() {
        let mut trainer = trainer(1000);
        let (summary, out) = run(&mut trainer, &CancellationToken::new());
        assert_eq!(summary.iterations, 1000);
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn cancelled_token_stops_before_the_first_step() {
        let mut trainer = trainer(10);
        let before = trainer.model().params();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (summary, out) = run(&mut trainer, &cancel);
        assert!(summary.cancelled);
        assert_eq!(summary.iterations, 0);
        assert!(out.is_empty());
        assert_eq!(trainer.model().params(), before);
    }

    #[test]
    fn train_step_updates_parameters() {
        let mut trainer = trainer(1);
        let before: Vec<Vec<f32>> = trainer.model().params().iter().map(|p| p.to_vec()).collect();
        let batch = SyntheticBatches::seeded(4, 9, 3).next_batch().unwrap();
        let loss = trainer.train_step(&batch).unwrap();
        assert!(loss.is_finite() && loss >= 0.0);
        for (param, old) in trainer.model().params().iter().zip(before) {
            assert_ne!(param.to_vec(), old);
        }
        // the velocity now holds the first gradient
        assert!(trainer.optimizer().velocity().iter().flatten().any(|&v| v != 0.0));
    }

    #[test]
    fn mismatched_batch_source_is_rejected() {
        let mut trainer = trainer(1);
        let cancel = CancellationToken::new();
        for mut batches in [
            SyntheticBatches::seeded(3, 9, 1),
            SyntheticBatches::seeded(2, 10, 1),
        ] {
            let result = trainer.train(0, &mut batches, &cancel, &mut std::io::sink());
            assert!(matches!(result, Err(TrainError::InvalidConfig(_))));
        }
    }

    #[test]
    fn cuda_device_is_rejected() {
        let mut rng = StdRng::seed_from_u64(42);
        let net: Net<f32> = Net::new(&mut rng).unwrap();
        assert!(matches!(
            Trainer::new(net, Device::Cuda(0), TrainConfig::default()),
            Err(TrainError::Tensor(_))
        ));
    }

    #[test]
    fn invalid_learning_rate_is_rejected() {
        let layer = Linear::from_tensors(
            RcTensor::zeros(vec![NUM_CLASSES, IMAGE_FEATURES]),
            RcTensor::zeros(vec![NUM_CLASSES]),
        )
        .unwrap();
        let config = TrainConfig {
            learning_rate: -1.0,
            ..TrainConfig::default()
        };
        assert!(matches!(
            Trainer::new(Net::from_linear(layer), Device::Cpu, config),
            Err(TrainError::InvalidConfig(_))
        ));
    }
}
