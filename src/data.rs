//! Random stand-ins for MNIST batches.
//!
//! No dataset is read: every batch is freshly sampled noise in the shape of a
//! batch of 28 × 28 grey-scale digits.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::tensor::{Device, RcTensor, Result};

pub const IMAGE_SHAPE: [usize; 3] = [1, 28, 28];

/// One training batch: `inputs (B, 1, 28, 28)` and `targets (B)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub inputs: RcTensor<f32>,
    pub targets: RcTensor<i64>,
}

impl Batch {
    pub fn to(&self, device: Device) -> Result<Batch> {
        Ok(Batch {
            inputs: self.inputs.to(device)?,
            targets: self.targets.to(device)?,
        })
    }
}

/// An endless source of random batches.
///
/// Labels are drawn from `[0, sampled_classes)`. The training binary uses 9
/// there, so class 9 never appears even though the model scores 10 classes.
#[derive(Debug)]
pub struct SyntheticBatches<R: Rng> {
    rng: R,
    batch_size: usize,
    sampled_classes: i64,
}

impl SyntheticBatches<StdRng> {
    pub fn seeded(batch_size: usize, sampled_classes: i64, seed: u64) -> Self {
        SyntheticBatches::new(StdRng::seed_from_u64(seed), batch_size, sampled_classes)
    }
}

impl<R: Rng> SyntheticBatches<R> {
    pub fn new(rng: R, batch_size: usize, sampled_classes: i64) -> Self {
        SyntheticBatches {
            rng,
            batch_size,
            sampled_classes,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn sampled_classes(&self) -> i64 {
        self.sampled_classes
    }

    pub fn next_batch(&mut self) -> Result<Batch> {
        let mut shape = vec![self.batch_size];
        shape.extend(IMAGE_SHAPE);
        let inputs = RcTensor::randn(shape, &mut self.rng);
        let targets =
            RcTensor::randint(0, self.sampled_classes, vec![self.batch_size], &mut self.rng)?;
        Ok(Batch { inputs, targets })
    }
}

impl<R: Rng> Iterator for SyntheticBatches<R> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_batch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{TensorError, TensorLike};

    #[test]
    fn batches_have_mnist_shapes() {
        let mut batches = SyntheticBatches::seeded(64, 9, 7);
        let batch = batches.next_batch().unwrap();
        assert_eq!(batch.inputs.shape(), &[64, 1, 28, 28]);
        assert_eq!(batch.targets.shape(), &[64]);
        assert!(!batch.inputs.requires_grad());
    }

    #[test]
    fn class_nine_is_never_sampled() {
        let batches = SyntheticBatches::seeded(64, 9, 7);
        for batch in batches.take(50) {
            let batch = batch.unwrap();
            assert!(batch.targets.iter().all(|&t| (0..9).contains(&t)));
        }
    }

    #[test]
    fn consecutive_batches_differ() {
        let mut batches = SyntheticBatches::seeded(4, 9, 7);
        let first = batches.next_batch().unwrap();
        let second = batches.next_batch().unwrap();
        assert_ne!(first.inputs, second.inputs);
    }

    #[test]
    fn empty_label_range_is_an_error() {
        let mut batches = SyntheticBatches::seeded(4, 0, 7);
        assert!(matches!(
            batches.next_batch(),
            Err(TensorError::InvalidRange(_))
        ));
    }

    #[test]
    fn batches_move_to_the_cpu() {
        let batch = SyntheticBatches::seeded(2, 9, 7).next_batch().unwrap();
        assert_eq!(batch.to(Device::Cpu).unwrap(), batch);
        assert!(batch.to(Device::Cuda(0)).is_err());
    }
}
