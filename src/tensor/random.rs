use rand::distributions::uniform::SampleUniform;
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use rand_distr::StandardNormal;

use super::error::{Result, TensorError};
use super::numeric::*;
use super::{RawTensor, RcTensor};

impl<T: Numeric> RcTensor<T> {
    /// Samples every element from a standard normal distribution.
    pub fn randn<R>(shape: Vec<usize>, rng: &mut R) -> RcTensor<T>
    where
        R: Rng + ?Sized,
        StandardNormal: Distribution<T>,
    {
        let total = shape.iter().product::<usize>();
        let array = Distribution::<T>::sample_iter(StandardNormal, rng)
            .take(total)
            .collect();
        RcTensor::from_raw(RawTensor::from_parts(array, shape, Default::default()))
    }

    /// Samples every element uniformly from the half open range `[low, high)`.
    ///
    /// ```
    /// # use mnist_sgd::tensor::*;
    /// # use rand::SeedableRng;
    /// let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    /// let labels = RcTensor::<i64>::uniform(0, 9, vec![64], &mut rng).unwrap();
    /// assert!(labels.iter().all(|&label| (0..9).contains(&label)));
    /// ```
    pub fn uniform<R>(low: T, high: T, shape: Vec<usize>, rng: &mut R) -> Result<RcTensor<T>>
    where
        R: Rng + ?Sized,
        T: SampleUniform,
    {
        if low >= high {
            return Err(TensorError::InvalidRange(format!("[{low}, {high})")));
        }
        let total = shape.iter().product::<usize>();
        let array = Uniform::new(low, high)
            .sample_iter(rng)
            .take(total)
            .collect();
        Ok(RcTensor::from_raw(RawTensor::from_parts(
            array,
            shape,
            Default::default(),
        )))
    }
}

impl RcTensor<i64> {
    /// Integer labels drawn uniformly from `[low, high)`.
    pub fn randint<R>(low: i64, high: i64, shape: Vec<usize>, rng: &mut R) -> Result<RcTensor<i64>>
    where
        R: Rng + ?Sized,
    {
        RcTensor::uniform(low, high, shape, rng)
    }
}

#[test]
fn test_randn_shape_and_spread() {
    use super::TensorLike;
    use rand::SeedableRng;
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let tensor = RcTensor::<f64>::randn(vec![64, 1, 28, 28], &mut rng);
    assert_eq!(tensor.shape(), &[64, 1, 28, 28]);

    let n = tensor.count() as f64;
    let mean = tensor.iter().sum::<f64>() / n;
    let variance = tensor.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    assert!(mean.abs() < 0.05, "mean={mean}");
    assert!((variance - 1.0).abs() < 0.05, "variance={variance}");
}

#[test]
fn test_randint_empty_range() {
    use rand::SeedableRng;
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    assert!(RcTensor::randint(3, 3, vec![4], &mut rng).is_err());
}
