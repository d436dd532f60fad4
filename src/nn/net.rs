use rand::distributions::uniform::SampleUniform;
use rand::Rng;

use crate::nn::{Linear, Module};
use crate::tensor::functional;
use crate::tensor::{Float, Numeric, RcTensor, Result, TensorList};

/// Pixels in one 28 × 28 single-channel image.
pub const IMAGE_FEATURES: usize = 28 * 28;
pub const NUM_CLASSES: usize = 10;

/// The classifier: flatten every sample, then one [`Linear`] layer onto the
/// class scores.
#[derive(Debug)]
pub struct Net<T: Numeric> {
    fc: Linear<T>,
}

impl<T: Numeric> Net<T> {
    pub fn from_linear(fc: Linear<T>) -> Net<T> {
        Net { fc }
    }
}

impl<T> Net<T>
where
    T: Numeric + Float + SampleUniform,
{
    pub fn new<R>(rng: &mut R) -> Result<Net<T>>
    where
        R: Rng + ?Sized,
    {
        Ok(Net {
            fc: Linear::new(IMAGE_FEATURES, NUM_CLASSES, rng)?,
        })
    }
}

impl<T: Numeric> crate::nn::module::private::Private for Net<T> {}

impl<T: Numeric> Module<T> for Net<T> {
    type InputType = RcTensor<T>;
    type OutputType = RcTensor<T>;

    /// `(B, 1, 28, 28)` in, `(B, 10)` out.
    fn forward(&self, batch: RcTensor<T>) -> Result<RcTensor<T>> {
        self.fc.forward(functional::flatten(&batch, 1)?)
    }

    fn params(&self) -> TensorList<T> {
        self.fc.params()
    }

    fn update_params(&mut self, new_params: TensorList<T>) -> Result<()> {
        self.fc.update_params(new_params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{TensorError, TensorLike};
    use rand::SeedableRng;

    #[test]
    fn output_has_one_score_per_class() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let net: Net<f32> = Net::new(&mut rng).unwrap();
        for batch_size in [1, 3, 64] {
            let input = RcTensor::randn(vec![batch_size, 1, 28, 28], &mut rng);
            let output = net.forward(input).unwrap();
            assert_eq!(output.shape(), &[batch_size, NUM_CLASSES]);
        }
    }

    #[test]
    fn wrong_image_size_is_a_shape_error() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let net: Net<f32> = Net::new(&mut rng).unwrap();
        let input = RcTensor::randn(vec![4, 1, 27, 28], &mut rng);
        assert!(matches!(
            net.forward(input),
            Err(TensorError::ShapeMismatch { op: "matmul", .. })
        ));
    }

    #[test]
    fn params_are_weight_then_bias() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let net: Net<f64> = Net::new(&mut rng).unwrap();
        let params = net.params();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].shape(), &[NUM_CLASSES, IMAGE_FEATURES]);
        assert_eq!(params[1].shape(), &[NUM_CLASSES]);
    }
}
