use rand::distributions::uniform::SampleUniform;
use rand::Rng;

use crate::nn::Module;
use crate::tensor::functional;
use crate::tensor::{Float, Numeric, RcTensor, Result, TensorError, TensorLike, TensorList};

/// Fully connected layer computing `x @ weightᵀ + bias`.
#[derive(Debug)]
pub struct Linear<T>
where
    T: Numeric,
{
    pub weight: RcTensor<T>,
    pub bias: RcTensor<T>,
}

impl<T> Linear<T>
where
    T: Numeric,
{
    /// Builds a layer from existing tensors. `weight` is `(out, in)` and
    /// `bias` is `(out)`; both are marked as requiring gradients.
    pub fn from_tensors(weight: RcTensor<T>, bias: RcTensor<T>) -> Result<Self> {
        let fits = matches!(
            weight.shape(),
            &[out_features, _] if bias.shape() == [out_features].as_slice()
        );
        if !fits {
            return Err(TensorError::shape_mismatch(
                "linear",
                weight.shape(),
                bias.shape(),
            ));
        }
        Ok(Linear {
            weight: weight.requires_grad_(true),
            bias: bias.requires_grad_(true),
        })
    }

    pub fn in_features(&self) -> usize {
        self.weight.shape()[1]
    }

    pub fn out_features(&self) -> usize {
        self.weight.shape()[0]
    }
}

impl<T> Linear<T>
where
    T: Numeric + Float + SampleUniform,
{
    /// Weight and bias drawn from `U(-1/√in, 1/√in)`.
    pub fn new<R>(in_features: usize, out_features: usize, rng: &mut R) -> Result<Self>
    where
        R: Rng + ?Sized,
    {
        if in_features == 0 {
            return Err(TensorError::shape_mismatch(
                "linear",
                &[out_features, in_features],
                &[out_features],
            ));
        }
        let fan_in: T = num::cast(in_features).ok_or(TensorError::Cast(in_features))?;
        let bound = fan_in.sqrt().recip();
        let weight = RcTensor::uniform(-bound, bound, vec![out_features, in_features], rng)?;
        let bias = RcTensor::uniform(-bound, bound, vec![out_features], rng)?;
        Linear::from_tensors(weight, bias)
    }
}

impl<T: Numeric> crate::nn::module::private::Private for Linear<T> {}

impl<T: Numeric> Module<T> for Linear<T> {
    type InputType = RcTensor<T>;
    type OutputType = RcTensor<T>;

    fn forward(&self, batch: RcTensor<T>) -> Result<RcTensor<T>> {
        functional::linear(&batch, &self.weight, Some(&self.bias))
    }

    fn params(&self) -> TensorList<T> {
        vec![self.weight.clone(), self.bias.clone()]
    }

    fn update_params(&mut self, new_params: TensorList<T>) -> Result<()> {
        let [weight, bias]: [RcTensor<T>; 2] =
            new_params.try_into().map_err(|params: TensorList<T>| {
                TensorError::shape_mismatch("update_params", &[2], &[params.len()])
            })?;
        if !weight.same_shape(&self.weight) || !bias.same_shape(&self.bias) {
            return Err(TensorError::shape_mismatch(
                "update_params",
                self.weight.shape(),
                weight.shape(),
            ));
        }
        self.weight = weight;
        self.bias = bias;
        Ok(())
    }
}

#[test]
fn test_layer_no_grad() {
    let layer = Linear::from_tensors(
        RcTensor::new_with_filler(vec![2, 2], 1.0),
        RcTensor::new_with_filler(vec![2], 1.0),
    )
    .unwrap();
    let input = RcTensor::new(vec![1.0, 2.0], vec![1, 2]).unwrap();
    let res = layer.forward(input).unwrap();
    let expected = RcTensor::new(vec![4.0, 4.0], vec![1, 2]).unwrap();

    assert_eq!(res, expected);
}

#[test]
fn test_layer_sets_grads() {
    let layer = Linear::from_tensors(
        RcTensor::from([[1.0, -2.0], [-1.1, 0.7]]),
        RcTensor::new_with_filler(vec![2], 1.0),
    )
    .unwrap();
    let input = RcTensor::new(vec![1.0, 2.0], vec![1, 2]).unwrap();
    let res = layer.forward(input.clone()).unwrap();
    functional::sum(&res).backward().unwrap();
    assert_eq!(
        layer.weight.grad(),
        Some(RcTensor::from([[1.0, 2.0], [1.0, 2.0]]))
    );
    assert_eq!(layer.bias.grad(), Some(RcTensor::from([1.0, 1.0])));

    // a second pass without zeroing accumulates
    let res = layer.forward(input).unwrap();
    functional::sum(&res).backward().unwrap();
    assert_eq!(layer.bias.grad(), Some(RcTensor::from([2.0, 2.0])));

    layer.zero_grad();
    assert_eq!(layer.weight.grad(), None);
}

#[test]
fn test_from_tensors_checks_bias() {
    let result = Linear::from_tensors(
        RcTensor::new_with_filler(vec![10, 784], 0.0),
        RcTensor::new_with_filler(vec![9], 0.0),
    );
    assert!(result.is_err());
}

#[test]
fn test_new_initialises_within_bound() {
    use rand::SeedableRng;
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let layer: Linear<f32> = Linear::new(784, 10, &mut rng).unwrap();
    assert_eq!(layer.weight.shape(), &[10, 784]);
    assert_eq!(layer.bias.shape(), &[10]);
    assert_eq!((layer.in_features(), layer.out_features()), (784, 10));

    let bound = 1.0 / 28.0;
    assert!(layer.weight.iter().all(|w| w.abs() <= bound));
    assert!(layer.bias.iter().all(|b| b.abs() <= bound));
    assert!(layer.weight.requires_grad() && layer.bias.requires_grad());
}

#[test]
fn test_update_params_rejects_wrong_count() {
    let mut layer = Linear::from_tensors(
        RcTensor::new_with_filler(vec![2, 2], 1.0),
        RcTensor::new_with_filler(vec![2], 1.0),
    )
    .unwrap();
    let weight = layer.weight.clone();
    assert!(layer.update_params(vec![weight]).is_err());
}
