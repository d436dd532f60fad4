use crate::tensor::autograd::{record, same_device, GradList};
use crate::tensor::numeric::*;
use crate::tensor::utils::{broadcast_index, max_shape, IndexIterator};
use crate::tensor::{RawTensor, RcTensor, Result, Scalar, TensorError, TensorLike};

use super::cast;

/// Element-wise sum with broadcasting on trailing dimensions.
///
/// ```
/// # use mnist_sgd::tensor::*;
/// let matrix = RcTensor::from([[1.0, 2.0], [3.0, 4.0]]);
/// let bias = RcTensor::from([10.0, 20.0]);
/// let res = functional::add(&matrix, &bias).unwrap();
/// assert_eq!(res, RcTensor::from([[11.0, 22.0], [13.0, 24.0]]));
/// ```
pub fn add<T: Numeric>(left: &RcTensor<T>, right: &RcTensor<T>) -> Result<RcTensor<T>> {
    let device = same_device("add", &[left, right])?;
    if !left.broadcastable(right.shape()) {
        return Err(TensorError::shape_mismatch(
            "add",
            left.shape(),
            right.shape(),
        ));
    }
    let out_shape = max_shape(left.shape(), right.shape());
    let array = if left.shape() == right.shape() {
        left.iter().zip(right.iter()).map(|(&l, &r)| l + r).collect()
    } else {
        IndexIterator::new(out_shape.clone())
            .map(|idx| {
                left.as_slice()[broadcast_index(&idx, left.shape())]
                    + right.as_slice()[broadcast_index(&idx, right.shape())]
            })
            .collect()
    };
    Ok(record(
        RawTensor::from_parts(array, out_shape, device),
        vec![left.clone(), right.clone()],
        add_vjp,
        concat!("add, ", file!(), ":", line!()),
    ))
}

fn add_vjp<T: Numeric>(inputs: &[RcTensor<T>], grad: &RcTensor<T>) -> Result<GradList<T>> {
    Ok(inputs
        .iter()
        .map(|input| input.requires_grad().then(|| reduce_to_shape(grad, input.shape())))
        .collect())
}

/// Sums a broadcast gradient back down to the shape of the operand.
fn reduce_to_shape<T: Numeric>(grad: &RcTensor<T>, shape: &[usize]) -> RcTensor<T> {
    if grad.shape() == shape {
        return grad.detach();
    }
    let mut array = vec![T::zero(); shape.iter().product()];
    for (idx, &g) in grad.iter_indices().zip(grad.iter()) {
        array[broadcast_index(&idx, shape)] += g;
    }
    RcTensor::from_raw(RawTensor::from_parts(array, shape.to_vec(), grad.device()))
}

/// Sum of all elements, as a scalar.
pub fn sum<T: Numeric>(tensor: &RcTensor<T>) -> Scalar<T> {
    let total = tensor.iter().fold(T::zero(), |acc, &x| acc + x);
    record(
        RawTensor::from_parts(vec![total], vec![], tensor.device()),
        vec![tensor.clone()],
        sum_vjp,
        concat!("sum, ", file!(), ":", line!()),
    )
}

fn sum_vjp<T: Numeric>(inputs: &[RcTensor<T>], grad: &RcTensor<T>) -> Result<GradList<T>> {
    let g = grad.elem()?;
    let input = &inputs[0];
    Ok(vec![Some(RcTensor::from_raw(RawTensor::from_parts(
        vec![g; input.count()],
        input.shape().to_vec(),
        input.device(),
    )))])
}

/// Mean of all elements, as a scalar.
pub fn mean<T: Numeric + Float>(tensor: &RcTensor<T>) -> Result<Scalar<T>> {
    if tensor.count() == 0 {
        return Err(TensorError::NotAScalar(tensor.shape().to_vec()));
    }
    let n: T = cast(tensor.count())?;
    let total = tensor.iter().fold(T::zero(), |acc, &x| acc + x);
    Ok(record(
        RawTensor::from_parts(vec![total / n], vec![], tensor.device()),
        vec![tensor.clone()],
        mean_vjp,
        concat!("mean, ", file!(), ":", line!()),
    ))
}

fn mean_vjp<T: Numeric + Float>(
    inputs: &[RcTensor<T>],
    grad: &RcTensor<T>,
) -> Result<GradList<T>> {
    let input = &inputs[0];
    let g = grad.elem()? / cast(input.count())?;
    Ok(vec![Some(RcTensor::from_raw(RawTensor::from_parts(
        vec![g; input.count()],
        input.shape().to_vec(),
        input.device(),
    )))])
}

/// Multiplies every element by a constant.
pub fn scale<T: Numeric>(tensor: &RcTensor<T>, factor: T) -> RcTensor<T> {
    let raw_tensor = tensor.map(|x| x * factor);
    let factor_tensor = RcTensor::from_raw(RawTensor::from_parts(
        vec![factor],
        vec![],
        tensor.device(),
    ));
    record(
        raw_tensor,
        vec![tensor.clone(), factor_tensor],
        scale_vjp,
        concat!("scale, ", file!(), ":", line!()),
    )
}

fn scale_vjp<T: Numeric>(inputs: &[RcTensor<T>], grad: &RcTensor<T>) -> Result<GradList<T>> {
    let factor = inputs[1].elem()?;
    Ok(vec![
        Some(RcTensor::from_raw(grad.map(|g| g * factor))),
        None,
    ])
}

#[test]
fn test_add() {
    let tensor1 = RcTensor::new_with_filler(vec![4, 4], 1);
    let tensor2 = RcTensor::new((0..32).collect(), vec![2, 4, 4]).unwrap();
    let tensor3 = RcTensor::new((1..33).collect(), vec![2, 4, 4]).unwrap();
    assert_eq!(add(&tensor2, &tensor1).unwrap(), tensor3);
    assert_eq!(add(&tensor1, &tensor2).unwrap(), tensor3);
}

#[test]
fn test_add_scalar() {
    let tensor1 = RcTensor::new((0..32).collect(), vec![2, 4, 4]).unwrap();
    let tensor2 = RcTensor::new((42..(32 + 42)).collect(), vec![2, 4, 4]).unwrap();
    assert_eq!(add(&tensor1, &RcTensor::scalar(42)).unwrap(), tensor2);
}

#[test]
fn test_add_rejects_incompatible_shapes() {
    let left = RcTensor::new_with_filler(vec![64, 10], 0.0);
    let right = RcTensor::new_with_filler(vec![9], 0.0);
    assert!(matches!(
        add(&left, &right),
        Err(TensorError::ShapeMismatch { op: "add", .. })
    ));
}

#[test]
fn test_add_backward_reduces_broadcast_dims() {
    let matrix = RcTensor::from([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).requires_grad_(true);
    let bias = RcTensor::from([0.5, 0.5, 0.5]).requires_grad_(true);
    let loss = sum(&add(&matrix, &bias).unwrap());
    loss.backward().unwrap();
    assert_eq!(
        matrix.grad(),
        Some(RcTensor::from([[1.0, 1.0, 1.0], [1.0, 1.0, 1.0]]))
    );
    assert_eq!(bias.grad(), Some(RcTensor::from([2.0, 2.0, 2.0])));
}

#[test]
fn test_sum_backward() {
    let input = RcTensor::from([1.0, 2.0, 3.0]).requires_grad_(true);
    sum(&input).backward().unwrap();
    assert_eq!(input.grad(), Some(RcTensor::from([1.0, 1.0, 1.0])));
}

#[test]
fn test_mean_and_scale_backward() {
    let input = RcTensor::from([1.0, 2.0, 3.0, 6.0]).requires_grad_(true);
    let loss = mean(&scale(&input, 2.0)).unwrap();
    assert_eq!(loss.elem().unwrap(), 6.0);
    loss.backward().unwrap();
    assert_eq!(input.grad(), Some(RcTensor::from([0.5, 0.5, 0.5, 0.5])));
}
