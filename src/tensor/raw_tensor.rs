use std::cell::RefCell;
use std::cmp::PartialEq;
use std::convert::From;

use super::autograd::Derivative;
use super::error::{Result, TensorError};
use super::numeric::*;
use super::rc_tensor::*;
use super::tensor_like::*;
use super::Device;

/// The storage behind every [`RcTensor`].
///
/// Data is a contiguous row-major `Vec`. The gradient slot is a `RefCell` so
/// that backward can fill it in through the shared `Rc`.
#[derive(Debug, Clone)]
pub struct RawTensor<T>
where
    T: Numeric,
{
    pub(in crate::tensor) array: Vec<T>,
    pub(in crate::tensor) shape: Vec<usize>,
    pub(in crate::tensor) device: Device,
    pub(in crate::tensor) requires_grad: bool,
    pub(in crate::tensor) grad: RefCell<Option<RcTensor<T>>>,
    pub(in crate::tensor) grad_fn: Option<Derivative<T>>,
}

impl<T: Numeric> PartialEq for RawTensor<T> {
    // gradients and graph structure do not take part in equality
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.device == other.device && self.array == other.array
    }
}

impl<T> Default for RawTensor<T>
where
    T: Numeric,
{
    fn default() -> Self {
        RawTensor {
            array: vec![],
            shape: vec![],
            device: Device::Cpu,
            requires_grad: false,
            grad: RefCell::new(None),
            grad_fn: None,
        }
    }
}

impl<T, U> From<Vec<U>> for RawTensor<T>
where
    T: Numeric,
    RawTensor<T>: From<U>,
{
    fn from(value: Vec<U>) -> RawTensor<T> {
        let tensors: Vec<_> = value.into_iter().map(RawTensor::from).collect();
        let (arrays, shapes): (Vec<_>, Vec<_>) =
            tensors.into_iter().map(|t| (t.array, t.shape)).unzip();
        let inner_shape = shapes.first().cloned().unwrap_or_default();
        assert!(
            shapes.iter().all(|shape| *shape == inner_shape),
            "ragged nested input: {shapes:?}"
        );

        let array = arrays.into_iter().flatten().collect();
        let shape = std::iter::once(shapes.len()).chain(inner_shape).collect();
        RawTensor {
            array,
            shape,
            ..Default::default()
        }
    }
}

impl<T, U, const N: usize> From<[U; N]> for RawTensor<T>
where
    T: Numeric,
    RawTensor<T>: From<U>,
{
    fn from(value: [U; N]) -> RawTensor<T> {
        From::from(Vec::from(value))
    }
}

impl<T> From<T> for RawTensor<T>
where
    T: Numeric,
{
    fn from(value: T) -> Self {
        RawTensor::scalar(value)
    }
}

impl<T> RawTensor<T>
where
    T: Numeric,
{
    /// Builds a tensor whose length is already known to match `shape`.
    pub(in crate::tensor) fn from_parts(array: Vec<T>, shape: Vec<usize>, device: Device) -> Self {
        debug_assert_eq!(array.len(), shape.iter().product::<usize>());
        RawTensor {
            array,
            shape,
            device,
            ..Default::default()
        }
    }

    pub fn new(array: Vec<T>, shape: Vec<usize>) -> Result<RawTensor<T>> {
        if array.len() != shape.iter().product::<usize>() {
            return Err(TensorError::InvalidLength {
                len: array.len(),
                shape,
            });
        }
        Ok(RawTensor {
            array,
            shape,
            ..Default::default()
        })
    }

    /// Note! An empty shape constructs a scalar.
    pub fn new_with_filler(shape: Vec<usize>, filler: T) -> RawTensor<T> {
        let total = shape.iter().product();
        RawTensor {
            array: vec![filler; total],
            shape,
            ..Default::default()
        }
    }

    pub fn scalar(scalar: T) -> RawTensor<T> {
        RawTensor {
            array: vec![scalar],
            shape: vec![],
            ..Default::default()
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.array.len() == 1 && self.shape.is_empty()
    }

    pub fn is_leaf(&self) -> bool {
        self.grad_fn.is_none()
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    pub fn as_slice(&self) -> &[T] {
        &self.array
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.array.clone()
    }

    pub(in crate::tensor) fn map<F>(&self, f: F) -> RawTensor<T>
    where
        F: Fn(T) -> T,
    {
        RawTensor::from_parts(
            self.array.iter().map(|&x| f(x)).collect(),
            self.shape.clone(),
            self.device,
        )
    }
}

impl<T> TensorLikePrivate for RawTensor<T> where T: Numeric {}
impl<T> TensorLike for RawTensor<T>
where
    T: Numeric,
{
    type Elem = T;

    fn tensor(&self) -> &RawTensor<T> {
        self
    }
}

#[test]
fn test_new_checks_length() {
    assert!(RawTensor::new(vec![1, 2, 3], vec![3]).is_ok());
    assert_eq!(
        RawTensor::new(vec![1, 2, 3], vec![2, 2]),
        Err(TensorError::InvalidLength {
            len: 3,
            shape: vec![2, 2]
        })
    );
}

#[test]
fn test_filler_with_empty_shape_is_scalar() {
    let scalar = RawTensor::new_with_filler(vec![], 7);
    assert!(scalar.is_scalar());
    assert_eq!(scalar.elem().unwrap(), 7);
}

#[test]
fn test_from_nested_arrays() {
    let tensor = RawTensor::from([[1, 2, 3], [4, 5, 6]]);
    assert_eq!(tensor.shape(), &[2, 3]);
    assert_eq!(tensor.as_slice(), &[1, 2, 3, 4, 5, 6]);
}
