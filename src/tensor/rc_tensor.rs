use std::cmp::PartialEq;
use std::convert::From;
use std::ops::Deref;
use std::rc::Rc;

use tracing::trace;

use super::error::{Result, TensorError};
use super::numeric::*;
use super::raw_tensor::*;
use super::tensor_like::*;
use super::Device;

/// A cheaply clonable handle to a tensor and, through its backward node, to
/// the graph that produced it.
#[derive(Debug, PartialEq, Clone)]
pub struct RcTensor<T: Numeric>(pub(in crate::tensor) Rc<RawTensor<T>>);

impl<T> Deref for RcTensor<T>
where
    T: Numeric,
{
    type Target = RawTensor<T>;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

impl<T: Numeric> RcTensor<T> {
    pub(in crate::tensor) fn from_raw(raw_tensor: RawTensor<T>) -> RcTensor<T> {
        RcTensor(Rc::new(raw_tensor))
    }

    /// ```
    /// # use mnist_sgd::tensor::*;
    /// let matrix = RcTensor::new((0..6).collect(), vec![2, 3]).unwrap();
    /// assert_eq!(matrix.shape(), &[2, 3]);
    /// assert_eq!(matrix.get(&[1, 2]), Ok(&5));
    ///
    /// assert!(RcTensor::new(vec![1, 2, 3], vec![2, 2]).is_err());
    /// ```
    pub fn new(array: Vec<T>, shape: Vec<usize>) -> Result<RcTensor<T>> {
        RawTensor::new(array, shape).map(RcTensor::from_raw)
    }

    pub fn new_with_filler(shape: Vec<usize>, filler: T) -> RcTensor<T> {
        RcTensor::from_raw(RawTensor::new_with_filler(shape, filler))
    }

    pub fn zeros(shape: Vec<usize>) -> RcTensor<T> {
        RcTensor::new_with_filler(shape, T::zero())
    }

    pub fn scalar(scalar: T) -> RcTensor<T> {
        RcTensor::from_raw(RawTensor::scalar(scalar))
    }

    /// Marks a leaf tensor as a parameter whose gradient should be kept.
    pub fn requires_grad_(self, requires_grad: bool) -> RcTensor<T> {
        let mut raw_tensor = Rc::try_unwrap(self.0).unwrap_or_else(|rc| (*rc).clone());
        raw_tensor.requires_grad = requires_grad;
        RcTensor::from_raw(raw_tensor)
    }

    /// The accumulated gradient, if backward has reached this tensor.
    pub fn grad(&self) -> Option<RcTensor<T>> {
        self.0.grad.borrow().clone()
    }

    /// Overwrites the gradient slot.
    pub fn set_grad(&self, grad: RcTensor<T>) -> Result<()> {
        if !self.same_shape(&grad) {
            return Err(TensorError::shape_mismatch(
                "set_grad",
                self.shape(),
                grad.shape(),
            ));
        }
        *self.0.grad.borrow_mut() = Some(grad);
        Ok(())
    }

    pub fn zero_grad(&self) {
        *self.0.grad.borrow_mut() = None;
    }

    /// Adds `grad` into the gradient slot.
    pub(in crate::tensor) fn update_grad(&self, grad: RcTensor<T>) -> Result<()> {
        if !self.same_shape(&grad) {
            return Err(TensorError::shape_mismatch(
                "update_grad",
                self.shape(),
                grad.shape(),
            ));
        }
        let mut slot = self.0.grad.borrow_mut();
        let accumulated = match slot.take() {
            Some(existing) => {
                let array = existing
                    .iter()
                    .zip(grad.iter())
                    .map(|(&a, &b)| a + b)
                    .collect();
                RcTensor::from_raw(RawTensor::from_parts(
                    array,
                    self.shape().to_vec(),
                    self.device(),
                ))
            }
            None => grad,
        };
        *slot = Some(accumulated);
        Ok(())
    }

    /// A new leaf holding the same values, cut off from the graph.
    pub fn detach(&self) -> RcTensor<T> {
        RcTensor::from_raw(RawTensor::from_parts(
            self.to_vec(),
            self.shape().to_vec(),
            self.device(),
        ))
    }

    /// Moves the tensor to `device`, keeping `requires_grad`.
    ///
    /// The result is a leaf: parameters are moved before the first forward
    /// pass and batches never require gradients.
    pub fn to(&self, device: Device) -> Result<RcTensor<T>> {
        if !device.is_available() {
            return Err(TensorError::DeviceUnavailable(device));
        }
        if self.device() == device {
            return Ok(self.clone());
        }
        let mut raw_tensor = RawTensor::from_parts(self.to_vec(), self.shape().to_vec(), device);
        raw_tensor.requires_grad = self.requires_grad;
        Ok(RcTensor::from_raw(raw_tensor))
    }

    /// Reverse-mode differentiation from a single-element tensor.
    ///
    /// Every leaf reached that requires a gradient has the derivative of
    /// `self` added into its gradient slot.
    pub fn backward(&self) -> Result<()> {
        if self.count() != 1 {
            return Err(TensorError::NotAScalar(self.shape().to_vec()));
        }
        let seed = RcTensor::from_raw(RawTensor::from_parts(
            vec![T::one()],
            self.shape().to_vec(),
            self.device(),
        ));
        match self.grad_fn.as_ref() {
            Some(derivative) => {
                trace!(shape = ?self.shape(), "starting backward pass");
                derivative.compute_vjp(&seed)
            }
            None if self.requires_grad => self.update_grad(seed),
            None => Err(TensorError::NoGradient),
        }
    }
}

impl<T> TensorLikePrivate for RcTensor<T> where T: Numeric {}
impl<T> TensorLike for RcTensor<T>
where
    T: Numeric,
{
    type Elem = T;

    fn tensor(&self) -> &RawTensor<T> {
        self.0.deref()
    }
}

impl<T> From<T> for RcTensor<T>
where
    T: Numeric,
{
    fn from(value: T) -> Self {
        RcTensor::from_raw(RawTensor::from(value))
    }
}

impl<T, U> From<Vec<U>> for RcTensor<T>
where
    T: Numeric,
    RawTensor<T>: From<U>,
{
    fn from(value: Vec<U>) -> RcTensor<T> {
        RcTensor::from_raw(<RawTensor<T> as From<Vec<U>>>::from(value))
    }
}

impl<T, U, const N: usize> From<[U; N]> for RcTensor<T>
where
    T: Numeric,
    RawTensor<T>: From<U>,
{
    fn from(value: [U; N]) -> RcTensor<T> {
        RcTensor::from_raw(<RawTensor<T> as From<[U; N]>>::from(value))
    }
}

#[test]
fn test_from_nested() {
    let tensor1 = RcTensor::from(vec![vec![0, 1, 2], vec![3, 4, 5]]);
    let tensor2 = RcTensor::new((0..6).collect(), vec![2, 3]).unwrap();
    assert_eq!(tensor1, tensor2);
}

#[test]
fn test_update_grad_accumulates() {
    let param = RcTensor::from([1.0, 2.0]).requires_grad_(true);
    param.update_grad(RcTensor::from([0.5, 0.5])).unwrap();
    param.update_grad(RcTensor::from([1.0, -1.0])).unwrap();
    assert_eq!(param.grad(), Some(RcTensor::from([1.5, -0.5])));

    param.zero_grad();
    assert_eq!(param.grad(), None);
}

#[test]
fn test_set_grad_rejects_wrong_shape() {
    let param = RcTensor::from([1.0, 2.0]).requires_grad_(true);
    assert!(param.set_grad(RcTensor::from([1.0])).is_err());
}

#[test]
fn test_backward_on_leaf() {
    let leaf = RcTensor::scalar(3.0).requires_grad_(true);
    leaf.backward().unwrap();
    assert_eq!(leaf.grad(), Some(RcTensor::scalar(1.0)));

    let constant = RcTensor::scalar(3.0);
    assert_eq!(constant.backward(), Err(TensorError::NoGradient));
}

#[test]
fn test_backward_needs_single_element() {
    let vector = RcTensor::from([1.0, 2.0]).requires_grad_(true);
    assert_eq!(
        vector.backward(),
        Err(TensorError::NotAScalar(vec![2]))
    );
}

#[test]
fn test_to_device() {
    let tensor = RcTensor::from([1.0, 2.0]).requires_grad_(true);
    let moved = tensor.to(Device::Cpu).unwrap();
    assert_eq!(moved, tensor);
    assert!(moved.requires_grad());
    assert_eq!(
        tensor.to(Device::Cuda(0)),
        Err(TensorError::DeviceUnavailable(Device::Cuda(0)))
    );
}

#[test]
fn test_detach_drops_requires_grad() {
    let tensor = RcTensor::from([1.0, 2.0]).requires_grad_(true);
    let detached = tensor.detach();
    assert_eq!(detached, tensor);
    assert!(!detached.requires_grad());
}
