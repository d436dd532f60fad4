use super::error::{Result, TensorError};
use super::numeric::*;
use super::utils::{self, IndexIterator};
use super::{Device, RawTensor};

pub(in crate::tensor) mod private {
    pub trait TensorLikePrivate {}
}
pub(in crate::tensor) use private::TensorLikePrivate;

/// Read access shared by [`RawTensor`] and [`RcTensor`](super::RcTensor).
///
/// The trait is sealed; every accessor is derived from [`TensorLike::tensor`].
pub trait TensorLike: TensorLikePrivate + std::fmt::Debug {
    type Elem: Numeric;

    /// Return a reference to the underlying tensor
    fn tensor(&self) -> &RawTensor<Self::Elem>;

    fn shape(&self) -> &[usize] {
        &self.tensor().shape
    }

    /// Number of elements.
    fn count(&self) -> usize {
        self.shape().iter().product()
    }

    fn device(&self) -> Device {
        self.tensor().device
    }

    /// ```
    /// # use mnist_sgd::tensor::*;
    /// let matrix = RcTensor::new(vec![0, 1, 2, 3], vec![2, 2]).unwrap();
    ///
    /// assert_eq!(matrix.get(&[1, 0]), Ok(&2));
    /// assert!(matrix.get(&[2, 0]).is_err());
    /// ```
    fn get(&self, index: &[usize]) -> Result<&Self::Elem> {
        let global_idx = utils::global_index(index, self.shape())?;
        Ok(&self.tensor().array[global_idx])
    }

    /// The value of a tensor holding exactly one element.
    fn elem(&self) -> Result<Self::Elem> {
        match self.tensor().array.as_slice() {
            [value] => Ok(*value),
            _ => Err(TensorError::NotAScalar(self.shape().to_vec())),
        }
    }

    fn same_shape<U>(&self, other: &U) -> bool
    where
        U: TensorLike,
    {
        self.shape() == other.shape()
    }

    fn broadcastable(&self, new_shape: &[usize]) -> bool {
        utils::broadcastable(self.shape(), new_shape)
    }

    fn iter(&self) -> std::slice::Iter<'_, Self::Elem> {
        self.tensor().array.iter()
    }

    fn iter_indices(&self) -> IndexIterator {
        IndexIterator::new(self.shape().to_vec())
    }
}
