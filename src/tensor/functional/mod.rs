//! Differentiable operations.
//!
//! Every op checks shapes and devices up front and returns a [`Result`]; the
//! returned tensor carries a backward node whenever an input requires a
//! gradient.
//!
//! [`Result`]: crate::tensor::Result

mod element_wise_ops;
mod linear_algebra;
mod loss;

pub use element_wise_ops::*;
pub use linear_algebra::*;
pub use loss::*;

use num::Float;

use crate::tensor::{Result, TensorError};

/// Converts a count into the element type.
pub(in crate::tensor) fn cast<T: Float>(n: usize) -> Result<T> {
    num::cast(n).ok_or(TensorError::Cast(n))
}
