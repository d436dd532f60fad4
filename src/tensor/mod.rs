//! A small reverse-mode autodiff tensor library.
//!
//! Tensors are reference counted ([`RcTensor`]) so that the backward graph can
//! hold on to the inputs of every op. Differentiable ops live in
//! [`functional`].

mod autograd;
mod device;
mod error;
pub mod functional;
mod numeric;
mod random;
mod raw_tensor;
mod rc_tensor;
mod tensor_like;
mod types;
mod utils;

pub use device::*;
pub use error::{Result, TensorError};
pub use numeric::*;
pub use raw_tensor::*;
pub use rc_tensor::*;
pub use tensor_like::*;
pub use types::*;
pub use utils::IndexIterator;
