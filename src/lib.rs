//! Trains a single linear layer to classify MNIST-shaped images.
//!
//! The crate carries its own small autodiff [`tensor`] library, a [`nn`]
//! module with the model, an [`optim`] SGD optimizer and the [`train`] loop.
//! Batches come from [`data`] and are random noise, so the loss never falls
//! much below `ln(9)`.

pub mod data;
mod error;
pub mod nn;
pub mod optim;
pub mod tensor;
pub mod train;
