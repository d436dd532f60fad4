use std::fmt;

use tracing::trace;

use crate::tensor::error::{Result, TensorError};
use crate::tensor::numeric::*;
use crate::tensor::{RawTensor, RcTensor, TensorLike, TensorList};

/// One optional gradient per input; `None` where the input needs none.
pub(in crate::tensor) type GradList<T> = Vec<Option<RcTensor<T>>>;

/// signature: vjp(inputs, outer_grad) -> outer_grad @ J(inputs), one entry per input
pub(in crate::tensor) type VectorJacobianProduct<T> =
    fn(&[RcTensor<T>], &RcTensor<T>) -> Result<GradList<T>>;

/// The backward node stored on every tensor produced by a differentiable op.
#[derive(Clone)]
pub(in crate::tensor) struct Derivative<T: Numeric> {
    inputs: TensorList<T>,
    vector_jacobian_product: VectorJacobianProduct<T>,
    debug_info: &'static str,
}

impl<T: Numeric> fmt::Debug for Derivative<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derivative")
            .field("op", &self.debug_info)
            .field(
                "input_shapes",
                &self.inputs.iter().map(|t| t.shape()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<T: Numeric> Derivative<T> {
    pub fn new(
        inputs: TensorList<T>,
        vector_jacobian_product: VectorJacobianProduct<T>,
        debug_info: &'static str,
    ) -> Derivative<T> {
        Derivative {
            inputs,
            vector_jacobian_product,
            debug_info,
        }
    }

    /// Pulls `outer_grad` (shaped like this node's output) back through the op
    /// and on into every input that requires a gradient.
    ///
    /// Leaves accumulate; interior nodes recurse. Each path contributes its own
    /// share, so a tensor reached twice ends up with the sum.
    pub fn compute_vjp(&self, outer_grad: &RcTensor<T>) -> Result<()> {
        trace!(op = self.debug_info, "vector jacobian product");
        let input_grads = (self.vector_jacobian_product)(&self.inputs, outer_grad)?;
        for (grad, input) in input_grads.into_iter().zip(self.inputs.iter()) {
            let Some(grad) = grad else { continue };
            if !input.requires_grad {
                continue;
            }
            if !input.same_shape(&grad) {
                return Err(TensorError::shape_mismatch(
                    self.debug_info,
                    input.shape(),
                    grad.shape(),
                ));
            }
            match input.grad_fn.as_ref() {
                Some(derivative) => derivative.compute_vjp(&grad)?,
                None => input.update_grad(grad)?,
            }
        }
        Ok(())
    }
}

/// Wraps the result of an op, recording a backward node when any input
/// requires a gradient.
pub(in crate::tensor) fn record<T: Numeric>(
    mut raw_tensor: RawTensor<T>,
    inputs: TensorList<T>,
    vector_jacobian_product: VectorJacobianProduct<T>,
    debug_info: &'static str,
) -> RcTensor<T> {
    if inputs.iter().any(|input| input.requires_grad) {
        raw_tensor.requires_grad = true;
        raw_tensor.grad_fn = Some(Derivative::new(
            inputs,
            vector_jacobian_product,
            debug_info,
        ));
    }
    RcTensor::from_raw(raw_tensor)
}

/// Checks that every operand of `op` lives on the same device.
pub(in crate::tensor) fn same_device<T: Numeric>(
    op: &'static str,
    tensors: &[&RcTensor<T>],
) -> Result<crate::tensor::Device> {
    let device = tensors
        .first()
        .map(|tensor| tensor.device())
        .unwrap_or_default();
    for tensor in tensors {
        if tensor.device() != device {
            return Err(TensorError::DeviceMismatch {
                op,
                left: device,
                right: tensor.device(),
            });
        }
    }
    Ok(device)
}

#[test]
fn test_record_skips_constants() {
    let constant = RcTensor::from([1.0, 2.0]);
    let output = record(
        RawTensor::from([2.0, 4.0]),
        vec![constant],
        |_, _| Ok(vec![None]),
        "test",
    );
    assert!(output.is_leaf());
    assert!(!output.requires_grad());
}

#[test]
fn test_gradient_accumulates_over_shared_input() {
    use crate::tensor::functional;

    // d/dx sum(x + x) = 2
    let x = RcTensor::from([1.0, -3.0]).requires_grad_(true);
    let y = functional::add(&x, &x).unwrap();
    functional::sum(&y).backward().unwrap();
    assert_eq!(x.grad(), Some(RcTensor::from([2.0, 2.0])));
}

#[test]
fn test_ops_reject_mixed_devices() {
    use crate::tensor::{functional, Device};

    let on_cuda = |array: Vec<f64>, shape: Vec<usize>| {
        RcTensor::from_raw(RawTensor::from_parts(array, shape, Device::Cuda(0)))
    };
    let cpu_matrix = RcTensor::from([[1.0, 2.0], [3.0, 4.0]]);
    let cuda_matrix = on_cuda(vec![1.0, 0.0, 0.0, 1.0], vec![2, 2]);

    let expected = TensorError::DeviceMismatch {
        op: "add",
        left: Device::Cpu,
        right: Device::Cuda(0),
    };
    assert_eq!(functional::add(&cpu_matrix, &cuda_matrix), Err(expected));
    assert!(matches!(
        functional::matmul(&cuda_matrix, &cpu_matrix),
        Err(TensorError::DeviceMismatch { op: "matmul", .. })
    ));

    let cuda_targets = RcTensor::from_raw(RawTensor::from_parts(
        vec![0i64, 1],
        vec![2],
        Device::Cuda(0),
    ));
    assert!(matches!(
        functional::nll_loss(&cpu_matrix, &cuda_targets),
        Err(TensorError::DeviceMismatch { op: "nll_loss", .. })
    ));
}
