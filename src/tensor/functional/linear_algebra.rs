use rayon::prelude::*;

use crate::tensor::autograd::{record, same_device, GradList};
use crate::tensor::numeric::*;
use crate::tensor::{RawTensor, RcTensor, Result, TensorError, TensorLike};

use super::add;

/// Row-major `(n, k) @ (k, m)`, one output row per rayon task.
fn matmul_raw<T: Numeric>(left: &[T], right: &[T], n: usize, k: usize, m: usize) -> Vec<T> {
    let mut out = vec![T::zero(); n * m];
    if m == 0 {
        return out;
    }
    out.par_chunks_mut(m).enumerate().for_each(|(i, row)| {
        let left_row = &left[i * k..(i + 1) * k];
        for (p, &a) in left_row.iter().enumerate() {
            let right_row = &right[p * m..(p + 1) * m];
            for (o, &b) in row.iter_mut().zip(right_row) {
                *o += a * b;
            }
        }
    });
    out
}

fn transpose_raw<T: Numeric>(array: &[T], rows: usize, cols: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(rows * cols);
    for j in 0..cols {
        for i in 0..rows {
            out.push(array[i * cols + j]);
        }
    }
    out
}

fn matrix_dims<T: Numeric>(op: &'static str, tensor: &RcTensor<T>) -> Result<(usize, usize)> {
    match tensor.shape() {
        &[rows, cols] => Ok((rows, cols)),
        shape => Err(TensorError::shape_mismatch(op, shape, &[0, 0])),
    }
}

/// Matrix product of two rank-2 tensors.
///
/// ```
/// # use mnist_sgd::tensor::*;
/// let matrix = RcTensor::from([[0, 1], [2, 3]]);
/// let diag = RcTensor::from([[1], [1]]);
/// assert_eq!(
///     functional::matmul(&matrix, &diag).unwrap(),
///     RcTensor::from([[1], [5]])
/// );
/// ```
pub fn matmul<T: Numeric>(left: &RcTensor<T>, right: &RcTensor<T>) -> Result<RcTensor<T>> {
    let device = same_device("matmul", &[left, right])?;
    let (n, k) = matrix_dims("matmul", left)?;
    let (k2, m) = matrix_dims("matmul", right)?;
    if k != k2 {
        return Err(TensorError::shape_mismatch(
            "matmul",
            left.shape(),
            right.shape(),
        ));
    }
    let array = matmul_raw(left.as_slice(), right.as_slice(), n, k, m);
    Ok(record(
        RawTensor::from_parts(array, vec![n, m], device),
        vec![left.clone(), right.clone()],
        matmul_vjp,
        concat!("matmul, ", file!(), ":", line!()),
    ))
}

/// For `Y = A @ B`: `dA = G @ Bᵀ` and `dB = Aᵀ @ G`, each only when needed.
fn matmul_vjp<T: Numeric>(inputs: &[RcTensor<T>], grad: &RcTensor<T>) -> Result<GradList<T>> {
    let (left, right) = (&inputs[0], &inputs[1]);
    let (n, k) = matrix_dims("matmul backward", left)?;
    let (_, m) = matrix_dims("matmul backward", right)?;
    let device = grad.device();

    let left_grad = left.requires_grad().then(|| {
        let right_t = transpose_raw(right.as_slice(), k, m);
        let array = matmul_raw(grad.as_slice(), &right_t, n, m, k);
        RcTensor::from_raw(RawTensor::from_parts(array, vec![n, k], device))
    });
    let right_grad = right.requires_grad().then(|| {
        let left_t = transpose_raw(left.as_slice(), n, k);
        let array = matmul_raw(&left_t, grad.as_slice(), k, n, m);
        RcTensor::from_raw(RawTensor::from_parts(array, vec![k, m], device))
    });
    Ok(vec![left_grad, right_grad])
}

/// Swaps the two axes of a rank-2 tensor.
pub fn transpose<T: Numeric>(tensor: &RcTensor<T>) -> Result<RcTensor<T>> {
    let (rows, cols) = matrix_dims("transpose", tensor)?;
    Ok(record(
        RawTensor::from_parts(
            transpose_raw(tensor.as_slice(), rows, cols),
            vec![cols, rows],
            tensor.device(),
        ),
        vec![tensor.clone()],
        transpose_vjp,
        concat!("transpose, ", file!(), ":", line!()),
    ))
}

fn transpose_vjp<T: Numeric>(inputs: &[RcTensor<T>], grad: &RcTensor<T>) -> Result<GradList<T>> {
    let (rows, cols) = matrix_dims("transpose backward", &inputs[0])?;
    Ok(vec![Some(RcTensor::from_raw(RawTensor::from_parts(
        transpose_raw(grad.as_slice(), cols, rows),
        vec![rows, cols],
        grad.device(),
    )))])
}

/// Same data, new shape. The element count has to match.
pub fn reshape<T: Numeric>(tensor: &RcTensor<T>, shape: Vec<usize>) -> Result<RcTensor<T>> {
    if shape.iter().product::<usize>() != tensor.count() {
        return Err(TensorError::shape_mismatch(
            "reshape",
            tensor.shape(),
            &shape,
        ));
    }
    Ok(record(
        RawTensor::from_parts(tensor.to_vec(), shape, tensor.device()),
        vec![tensor.clone()],
        reshape_vjp,
        concat!("reshape, ", file!(), ":", line!()),
    ))
}

fn reshape_vjp<T: Numeric>(inputs: &[RcTensor<T>], grad: &RcTensor<T>) -> Result<GradList<T>> {
    Ok(vec![Some(RcTensor::from_raw(RawTensor::from_parts(
        grad.to_vec(),
        inputs[0].shape().to_vec(),
        grad.device(),
    )))])
}

/// Collapses every dimension from `start_dim` on into one.
///
/// ```
/// # use mnist_sgd::tensor::*;
/// let batch = RcTensor::new_with_filler(vec![64, 1, 28, 28], 0.0);
/// let flat = functional::flatten(&batch, 1).unwrap();
/// assert_eq!(flat.shape(), &[64, 784]);
/// ```
pub fn flatten<T: Numeric>(tensor: &RcTensor<T>, start_dim: usize) -> Result<RcTensor<T>> {
    if start_dim >= tensor.shape().len() {
        return Err(TensorError::shape_mismatch(
            "flatten",
            tensor.shape(),
            &[start_dim],
        ));
    }
    let (outer, inner) = tensor.shape().split_at(start_dim);
    let shape = outer
        .iter()
        .copied()
        .chain(std::iter::once(inner.iter().product()))
        .collect();
    reshape(tensor, shape)
}

/// Affine map `input @ weightᵀ + bias` for `input (B, in)`, `weight (out, in)`
/// and `bias (out)`.
pub fn linear<T: Numeric>(
    input: &RcTensor<T>,
    weight: &RcTensor<T>,
    bias: Option<&RcTensor<T>>,
) -> Result<RcTensor<T>> {
    let output = matmul(input, &transpose(weight)?)?;
    match bias {
        Some(bias) => add(&output, bias),
        None => Ok(output),
    }
}

#[test]
fn test_matmul_2x2() {
    let matrix = RcTensor::new(vec![0, 1, 2, 3], vec![2, 2]).unwrap();
    let e1 = RcTensor::new(vec![0, 1], vec![2, 1]).unwrap();
    let e2 = RcTensor::new(vec![1, 0], vec![2, 1]).unwrap();
    let shape = vec![2, 1];
    assert_eq!(
        matmul(&matrix, &e1).unwrap(),
        RcTensor::new(vec![1, 3], shape.clone()).unwrap()
    );
    assert_eq!(
        matmul(&matrix, &e2).unwrap(),
        RcTensor::new(vec![0, 2], shape).unwrap()
    );
}

#[test]
fn test_matmul_rejects_inner_mismatch() {
    let left = RcTensor::new_with_filler(vec![2, 3], 1.0);
    let right = RcTensor::new_with_filler(vec![4, 2], 1.0);
    assert!(matches!(
        matmul(&left, &right),
        Err(TensorError::ShapeMismatch { op: "matmul", .. })
    ));
}

#[test]
fn test_transpose() {
    let matrix = RcTensor::from([[1, 2, 3], [4, 5, 6]]);
    assert_eq!(
        transpose(&matrix).unwrap(),
        RcTensor::from([[1, 4], [2, 5], [3, 6]])
    );
}

#[test]
fn test_matmul_backward() {
    use super::sum;

    let left = RcTensor::from([[1.0, 2.0], [3.0, 4.0]]).requires_grad_(true);
    let right = RcTensor::from([[5.0], [6.0]]).requires_grad_(true);
    sum(&matmul(&left, &right).unwrap()).backward().unwrap();
    // dL/dA = 1 @ Bᵀ, dL/dB = Aᵀ @ 1
    assert_eq!(
        left.grad(),
        Some(RcTensor::from([[5.0, 6.0], [5.0, 6.0]]))
    );
    assert_eq!(right.grad(), Some(RcTensor::from([[4.0], [6.0]])));
}

#[test]
fn test_linear_backward_only_reaches_parameters() {
    use super::sum;

    let input = RcTensor::from([[1.0, 2.0, 3.0], [-1.0, 0.0, 1.0]]);
    let weight = RcTensor::from([[0.1, 0.2, 0.3], [0.0, -1.0, 1.0]]).requires_grad_(true);
    let bias = RcTensor::from([1.0, -1.0]).requires_grad_(true);
    let output = linear(&input, &weight, Some(&bias)).unwrap();
    assert_eq!(output.shape(), &[2, 2]);
    approx::assert_relative_eq!(output.as_slice()[0], 2.4, epsilon = 1e-12);

    sum(&output).backward().unwrap();
    assert_eq!(input.grad(), None);
    // every output row contributes its input row to each weight row
    assert_eq!(
        weight.grad(),
        Some(RcTensor::from([[0.0, 2.0, 4.0], [0.0, 2.0, 4.0]]))
    );
    assert_eq!(bias.grad(), Some(RcTensor::from([2.0, 2.0])));
}

#[test]
fn test_flatten_rejects_bad_start_dim() {
    let tensor = RcTensor::new_with_filler(vec![2, 3], 0.0);
    assert!(flatten(&tensor, 2).is_err());
}
