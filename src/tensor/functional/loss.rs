use crate::tensor::autograd::{record, same_device, GradList};
use crate::tensor::numeric::*;
use crate::tensor::{RawTensor, RcTensor, Result, Scalar, TensorError, TensorLike};

use super::cast;

/// Length of the last (class) dimension.
fn rows<T: Numeric>(op: &'static str, tensor: &RcTensor<T>) -> Result<usize> {
    match tensor.shape().last() {
        Some(&classes) if classes > 0 => Ok(classes),
        _ => Err(TensorError::shape_mismatch(op, tensor.shape(), &[1])),
    }
}

fn log_softmax_raw<T: Numeric + Float>(array: &[T], classes: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(array.len());
    for row in array.chunks(classes) {
        // shift by the row maximum so exp never overflows
        let max = row.iter().copied().fold(T::neg_infinity(), T::max);
        let log_sum_exp = row
            .iter()
            .fold(T::zero(), |acc, &x| acc + (x - max).exp())
            .ln()
            + max;
        out.extend(row.iter().map(|&x| x - log_sum_exp));
    }
    out
}

/// `log(softmax(x))` over the last dimension.
pub fn log_softmax<T: Numeric + Float>(tensor: &RcTensor<T>) -> Result<RcTensor<T>> {
    let classes = rows("log_softmax", tensor)?;
    Ok(record(
        RawTensor::from_parts(
            log_softmax_raw(tensor.as_slice(), classes),
            tensor.shape().to_vec(),
            tensor.device(),
        ),
        vec![tensor.clone()],
        log_softmax_vjp,
        concat!("log_softmax, ", file!(), ":", line!()),
    ))
}

/// `dx = g - softmax(x) * sum(g)`, row by row.
fn log_softmax_vjp<T: Numeric + Float>(
    inputs: &[RcTensor<T>],
    grad: &RcTensor<T>,
) -> Result<GradList<T>> {
    let input = &inputs[0];
    let classes = rows("log_softmax backward", input)?;
    let log_probs = log_softmax_raw(input.as_slice(), classes);
    let mut array = Vec::with_capacity(log_probs.len());
    for (log_prob_row, grad_row) in log_probs.chunks(classes).zip(grad.as_slice().chunks(classes)) {
        let grad_sum = grad_row.iter().fold(T::zero(), |acc, &g| acc + g);
        array.extend(
            log_prob_row
                .iter()
                .zip(grad_row)
                .map(|(&lp, &g)| g - lp.exp() * grad_sum),
        );
    }
    Ok(vec![Some(RcTensor::from_raw(RawTensor::from_parts(
        array,
        input.shape().to_vec(),
        grad.device(),
    )))])
}

/// A `(targets.len(), num_classes)` indicator matrix.
pub fn one_hot<T: Numeric>(targets: &RcTensor<i64>, num_classes: usize) -> Result<RcTensor<T>> {
    let mut array = vec![T::zero(); targets.count() * num_classes];
    for (position, &target) in targets.iter().enumerate() {
        let class = usize::try_from(target)
            .ok()
            .filter(|&class| class < num_classes)
            .ok_or(TensorError::InvalidClassIndex {
                position,
                target,
                num_classes,
            })?;
        array[position * num_classes + class] = T::one();
    }
    Ok(RcTensor::from_raw(RawTensor::from_parts(
        array,
        vec![targets.count(), num_classes],
        targets.device(),
    )))
}

/// Mean negative log-likelihood of `targets` under `log_probs (B, C)`.
///
/// Every target has to lie in `[0, C)`.
pub fn nll_loss<T: Numeric + Float>(
    log_probs: &RcTensor<T>,
    targets: &RcTensor<i64>,
) -> Result<Scalar<T>> {
    let (batch, classes) = match log_probs.shape() {
        &[batch, classes] if batch > 0 => (batch, classes),
        shape => return Err(TensorError::shape_mismatch("nll_loss", shape, targets.shape())),
    };
    if targets.shape() != [batch].as_slice() {
        return Err(TensorError::shape_mismatch(
            "nll_loss",
            log_probs.shape(),
            targets.shape(),
        ));
    }
    if targets.device() != log_probs.device() {
        return Err(TensorError::DeviceMismatch {
            op: "nll_loss",
            left: log_probs.device(),
            right: targets.device(),
        });
    }
    let weights: RcTensor<T> = one_hot(targets, classes)?;
    let device = same_device("nll_loss", &[log_probs, &weights])?;

    let picked = log_probs
        .iter()
        .zip(weights.iter())
        .fold(T::zero(), |acc, (&lp, &w)| acc + lp * w);
    let loss = -picked / cast(batch)?;
    Ok(record(
        RawTensor::from_parts(vec![loss], vec![], device),
        vec![log_probs.clone(), weights],
        nll_loss_vjp,
        concat!("nll_loss, ", file!(), ":", line!()),
    ))
}

fn nll_loss_vjp<T: Numeric + Float>(
    inputs: &[RcTensor<T>],
    grad: &RcTensor<T>,
) -> Result<GradList<T>> {
    let weights = &inputs[1];
    let batch: T = cast(weights.shape()[0])?;
    let factor = -grad.elem()? / batch;
    Ok(vec![Some(RcTensor::from_raw(weights.map(|w| w * factor))), None])
}

/// Mean cross-entropy between raw class scores `(B, C)` and integer targets.
///
/// ```
/// # use mnist_sgd::tensor::*;
/// let logits = RcTensor::from([[0.0, 0.0], [0.0, 0.0]]);
/// let targets = RcTensor::from([0i64, 1]);
/// let loss = functional::cross_entropy(&logits, &targets).unwrap();
/// assert!((loss.elem().unwrap() - 2.0f64.ln()).abs() < 1e-12);
/// ```
pub fn cross_entropy<T: Numeric + Float>(
    logits: &RcTensor<T>,
    targets: &RcTensor<i64>,
) -> Result<Scalar<T>> {
    nll_loss(&log_softmax(logits)?, targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Central differences of `f` at every element of `input`.
    fn numerical_grad<F>(input: &[f64], shape: &[usize], f: F) -> Vec<f64>
    where
        F: Fn(&RcTensor<f64>) -> f64,
    {
        let epsilon = 1e-6;
        (0..input.len())
            .map(|i| {
                let mut plus = input.to_vec();
                let mut minus = input.to_vec();
                plus[i] += epsilon;
                minus[i] -= epsilon;
                let plus = RcTensor::new(plus, shape.to_vec()).unwrap();
                let minus = RcTensor::new(minus, shape.to_vec()).unwrap();
                (f(&plus) - f(&minus)) / (2.0 * epsilon)
            })
            .collect()
    }

    #[test]
    fn log_softmax_rows_normalise() {
        let logits = RcTensor::from([[1.0, 2.0, 3.0], [1000.0, 0.0, -1000.0]]);
        let log_probs = log_softmax(&logits).unwrap();
        for row in log_probs.as_slice().chunks(3) {
            let total: f64 = row.iter().map(|lp| lp.exp()).sum();
            assert_relative_eq!(total, 1.0, epsilon = 1e-12);
            assert!(row.iter().all(|lp| lp.is_finite()));
        }
    }

    #[test]
    fn cross_entropy_matches_finite_differences() {
        let values = vec![0.3, -1.2, 2.0, 0.0, 0.5, 0.5, -0.7, 1.1, 3.0, -2.0, 0.1, 0.2];
        let shape = [3, 4];
        let targets = RcTensor::from([2i64, 0, 3]);

        let logits = RcTensor::new(values.clone(), shape.to_vec())
            .unwrap()
            .requires_grad_(true);
        cross_entropy(&logits, &targets).unwrap().backward().unwrap();
        let grad = logits.grad().unwrap();

        let expected = numerical_grad(&values, &shape, |x| {
            cross_entropy(x, &targets).unwrap().elem().unwrap()
        });
        for (&g, &e) in grad.as_slice().iter().zip(expected.iter()) {
            assert_relative_eq!(g, e, epsilon = 1e-6);
        }
    }

    #[test]
    fn cross_entropy_is_finite_and_non_negative() {
        let logits = RcTensor::from([[50.0, -50.0, 0.0], [-3.0, 7.0, 1e3]]);
        let targets = RcTensor::from([1i64, 0]);
        let loss = cross_entropy(&logits, &targets).unwrap().elem().unwrap();
        assert!(loss.is_finite());
        assert!(loss >= 0.0);
    }

    #[test]
    fn nll_loss_rejects_out_of_range_targets() {
        let logits = RcTensor::from([[0.0, 0.0], [0.0, 0.0]]);
        for bad in [2i64, -1] {
            let targets = RcTensor::from([0i64, bad]);
            assert_eq!(
                cross_entropy(&logits, &targets),
                Err(TensorError::InvalidClassIndex {
                    position: 1,
                    target: bad,
                    num_classes: 2,
                })
            );
        }
    }

    #[test]
    fn nll_loss_rejects_mismatched_batch() {
        let logits = RcTensor::from([[0.0, 0.0], [0.0, 0.0]]);
        let targets = RcTensor::from([0i64, 1, 1]);
        assert!(matches!(
            nll_loss(&logits, &targets),
            Err(TensorError::ShapeMismatch { op: "nll_loss", .. })
        ));
    }

    #[test]
    fn one_hot_marks_targets() {
        let targets = RcTensor::from([2i64, 0]);
        let encoded: RcTensor<f32> = one_hot(&targets, 3).unwrap();
        assert_eq!(
            encoded,
            RcTensor::from([[0.0f32, 0.0, 1.0], [1.0, 0.0, 0.0]])
        );
    }
}
