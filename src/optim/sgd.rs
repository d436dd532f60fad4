use tracing::debug;

use crate::nn::Module;
use crate::tensor::{Float, Numeric, RcTensor, TensorError, TensorLike, TensorList};
use crate::error::{Result, TrainError};

/// Stochastic gradient descent with (non-Nesterov) momentum.
///
/// Per parameter: `v = momentum * v + g`, then `p = p - lr * v`.
#[derive(Debug)]
pub struct Sgd<T: Numeric> {
    learning_rate: T,
    momentum: T,
    velocity: Vec<Vec<T>>,
}

impl<T> Sgd<T>
where
    T: Numeric + Float,
{
    /// One zeroed velocity buffer is allocated per entry of `params`.
    pub fn new(params: &[RcTensor<T>], learning_rate: T, momentum: T) -> Result<Sgd<T>> {
        if !(learning_rate > T::zero()) {
            return Err(TrainError::invalid_config(format!(
                "learning rate must be positive, got {learning_rate}"
            )));
        }
        if !(momentum >= T::zero()) {
            return Err(TrainError::invalid_config(format!(
                "momentum must be non-negative, got {momentum}"
            )));
        }
        Ok(Sgd {
            learning_rate,
            momentum,
            velocity: params
                .iter()
                .map(|param| vec![T::zero(); param.count()])
                .collect(),
        })
    }

    pub fn velocity(&self) -> &[Vec<T>] {
        &self.velocity
    }

    pub fn zero_grad<M: Module<T>>(&self, module: &M) {
        module.zero_grad();
    }

    /// Applies one update to every parameter that has a gradient.
    ///
    /// Parameters without one keep both their value and their velocity.
    pub fn step<M: Module<T>>(&mut self, module: &mut M) -> Result<()> {
        let params = module.params();
        if params.len() != self.velocity.len() {
            return Err(TrainError::invalid_config(format!(
                "optimizer tracks {} parameters but the module has {}",
                self.velocity.len(),
                params.len()
            )));
        }

        let mut updated: TensorList<T> = Vec::with_capacity(params.len());
        for (param, velocity) in params.iter().zip(self.velocity.iter_mut()) {
            let Some(grad) = param.grad() else {
                debug!(shape = ?param.shape(), "skipping parameter without gradient");
                updated.push(param.clone());
                continue;
            };
            if !param.same_shape(&grad) {
                let err = TensorError::shape_mismatch("sgd", param.shape(), grad.shape());
                return Err(err.into());
            }
            for (v, &g) in velocity.iter_mut().zip(grad.iter()) {
                *v = self.momentum * *v + g;
            }
            let array = param
                .iter()
                .zip(velocity.iter())
                .map(|(&p, &v)| p - self.learning_rate * v)
                .collect();
            let next = RcTensor::new(array, param.shape().to_vec())?
                .to(param.device())?
                .requires_grad_(true);
            updated.push(next);
        }
        module.update_params(updated)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::Linear;
    use crate::tensor::functional;
    use approx::assert_relative_eq;

    fn layer() -> Linear<f64> {
        Linear::from_tensors(
            RcTensor::from([[0.5, -0.5], [1.0, 2.0]]),
            RcTensor::from([0.1, -0.1]),
        )
        .unwrap()
    }

    #[test]
    fn rejects_bad_hyperparameters() {
        let params = layer().params();
        assert!(matches!(
            Sgd::new(&params, 0.0, 0.5),
            Err(TrainError::InvalidConfig(_))
        ));
        assert!(matches!(
            Sgd::new(&params, 0.01, -0.1),
            Err(TrainError::InvalidConfig(_))
        ));
        assert!(matches!(
            Sgd::new(&params, f64::NAN, 0.5),
            Err(TrainError::InvalidConfig(_))
        ));
    }

    #[test]
    fn velocity_starts_at_zero() {
        let module = layer();
        let sgd = Sgd::new(&module.params(), 0.01, 0.5).unwrap();
        assert_eq!(sgd.velocity().len(), 2);
        assert!(sgd.velocity().iter().flatten().all(|&v| v == 0.0));
    }

    #[test]
    fn step_moves_every_parameter() {
        let mut module = layer();
        let before: Vec<Vec<f64>> = module.params().iter().map(|p| p.to_vec()).collect();
        let mut sgd = Sgd::new(&module.params(), 0.01, 0.5).unwrap();

        let input = RcTensor::from([[1.0, 3.0]]);
        functional::sum(&module.forward(input).unwrap())
            .backward()
            .unwrap();
        sgd.step(&mut module).unwrap();

        for (param, old) in module.params().iter().zip(before) {
            assert!(param.iter().zip(old.iter()).all(|(new, old)| new != old));
            assert!(param.requires_grad());
            assert_eq!(param.grad(), None);
        }
    }

    #[test]
    fn step_without_gradients_is_a_no_op() {
        let mut module = layer();
        let before = module.params();
        let mut sgd = Sgd::new(&before, 0.01, 0.5).unwrap();
        sgd.step(&mut module).unwrap();
        assert_eq!(module.params(), before);
        assert!(sgd.velocity().iter().flatten().all(|&v| v == 0.0));
    }

    #[test]
    fn momentum_carries_over_between_steps() {
        let (lr, momentum, g) = (0.01, 0.5, 2.0);
        let mut module = layer();
        let start = module.bias.to_vec();
        let mut sgd = Sgd::new(&module.params(), lr, momentum).unwrap();

        for _ in 0..2 {
            sgd.zero_grad(&module);
            module
                .bias
                .set_grad(RcTensor::from([g, g]))
                .unwrap();
            sgd.step(&mut module).unwrap();
        }

        let moved = start[0] - module.bias.to_vec()[0];
        assert_relative_eq!(moved, lr * g * (2.0 + momentum), epsilon = 1e-12);
        assert!(moved > 2.0 * lr * g);
        // the weight never had a gradient
        assert_eq!(module.weight.to_vec(), vec![0.5, -0.5, 1.0, 2.0]);
    }
}
