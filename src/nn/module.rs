use crate::tensor::{Device, Numeric, Result, TensorList};

pub(crate) mod private {
    pub trait Private {}
}

/// A stateful, parameterised function.
///
/// Parameters are handed out as shared handles by [`Module::params`] and swapped
/// back in by [`Module::update_params`], which is how optimisers write their
/// updates.
pub trait Module<T: Numeric>: private::Private {
    type InputType;
    type OutputType;

    fn forward(&self, inputs: Self::InputType) -> Result<Self::OutputType>;

    fn params(&self) -> TensorList<T>;

    /// Replaces the parameters, in the order [`Module::params`] returns them.
    fn update_params(&mut self, new_params: TensorList<T>) -> Result<()>;

    fn zero_grad(&self) {
        self.params().iter().for_each(|param| param.zero_grad());
    }

    /// Moves every parameter to `device`.
    fn to(&mut self, device: Device) -> Result<()> {
        let moved = self
            .params()
            .iter()
            .map(|param| param.to(device))
            .collect::<Result<TensorList<T>>>()?;
        self.update_params(moved)
    }
}
