use crate::tensor::RcTensor;

// These are aliases rather than types of their own; they exist for readability.
pub type TensorList<T> = Vec<RcTensor<T>>;

/// A rank-0 tensor.
pub type Scalar<T> = RcTensor<T>;
