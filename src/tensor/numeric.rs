pub use num::{Float, One, Zero};
use std::cmp::PartialEq;
use std::fmt::{Debug, Display};

pub use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// Element types a tensor can hold.
///
/// Integer types are allowed so that class labels can live in a tensor;
/// everything that differentiates additionally needs [`Float`].
pub trait Numeric:
    Add<Output = Self>
    + AddAssign
    + Copy
    + Clone
    + One
    + Mul<Output = Self>
    + Sub<Output = Self>
    + PartialEq
    + PartialOrd
    + Zero
    + Debug
    + Display
    + Send
    + Sync
    + 'static
{
}
// https://stackoverflow.com/questions/42381185/specifying-generic-parameter-to-belong-to-a-small-set-of-types
macro_rules! numeric_impl {
    ($($t: ty),+) => {
        $(
            impl Numeric for $t {}
        )+
    }
}

numeric_impl!(usize, u8, u32, u64, i32, i64, f32, f64);
