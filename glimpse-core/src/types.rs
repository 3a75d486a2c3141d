use ndarray::{LinalgScalar, ScalarOperand};
use num_traits::{Float, NumAssignOps};
use std::fmt::Debug;

/// A trait representing the numeric element types usable by glimpse layers.
///
/// It bounds the types (`f32`, `f64`) that can flow through the generic layer
/// kernels: float math from `num_traits`, in-place arithmetic, and the scalar
/// traits `ndarray` needs for matrix products and scalar broadcasting.
pub trait Element:
    Float // Includes Num + Copy + Bounded + Signed + etc.
    + NumAssignOps // AddAssign, SubAssign, MulAssign, DivAssign, RemAssign
    + LinalgScalar // Required by `dot`
    + ScalarOperand // Required for `array * scalar`
    + Debug
    + Send
    + Sync
    + 'static
{
    /// Converts a count (window size, fan-in, ...) to the element type.
    fn from_count(value: usize) -> Self;

    /// Narrows an `f64` (finite-difference perturbations, test data) to the element type.
    fn from_f64(value: f64) -> Self;

    /// Widens the value to `f64`, used for tolerances and finite differences.
    fn as_f64(self) -> f64;
}

impl Element for f32 {
    fn from_count(value: usize) -> Self {
        value as f32
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Element for f64 {
    fn from_count(value: usize) -> Self {
        value as f64
    }

    fn from_f64(value: f64) -> Self {
        value
    }

    fn as_f64(self) -> f64 {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Function requiring the Element bound
    fn process_element<T: Element>(value: T) -> f64 {
        (value * T::from_count(2)).as_f64()
    }

    #[test]
    fn test_f32_impl_element() {
        assert_eq!(process_element(1.5f32), 3.0);
    }

    #[test]
    fn test_f64_impl_element() {
        assert_eq!(process_element(-0.25f64), -0.5);
    }
}
