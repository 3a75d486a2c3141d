//! Dense tensor substrate.
//!
//! Layers exchange `ndarray::Array2` matrices shaped `(features, batch)`, one
//! column per sample. Every flatten/reshape in this crate uses column-major
//! (first index fastest) element order, so a `(features, batch)` matrix and a
//! `(width, height, slices)` cube over the same buffer agree on which element
//! is which.

use crate::error::GlimpseError;
use crate::types::Element;
use ndarray::{Array2, ArrayView3, ShapeBuilder};
use std::borrow::Cow;

/// Returns the elements of `matrix` in column-major order.
///
/// Borrows the underlying buffer when the matrix is already Fortran-contiguous
/// and collects a copy otherwise.
pub fn column_major<T: Element>(matrix: &Array2<T>) -> Cow<'_, [T]> {
    // The transpose of a column-major matrix is a standard-layout view.
    match matrix.t().to_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(matrix.t().iter().copied().collect()),
    }
}

/// Builds a `(rows, cols)` matrix from elements given in column-major order.
pub fn from_column_major<T: Element>(
    rows: usize,
    cols: usize,
    data: Vec<T>,
) -> Result<Array2<T>, GlimpseError> {
    if data.len() != rows * cols {
        return Err(GlimpseError::ShapeMismatch {
            expected: vec![rows, cols],
            actual: vec![data.len()],
            operation: "from_column_major".to_string(),
        });
    }
    Ok(Array2::from_shape_vec((rows, cols).f(), data)?)
}

/// Reinterprets `matrix` as `(rows, cols)` keeping column-major element order.
pub fn reshape<T: Element>(
    matrix: &Array2<T>,
    rows: usize,
    cols: usize,
) -> Result<Array2<T>, GlimpseError> {
    if matrix.len() != rows * cols {
        return Err(GlimpseError::ShapeMismatch {
            expected: vec![rows, cols],
            actual: matrix.shape().to_vec(),
            operation: "reshape".to_string(),
        });
    }
    from_column_major(rows, cols, column_major(matrix).into_owned())
}

/// Views a flat column-major buffer as a `(rows, cols, slices)` cube without copying.
pub fn cube_view<T: Element>(
    data: &[T],
    rows: usize,
    cols: usize,
    slices: usize,
) -> Result<ArrayView3<'_, T>, GlimpseError> {
    if data.len() != rows * cols * slices {
        return Err(GlimpseError::ShapeMismatch {
            expected: vec![rows, cols, slices],
            actual: vec![data.len()],
            operation: "cube_view".to_string(),
        });
    }
    Ok(ArrayView3::from_shape((rows, cols, slices).f(), data)?)
}

/// Zero-initialised `(rows, cols)` matrix.
pub fn zeros<T: Element>(rows: usize, cols: usize) -> Array2<T> {
    Array2::zeros((rows, cols))
}

#[cfg(test)]
#[path = "tensor_test.rs"]
mod tests;
