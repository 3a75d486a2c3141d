use crate::error::GlimpseError;
use crate::tensor::from_column_major;
use crate::types::Element;
use ndarray::Array2;

/// Checks if two matrices are approximately equal (shape and data within tolerance).
/// `expected_data` is given in column-major order, matching the layer layout.
/// Panics if shapes differ or data differs significantly.
pub fn check_matrix_near<T: Element>(
    actual: &Array2<T>,
    expected_shape: (usize, usize),
    expected_data: &[f64],
    tolerance: f64,
) {
    assert_eq!(actual.dim(), expected_shape, "Shape mismatch");
    assert_eq!(
        actual.len(),
        expected_data.len(),
        "Data length mismatch"
    );

    // Column-major walk: iterate the transpose.
    for (i, (a, e)) in actual.t().iter().zip(expected_data.iter()).enumerate() {
        let diff = (a.as_f64() - *e).abs();
        if diff > tolerance {
            panic!(
                "Data mismatch at index {}: actual={:?}, expected={:?}, diff={:?}, tolerance={:?}",
                i, a, e, diff, tolerance
            );
        }
    }
}

/// Helper to build a `(rows, cols)` matrix from column-major `f64` test data.
pub fn matrix_from<T: Element>(
    rows: usize,
    cols: usize,
    data: &[f64],
) -> Result<Array2<T>, GlimpseError> {
    from_column_major(rows, cols, data.iter().map(|&v| T::from_f64(v)).collect())
}
