use thiserror::Error;

/// Custom error type for the glimpse layer library.
#[derive(Error, Debug, PartialEq, Clone)] // PartialEq for easier testing
pub enum GlimpseError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Snapshot stack underflow: requested {requested} step snapshot(s), {available} available")]
    SnapshotUnderflow { requested: usize, available: usize },

    #[error("Unbalanced snapshot stack: expected {expected} pending step snapshot(s), found {actual}")]
    UnbalancedSnapshots { expected: usize, actual: usize },

    #[error("Invalid call sequence: {0}")]
    Sequencing(String),

    #[error("Gradient buffer segment [{offset}, {offset}+{len}) exceeds capacity {capacity}")]
    GradientBufferOutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<ndarray::ShapeError> for GlimpseError {
    fn from(err: ndarray::ShapeError) -> Self {
        GlimpseError::InternalError(format!("ndarray shape error: {}", err))
    }
}
