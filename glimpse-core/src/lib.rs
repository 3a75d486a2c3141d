//! Neural-network layers with explicit forward, backward and gradient passes.
//!
//! Two layers make up the core of the crate:
//!
//! * [`MeanPooling`]: spatial mean pooling over `(width, height, channels,
//!   batch)` inputs with floor or ceil output rounding.
//! * [`RecurrentAttention`]: a glimpse-based attention layer that unrolls an
//!   action module and a recurrent module for a fixed number of steps and
//!   back-propagates through time from per-step snapshots.
//!
//! Every layer implements [`Layer`]. Matrices are `(features, batch)` and all
//! flattening follows column-major order.

pub mod error;
pub mod nn;
pub mod tensor;
pub mod types;
pub mod utils;

pub use error::GlimpseError;
pub use nn::{Layer, Linear, MeanPooling, RecurrentAttention, Rounding};
pub use types::Element;

// Re-export traits required by public functions/structs
pub use ndarray;
pub use num_traits;
