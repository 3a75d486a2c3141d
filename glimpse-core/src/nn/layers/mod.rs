// src/nn/layers/mod.rs
// Concrete layers: the linear leaf layer, mean pooling and recurrent attention.

pub mod linear;
pub mod mean_pooling;
pub mod recurrent_attention;

// Re-export key layer structs
pub use linear::Linear;
pub use mean_pooling::{MeanPooling, Rounding};
pub use recurrent_attention::RecurrentAttention;
