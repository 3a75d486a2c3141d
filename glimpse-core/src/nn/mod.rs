// src/nn/mod.rs
// Layer contract, layers and the per-step bookkeeping they share.

pub mod gradient_buffer;
pub mod init;
pub mod layer; // Trait Layer
pub mod layers;
pub mod snapshot;

// Re-export common items
pub use gradient_buffer::GradientBuffer;
pub use layer::Layer;
pub use layers::{Linear, MeanPooling, RecurrentAttention, Rounding};
pub use snapshot::{SnapshotStack, StepSnapshot};
