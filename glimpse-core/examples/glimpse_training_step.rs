//! # Training a Small Glimpse Model on CPU
//!
//! This example pools a batch of feature maps and runs a recurrent-attention
//! layer over the pooled features, updating its parameters by plain
//! gradient descent.
//!
//! ## Demonstrated Features:
//! 1.  **Mean pooling** of `4×4` maps with a `2×2` kernel.
//! 2.  **Recurrent attention** with `Linear` recurrent and action modules.
//! 3.  **Manual training loop**:
//!     -   Forward pass through both layers.
//!     -   Squared-error loss against a fixed target.
//!     -   Back-propagation through time and parameter-gradient collection.
//!     -   Parameter update via `set_parameters`.
//! 4.  **Inference** in deterministic mode (no snapshots kept).
//!
//! ## Running
//! `cargo run --example glimpse_training_step`

use glimpse_core::{GlimpseError, Layer, Linear, MeanPooling, RecurrentAttention, Rounding};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn main() -> Result<(), GlimpseError> {
    let mut rng = StdRng::seed_from_u64(42);

    let mut pool = MeanPooling::new(2, 2, 2, 2, Rounding::Floor)?.with_input_size(4, 4);
    let rnn = Linear::with_rng(4, 3, true, &mut rng)?;
    let action = Linear::with_rng(3, 2, true, &mut rng)?;
    let mut attention = RecurrentAttention::new(3, rnn, action, 3)?;

    let maps = Array2::from_shape_simple_fn((16, 1), || rng.gen_range(0.0..1.0));
    let target = Array2::from_elem((3, 2), 0.5);
    let learning_rate = 0.1;

    println!("Starting training...");
    for epoch in 0..20 {
        let pooled = pool.forward(&maps)?;
        let output = attention.forward(&pooled)?;

        let diff = &output - &target;
        let loss = diff.mapv(|d| d * d).mean().unwrap_or(0.0);
        let output_grad = diff.mapv(|d| 2.0 * d / output.len() as f64);

        attention.backward(&pooled, &output_grad)?;
        let mut gradient = Array1::zeros(attention.num_parameters());
        attention.gradient(&pooled, &output_grad, gradient.view_mut())?;

        let updated = attention.parameters() - &(gradient * learning_rate);
        attention.set_parameters(updated.view())?;

        if epoch % 5 == 0 {
            println!("Epoch {:>2}: loss = {:.6}", epoch, loss);
        }
    }

    attention.set_deterministic(true);
    let pooled = pool.forward(&maps)?;
    let prediction = attention.forward(&pooled)?;
    println!("Prediction after training:\n{:.4}", prediction);
    Ok(())
}
