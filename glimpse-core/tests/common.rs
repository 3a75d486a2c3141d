use glimpse_core::{GlimpseError, Linear};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Shared by several test crates; not every helper is used by each of them.
#[allow(dead_code)]
pub(crate) fn seeded_matrix(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_simple_fn((rows, cols), || rng.gen_range(-1.0..1.0))
}

#[allow(dead_code)]
pub(crate) fn seeded_linear(
    in_features: usize,
    out_features: usize,
    seed: u64,
) -> Result<Linear<f64>, GlimpseError> {
    let mut rng = StdRng::seed_from_u64(seed);
    Linear::with_rng(in_features, out_features, true, &mut rng)
}
