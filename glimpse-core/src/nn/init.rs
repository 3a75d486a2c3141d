use crate::error::GlimpseError;
use crate::types::Element;
use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Uniform};

/// Returns a `(fan_out, fan_in)` matrix drawn from the Xavier/Glorot uniform
/// distribution `U(-a, a)` with `a = sqrt(6 / (fan_in + fan_out))`.
///
/// # Arguments
/// * `fan_out`: Number of rows (output features).
/// * `fan_in`: Number of columns (input features).
/// * `rng`: Random source, seed it for reproducible initialisation.
pub fn xavier_uniform<T: Element, R: Rng + ?Sized>(
    fan_out: usize,
    fan_in: usize,
    rng: &mut R,
) -> Result<Array2<T>, GlimpseError> {
    if fan_in + fan_out == 0 {
        return Err(GlimpseError::InvalidArgument(
            "xavier_uniform requires fan_in + fan_out > 0".to_string(),
        ));
    }
    let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
    let dist = Uniform::new_inclusive(-bound, bound);
    Ok(Array2::from_shape_simple_fn((fan_out, fan_in), || {
        T::from_f64(dist.sample(rng))
    }))
}

// --- Tests ---
#[cfg(test)]
#[path = "init_test.rs"]
mod tests; // Link to the test file
