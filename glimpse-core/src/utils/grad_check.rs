//! Finite-difference checks for layer gradients.
//!
//! The scalar loss used throughout is `L(x) = Σ forward(x) ⊙ output_grad`, whose
//! gradient with respect to the input is exactly what `backward` must return and
//! whose gradient with respect to the parameters is what `gradient` must write.

use crate::error::GlimpseError;
use crate::nn::layer::Layer;
use crate::types::Element;
use ndarray::{Array1, Array2};
use thiserror::Error;

/// Error type specifically for gradient checking failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradCheckError {
    #[error("Gradient check failed for {target} at element index {element_index}: Analytical grad {analytical_grad:?} != Numerical grad {numerical_grad:?}. Difference: {difference:?}")]
    GradientMismatch {
        target: &'static str,
        element_index: usize,
        analytical_grad: f64,
        numerical_grad: f64,
        difference: f64,
    },

    #[error("Numerical gradient is NaN or infinite for {target}, element {element_index}. Details: Loss+: {loss_plus:?}, Loss-: {loss_minus:?}")]
    NumericalGradNaNOrInfinite {
        target: &'static str,
        element_index: usize,
        loss_plus: f64,
        loss_minus: f64,
    },

    #[error("Analytical gradient has {actual} element(s) for {target}, expected {expected}")]
    AnalyticalGradShape {
        target: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Layer error during gradient check: {0}")]
    LayerError(GlimpseError),
}

impl From<GlimpseError> for GradCheckError {
    fn from(err: GlimpseError) -> Self {
        GradCheckError::LayerError(err)
    }
}

fn weighted_loss<T: Element>(output: &Array2<T>, output_grad: &Array2<T>) -> Result<f64, GlimpseError> {
    if output.dim() != output_grad.dim() {
        return Err(GlimpseError::ShapeMismatch {
            expected: output.shape().to_vec(),
            actual: output_grad.shape().to_vec(),
            operation: "grad_check loss".to_string(),
        });
    }
    Ok(output
        .iter()
        .zip(output_grad.iter())
        .map(|(o, g)| o.as_f64() * g.as_f64())
        .sum())
}

fn compare(
    target: &'static str,
    element_index: usize,
    analytical: f64,
    loss_plus: f64,
    loss_minus: f64,
    epsilon: f64,
    tolerance: f64,
) -> Result<(), GradCheckError> {
    let numerical = (loss_plus - loss_minus) / (2.0 * epsilon);
    if !numerical.is_finite() {
        return Err(GradCheckError::NumericalGradNaNOrInfinite {
            target,
            element_index,
            loss_plus,
            loss_minus,
        });
    }
    let difference = (analytical - numerical).abs();
    if difference > tolerance {
        return Err(GradCheckError::GradientMismatch {
            target,
            element_index,
            analytical_grad: analytical,
            numerical_grad: numerical,
            difference,
        });
    }
    Ok(())
}

/// Checks `layer.backward` against central differences of the forward pass.
pub fn check_input_grad<T, L>(
    layer: &mut L,
    input: &Array2<T>,
    output_grad: &Array2<T>,
    epsilon: f64,
    tolerance: f64,
) -> Result<(), GradCheckError>
where
    T: Element,
    L: Layer<T> + ?Sized,
{
    layer.forward(input)?;
    let analytical = layer.backward(input, output_grad)?;
    if analytical.dim() != input.dim() {
        return Err(GradCheckError::AnalyticalGradShape {
            target: "input",
            expected: input.len(),
            actual: analytical.len(),
        });
    }

    let mut perturbed = input.clone();
    for (element_index, (idx, &original)) in input.indexed_iter().enumerate() {
        perturbed[idx] = T::from_f64(original.as_f64() + epsilon);
        let loss_plus = weighted_loss(&layer.forward(&perturbed)?, output_grad)?;
        perturbed[idx] = T::from_f64(original.as_f64() - epsilon);
        let loss_minus = weighted_loss(&layer.forward(&perturbed)?, output_grad)?;
        perturbed[idx] = original;

        compare(
            "input",
            element_index,
            analytical[idx].as_f64(),
            loss_plus,
            loss_minus,
            epsilon,
            tolerance,
        )?;
    }
    Ok(())
}

/// Checks `layer.gradient` against central differences over the parameter vector.
pub fn check_parameter_grad<T, L>(
    layer: &mut L,
    input: &Array2<T>,
    output_grad: &Array2<T>,
    epsilon: f64,
    tolerance: f64,
) -> Result<(), GradCheckError>
where
    T: Element,
    L: Layer<T> + ?Sized,
{
    layer.forward(input)?;
    let mut analytical = Array1::zeros(layer.num_parameters());
    layer.gradient(input, output_grad, analytical.view_mut())?;

    let original = layer.parameters();
    let mut perturbed = original.clone();
    for element_index in 0..original.len() {
        let value = original[element_index].as_f64();

        perturbed[element_index] = T::from_f64(value + epsilon);
        layer.set_parameters(perturbed.view())?;
        let loss_plus = weighted_loss(&layer.forward(input)?, output_grad)?;

        perturbed[element_index] = T::from_f64(value - epsilon);
        layer.set_parameters(perturbed.view())?;
        let loss_minus = weighted_loss(&layer.forward(input)?, output_grad)?;

        perturbed[element_index] = original[element_index];
        compare(
            "parameters",
            element_index,
            analytical[element_index].as_f64(),
            loss_plus,
            loss_minus,
            epsilon,
            tolerance,
        )?;
    }
    layer.set_parameters(original.view())?;
    layer.forward(input)?;
    Ok(())
}

#[cfg(test)]
#[path = "grad_check_test.rs"]
mod tests;
