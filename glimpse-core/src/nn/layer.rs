use crate::error::GlimpseError;
use crate::types::Element;
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1};

/// The base trait for all trainable layers.
///
/// A layer is driven by the surrounding network through three passes:
/// `forward` computes (and stores) the output, `backward` maps an output
/// gradient to an input gradient, and `gradient` computes the gradient of
/// the layer's parameters. Matrices are `(features, batch)`.
///
/// The trait is object safe; `Box<dyn Layer<T>>` implements it as well.
pub trait Layer<T: Element>: std::fmt::Debug + Send + Sync {
    /// Performs a forward pass and stores the result as the layer's output.
    ///
    /// # Arguments
    /// * `input`: The `(features, batch)` input matrix.
    ///
    /// # Returns
    /// A copy of the new output, or a `GlimpseError` if the input shape is incompatible.
    fn forward(&mut self, input: &Array2<T>) -> Result<Array2<T>, GlimpseError>;

    /// Propagates `output_grad` back to the layer's input.
    ///
    /// # Arguments
    /// * `input`: The input (or, for some layers, the output) the pass refers to.
    /// * `output_grad`: Gradient of the loss with respect to the layer's output.
    ///
    /// # Returns
    /// The gradient of the loss with respect to the layer's input.
    fn backward(
        &mut self,
        input: &Array2<T>,
        output_grad: &Array2<T>,
    ) -> Result<Array2<T>, GlimpseError>;

    /// Computes the gradient of the layer's parameters.
    ///
    /// The result is written into `gradient`, whose length must equal
    /// [`Layer::num_parameters`]. Callers may pass a segment of a larger
    /// buffer to collect several layers' gradients without copies.
    fn gradient(
        &mut self,
        input: &Array2<T>,
        error: &Array2<T>,
        gradient: ArrayViewMut1<'_, T>,
    ) -> Result<(), GlimpseError>;

    /// The output computed by the most recent forward pass.
    fn output(&self) -> &Array2<T>;

    /// Overwrites the stored output, e.g. when replaying a saved time step.
    fn set_output(&mut self, output: Array2<T>);

    /// Returns the flattened parameter vector.
    fn parameters(&self) -> Array1<T>;

    /// Replaces the parameters from a flat vector laid out like [`Layer::parameters`].
    fn set_parameters(&mut self, parameters: ArrayView1<'_, T>) -> Result<(), GlimpseError>;

    /// Number of learnable parameters.
    fn num_parameters(&self) -> usize {
        self.parameters().len()
    }

    /// Switches between training (`false`) and inference (`true`) behaviour.
    fn set_deterministic(&mut self, _deterministic: bool) {}

    /// Whether the layer currently runs in inference mode.
    fn deterministic(&self) -> bool {
        false
    }
}

impl<T: Element> Layer<T> for Box<dyn Layer<T>> {
    fn forward(&mut self, input: &Array2<T>) -> Result<Array2<T>, GlimpseError> {
        (**self).forward(input)
    }

    fn backward(
        &mut self,
        input: &Array2<T>,
        output_grad: &Array2<T>,
    ) -> Result<Array2<T>, GlimpseError> {
        (**self).backward(input, output_grad)
    }

    fn gradient(
        &mut self,
        input: &Array2<T>,
        error: &Array2<T>,
        gradient: ArrayViewMut1<'_, T>,
    ) -> Result<(), GlimpseError> {
        (**self).gradient(input, error, gradient)
    }

    fn output(&self) -> &Array2<T> {
        (**self).output()
    }

    fn set_output(&mut self, output: Array2<T>) {
        (**self).set_output(output)
    }

    fn parameters(&self) -> Array1<T> {
        (**self).parameters()
    }

    fn set_parameters(&mut self, parameters: ArrayView1<'_, T>) -> Result<(), GlimpseError> {
        (**self).set_parameters(parameters)
    }

    fn num_parameters(&self) -> usize {
        (**self).num_parameters()
    }

    fn set_deterministic(&mut self, deterministic: bool) {
        (**self).set_deterministic(deterministic)
    }

    fn deterministic(&self) -> bool {
        (**self).deterministic()
    }
}

/// Checks that a parameter-gradient destination has exactly `expected` slots.
pub(crate) fn check_gradient_len<T>(
    gradient: &ArrayViewMut1<'_, T>,
    expected: usize,
    operation: &str,
) -> Result<(), GlimpseError> {
    if gradient.len() != expected {
        return Err(GlimpseError::ShapeMismatch {
            expected: vec![expected],
            actual: vec![gradient.len()],
            operation: operation.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "layer_test.rs"]
mod tests;
