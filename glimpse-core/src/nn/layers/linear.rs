use crate::error::GlimpseError;
use crate::nn::init::xavier_uniform;
use crate::nn::layer::{check_gradient_len, Layer};
use crate::types::Element;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayViewMut1, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Applies an affine transformation to each input column: `y = W·x + b`.
///
/// `W` has shape `(out_features, in_features)`. The flat parameter vector is
/// `W` in column-major order followed by `b`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Serialize",
    deserialize = "T: Element + Deserialize<'de>"
))]
pub struct Linear<T> {
    weight: Array2<T>,
    bias: Option<Array1<T>>,
    in_features: usize,
    out_features: usize,
    #[serde(skip, default = "empty_output")]
    output: Array2<T>,
}

fn empty_output<T: Element>() -> Array2<T> {
    Array2::zeros((0, 0))
}

impl<T: Element> Linear<T> {
    /// Creates a new Linear layer with Xavier-uniform weights and zero bias.
    ///
    /// # Arguments
    ///
    /// * `in_features` - Size of each input sample.
    /// * `out_features` - Size of each output sample.
    /// * `has_bias` - If `true`, the layer will learn an additive bias.
    pub fn new(in_features: usize, out_features: usize, has_bias: bool) -> Result<Self, GlimpseError> {
        Self::with_rng(in_features, out_features, has_bias, &mut rand::thread_rng())
    }

    /// Same as [`Linear::new`] but draws the initial weights from `rng`.
    pub fn with_rng<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        has_bias: bool,
        rng: &mut R,
    ) -> Result<Self, GlimpseError> {
        if in_features == 0 || out_features == 0 {
            return Err(GlimpseError::InvalidArgument(format!(
                "Linear layer needs non-zero feature counts, got in={} out={}",
                in_features, out_features
            )));
        }
        let weight = xavier_uniform(out_features, in_features, rng)?;
        let bias = has_bias.then(|| Array1::zeros(out_features));
        Self::from_parts(weight, bias)
    }

    /// Builds a layer from explicit weights `(out, in)` and an optional bias `(out)`.
    pub fn from_parts(weight: Array2<T>, bias: Option<Array1<T>>) -> Result<Self, GlimpseError> {
        let (out_features, in_features) = weight.dim();
        if let Some(ref b) = bias {
            if b.len() != out_features {
                return Err(GlimpseError::ShapeMismatch {
                    expected: vec![out_features],
                    actual: vec![b.len()],
                    operation: "Linear::from_parts (bias)".to_string(),
                });
            }
        }
        Ok(Self {
            weight,
            bias,
            in_features,
            out_features,
            output: Array2::zeros((0, 0)),
        })
    }

    pub fn weight(&self) -> &Array2<T> {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Array1<T>> {
        self.bias.as_ref()
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }

    fn check_rows(&self, m: &Array2<T>, rows: usize, operation: &str) -> Result<(), GlimpseError> {
        if m.nrows() != rows {
            return Err(GlimpseError::ShapeMismatch {
                expected: vec![rows, m.ncols()],
                actual: m.shape().to_vec(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }
}

impl<T: Element> Layer<T> for Linear<T> {
    fn forward(&mut self, input: &Array2<T>) -> Result<Array2<T>, GlimpseError> {
        self.check_rows(input, self.in_features, "Linear::forward")?;
        let mut output = self.weight.dot(input);
        if let Some(ref b) = self.bias {
            output += &b.view().insert_axis(Axis(1));
        }
        self.output = output;
        Ok(self.output.clone())
    }

    fn backward(
        &mut self,
        _input: &Array2<T>,
        output_grad: &Array2<T>,
    ) -> Result<Array2<T>, GlimpseError> {
        self.check_rows(output_grad, self.out_features, "Linear::backward")?;
        Ok(self.weight.t().dot(output_grad))
    }

    fn gradient(
        &mut self,
        input: &Array2<T>,
        error: &Array2<T>,
        mut gradient: ArrayViewMut1<'_, T>,
    ) -> Result<(), GlimpseError> {
        check_gradient_len(&gradient, self.num_parameters(), "Linear::gradient")?;
        self.check_rows(input, self.in_features, "Linear::gradient (input)")?;
        self.check_rows(error, self.out_features, "Linear::gradient (error)")?;
        if input.ncols() != error.ncols() {
            return Err(GlimpseError::ShapeMismatch {
                expected: vec![self.out_features, input.ncols()],
                actual: error.shape().to_vec(),
                operation: "Linear::gradient".to_string(),
            });
        }

        let weight_len = self.weight.len();
        let grad_weight = error.dot(&input.t());
        // Column-major: transpose iteration walks columns first.
        for (dst, src) in gradient
            .slice_mut(s![..weight_len])
            .iter_mut()
            .zip(grad_weight.t().iter())
        {
            *dst = *src;
        }
        if self.bias.is_some() {
            gradient
                .slice_mut(s![weight_len..])
                .assign(&error.sum_axis(Axis(1)));
        }
        Ok(())
    }

    fn output(&self) -> &Array2<T> {
        &self.output
    }

    fn set_output(&mut self, output: Array2<T>) {
        self.output = output;
    }

    fn parameters(&self) -> Array1<T> {
        let mut params: Vec<T> = self.weight.t().iter().copied().collect();
        if let Some(ref b) = self.bias {
            params.extend(b.iter().copied());
        }
        Array1::from(params)
    }

    fn set_parameters(&mut self, parameters: ArrayView1<'_, T>) -> Result<(), GlimpseError> {
        if parameters.len() != self.num_parameters() {
            return Err(GlimpseError::ShapeMismatch {
                expected: vec![self.num_parameters()],
                actual: vec![parameters.len()],
                operation: "Linear::set_parameters".to_string(),
            });
        }
        let weight_len = self.weight.len();
        for (dst, src) in self
            .weight
            .view_mut()
            .reversed_axes()
            .iter_mut()
            .zip(parameters.slice(s![..weight_len]).iter())
        {
            *dst = *src;
        }
        if let Some(ref mut b) = self.bias {
            b.assign(&parameters.slice(s![weight_len..]));
        }
        Ok(())
    }

    fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.as_ref().map_or(0, |b| b.len())
    }
}

#[cfg(test)]
#[path = "linear_test.rs"]
mod tests;
