use crate::error::GlimpseError;
use crate::nn::layer::{check_gradient_len, Layer};
use crate::tensor::{column_major, cube_view, from_column_major};
use crate::types::Element;
use log::{debug, warn};
use ndarray::{s, Array1, Array2, Array3, ArrayView1, ArrayViewMut1, Axis, ShapeBuilder};
use serde::{Deserialize, Serialize};

/// Policy turning the fractional output-size formula into a window count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rounding {
    /// Drop trailing windows that would cross the input edge.
    #[default]
    Floor,
    /// Keep trailing windows and clip them to the input.
    Ceil,
}

/// Spatial mean pooling over `(width, height, channels, batch)` inputs.
///
/// Each input column holds `channels` slices of `width × height` values in
/// column-major order. Every output cell is the mean of the in-bounds input
/// cells of its window; clipped windows (ceil mode) divide by the number of
/// cells they actually cover.
///
/// The spatial input size is set by the surrounding network through
/// [`MeanPooling::set_input_size`]; channel count, batch size and output size
/// are derived on every forward pass and reused by the matching backward pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Serialize",
    deserialize = "T: Element + Deserialize<'de>"
))]
pub struct MeanPooling<T> {
    kernel_width: usize,
    kernel_height: usize,
    stride_width: usize,
    stride_height: usize,
    rounding: Rounding,
    input_width: usize,
    input_height: usize,
    output_width: usize,
    output_height: usize,
    in_channels: usize,
    batch_size: usize,
    #[serde(skip, default = "empty_output")]
    output: Array2<T>,
}

fn empty_output<T: Element>() -> Array2<T> {
    Array2::zeros((0, 0))
}

/// Half-open `[start, end)` range of window `index` along one axis, clipped to `extent`.
fn window_range(index: usize, stride: usize, kernel: usize, extent: usize) -> (usize, usize) {
    let start = (index * stride).min(extent);
    let end = (index * stride + kernel).min(extent);
    (start, end)
}

/// Number of windows along one axis for the given rounding policy.
fn pooled_extent(
    input: usize,
    kernel: usize,
    stride: usize,
    rounding: Rounding,
) -> Result<usize, GlimpseError> {
    let raw = (input as f64 - kernel as f64) / stride as f64 + 1.0;
    let windows = match rounding {
        Rounding::Floor => raw.floor(),
        Rounding::Ceil => raw.ceil(),
    };
    if windows < 1.0 {
        return Err(GlimpseError::InvalidArgument(format!(
            "kernel {} with stride {} yields no window over an input extent of {} ({:?} rounding)",
            kernel, stride, input, rounding
        )));
    }
    Ok(windows as usize)
}

impl<T: Element> Default for MeanPooling<T> {
    /// 2×2 kernel, stride 1, floor rounding.
    fn default() -> Self {
        Self {
            kernel_width: 2,
            kernel_height: 2,
            stride_width: 1,
            stride_height: 1,
            rounding: Rounding::Floor,
            input_width: 0,
            input_height: 0,
            output_width: 0,
            output_height: 0,
            in_channels: 0,
            batch_size: 0,
            output: Array2::zeros((0, 0)),
        }
    }
}

impl<T: Element> MeanPooling<T> {
    /// Creates a new mean-pooling layer.
    ///
    /// # Arguments
    /// * `kernel_width`, `kernel_height`: Window size.
    /// * `stride_width`, `stride_height`: Step between consecutive windows.
    /// * `rounding`: Output-size rounding policy.
    ///
    /// # Errors
    /// `InvalidArgument` if any kernel or stride dimension is zero.
    pub fn new(
        kernel_width: usize,
        kernel_height: usize,
        stride_width: usize,
        stride_height: usize,
        rounding: Rounding,
    ) -> Result<Self, GlimpseError> {
        if kernel_width == 0 || kernel_height == 0 || stride_width == 0 || stride_height == 0 {
            return Err(GlimpseError::InvalidArgument(format!(
                "MeanPooling needs positive kernel and stride, got kernel {}x{} stride {}x{}",
                kernel_width, kernel_height, stride_width, stride_height
            )));
        }
        Ok(Self {
            kernel_width,
            kernel_height,
            stride_width,
            stride_height,
            rounding,
            ..Self::default()
        })
    }

    /// Builder-style variant of [`MeanPooling::set_input_size`].
    pub fn with_input_size(mut self, width: usize, height: usize) -> Self {
        self.set_input_size(width, height);
        self
    }

    /// Sets the spatial size of the incoming feature maps.
    pub fn set_input_size(&mut self, width: usize, height: usize) {
        self.input_width = width;
        self.input_height = height;
    }

    pub fn kernel_width(&self) -> usize {
        self.kernel_width
    }

    pub fn kernel_height(&self) -> usize {
        self.kernel_height
    }

    pub fn stride_width(&self) -> usize {
        self.stride_width
    }

    pub fn stride_height(&self) -> usize {
        self.stride_height
    }

    pub fn rounding(&self) -> Rounding {
        self.rounding
    }

    pub fn input_width(&self) -> usize {
        self.input_width
    }

    pub fn input_height(&self) -> usize {
        self.input_height
    }

    pub fn output_width(&self) -> usize {
        self.output_width
    }

    pub fn output_height(&self) -> usize {
        self.output_height
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn row_window(&self, i: usize) -> (usize, usize) {
        window_range(i, self.stride_width, self.kernel_width, self.input_width)
    }

    fn col_window(&self, j: usize) -> (usize, usize) {
        window_range(j, self.stride_height, self.kernel_height, self.input_height)
    }
}

impl<T: Element> Layer<T> for MeanPooling<T> {
    fn forward(&mut self, input: &Array2<T>) -> Result<Array2<T>, GlimpseError> {
        let area = self.input_width * self.input_height;
        if area == 0 {
            return Err(GlimpseError::InvalidArgument(
                "MeanPooling input size is not set".to_string(),
            ));
        }
        if input.nrows() % area != 0 {
            return Err(GlimpseError::ShapeMismatch {
                expected: vec![self.input_width, self.input_height],
                actual: input.shape().to_vec(),
                operation: "MeanPooling::forward".to_string(),
            });
        }

        let output_width = pooled_extent(
            self.input_width,
            self.kernel_width,
            self.stride_width,
            self.rounding,
        )?;
        let output_height = pooled_extent(
            self.input_height,
            self.kernel_height,
            self.stride_height,
            self.rounding,
        )?;

        // Output geometry is fixed here and reused unchanged by backward.
        self.batch_size = input.ncols();
        self.in_channels = input.nrows() / area;
        self.output_width = output_width;
        self.output_height = output_height;

        let slices = self.in_channels * self.batch_size;
        let data = column_major(input);
        let cube = cube_view(&data, self.input_width, self.input_height, slices)?;
        let mut pooled = Array3::<T>::zeros((self.output_width, self.output_height, slices).f());

        let mut empty_windows = 0usize;
        for (slice_idx, slice) in cube.axis_iter(Axis(2)).enumerate() {
            for j in 0..self.output_height {
                let (c0, c1) = self.col_window(j);
                for i in 0..self.output_width {
                    let (r0, r1) = self.row_window(i);
                    let count = (r1 - r0) * (c1 - c0);
                    if count == 0 {
                        empty_windows += 1;
                        continue;
                    }
                    let sum = slice.slice(s![r0..r1, c0..c1]).sum();
                    pooled[[i, j, slice_idx]] = sum / T::from_count(count);
                }
            }
        }
        if empty_windows > 0 {
            warn!(
                "MeanPooling: {} window(s) start past the input edge and pool to zero",
                empty_windows
            );
        }

        debug!(
            "MeanPooling: forward {}x{}x{} (batch {}) -> {}x{}",
            self.input_width,
            self.input_height,
            self.in_channels,
            self.batch_size,
            self.output_width,
            self.output_height
        );

        self.output = from_column_major(
            self.output_width * self.output_height * self.in_channels,
            self.batch_size,
            pooled.into_raw_vec(),
        )?;
        Ok(self.output.clone())
    }

    fn backward(
        &mut self,
        _input: &Array2<T>,
        output_grad: &Array2<T>,
    ) -> Result<Array2<T>, GlimpseError> {
        if self.output_width == 0 || self.output_height == 0 {
            return Err(GlimpseError::Sequencing(
                "MeanPooling::backward called before forward".to_string(),
            ));
        }
        let slices = self.in_channels * self.batch_size;
        let expected = self.output_width * self.output_height * slices;
        if output_grad.len() != expected {
            return Err(GlimpseError::ShapeMismatch {
                expected: vec![self.output_width * self.output_height * self.in_channels, self.batch_size],
                actual: output_grad.shape().to_vec(),
                operation: "MeanPooling::backward".to_string(),
            });
        }

        let data = column_major(output_grad);
        let mapped_error = cube_view(&data, self.output_width, self.output_height, slices)?;
        let mut grad = Array3::<T>::zeros((self.input_width, self.input_height, slices).f());

        // Windows may overlap (stride < kernel), so shares accumulate.
        for (slice_idx, error) in mapped_error.axis_iter(Axis(2)).enumerate() {
            for j in 0..self.output_height {
                let (c0, c1) = self.col_window(j);
                for i in 0..self.output_width {
                    let (r0, r1) = self.row_window(i);
                    let count = (r1 - r0) * (c1 - c0);
                    if count == 0 {
                        continue;
                    }
                    let share = error[[i, j]] / T::from_count(count);
                    let mut window = grad.slice_mut(s![r0..r1, c0..c1, slice_idx]);
                    window += share;
                }
            }
        }

        from_column_major(
            self.input_width * self.input_height * self.in_channels,
            self.batch_size,
            grad.into_raw_vec(),
        )
    }

    fn gradient(
        &mut self,
        _input: &Array2<T>,
        _error: &Array2<T>,
        gradient: ArrayViewMut1<'_, T>,
    ) -> Result<(), GlimpseError> {
        // No learnable parameters.
        check_gradient_len(&gradient, 0, "MeanPooling::gradient")
    }

    fn output(&self) -> &Array2<T> {
        &self.output
    }

    fn set_output(&mut self, output: Array2<T>) {
        self.output = output;
    }

    fn parameters(&self) -> Array1<T> {
        Array1::zeros(0)
    }

    fn set_parameters(&mut self, parameters: ArrayView1<'_, T>) -> Result<(), GlimpseError> {
        if !parameters.is_empty() {
            return Err(GlimpseError::ShapeMismatch {
                expected: vec![0],
                actual: vec![parameters.len()],
                operation: "MeanPooling::set_parameters".to_string(),
            });
        }
        Ok(())
    }

    fn num_parameters(&self) -> usize {
        0
    }
}

#[cfg(test)]
#[path = "mean_pooling_test.rs"]
mod tests;
