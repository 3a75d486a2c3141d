use crate::error::GlimpseError;
use crate::nn::gradient_buffer::GradientBuffer;
use crate::nn::layer::{check_gradient_len, Layer};
use crate::nn::snapshot::{SnapshotStack, StepSnapshot};
use crate::tensor::{column_major, from_column_major, reshape, zeros};
use crate::types::Element;
use log::{debug, trace};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayViewMut1, Axis};
use serde::{Deserialize, Serialize};

/// Glimpse-based recurrent attention unrolled for a fixed number of steps.
///
/// Each step feeds the action module (the initial action input at step 0, the
/// recurrent module's hidden state afterwards), stacks the raw input and the
/// action output into a two-column glimpse, and advances the recurrent
/// module on that glimpse. The final recurrent output is the layer output.
///
/// In training mode every step's sub-layer outputs are pushed onto a
/// snapshot stack; `backward` pops them in reverse to replay the steps.
/// Only the last time step sees the external output gradient; every earlier
/// step receives its recurrent error through the action path of the step
/// after it.
///
/// Both sub-layers are treated as leaf layers: their own `parameters()` are
/// all that is counted and snapshotted.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(
    serialize = "R: Serialize, A: Serialize",
    deserialize = "T: Element, R: Deserialize<'de>, A: Deserialize<'de>"
))]
pub struct RecurrentAttention<T, R, A> {
    out_size: usize,
    rho: usize,
    forward_step: usize,
    backward_step: usize,
    recurrent: R,
    action: A,
    #[serde(skip)]
    deterministic: bool,
    #[serde(skip)]
    pending_backward: bool,
    #[serde(skip)]
    snapshots: SnapshotStack<T>,
    #[serde(skip)]
    initial_input: Option<Array2<T>>,
    #[serde(skip)]
    intermediate_gradient: Option<GradientBuffer<T>>,
    #[serde(skip)]
    attention_gradient: Option<GradientBuffer<T>>,
    #[serde(skip)]
    action_error: Option<Array2<T>>,
    #[serde(skip, default = "empty_output")]
    output: Array2<T>,
}

fn empty_output<T: Element>() -> Array2<T> {
    Array2::zeros((0, 0))
}

/// Two-column glimpse: column 0 is the raw input, column 1 starts with the
/// action output and is zero padded.
fn build_glimpse<T: Element>(input: &[T], action_output: &Array2<T>) -> Result<Array2<T>, GlimpseError> {
    let rows = input.len();
    let action = column_major(action_output);
    if action.len() > rows {
        return Err(GlimpseError::ShapeMismatch {
            expected: vec![rows],
            actual: vec![action.len()],
            operation: "RecurrentAttention glimpse (action output longer than input)".to_string(),
        });
    }
    let mut data = vec![T::zero(); rows * 2];
    data[..rows].copy_from_slice(input);
    data[rows..rows + action.len()].copy_from_slice(&action);
    from_column_major(rows, 2, data)
}

impl<T, R, A> RecurrentAttention<T, R, A>
where
    T: Element,
    R: Layer<T>,
    A: Layer<T>,
{
    /// Creates a new recurrent-attention layer owning both sub-layers.
    ///
    /// # Arguments
    /// * `out_size`: Width of the action channel's initial input.
    /// * `recurrent`: The recurrent module, fed with the glimpse each step.
    /// * `action`: The action module, proposing the glimpse parameters.
    /// * `rho`: Number of unrolled steps.
    pub fn new(out_size: usize, recurrent: R, action: A, rho: usize) -> Result<Self, GlimpseError> {
        if rho == 0 || out_size == 0 {
            return Err(GlimpseError::InvalidArgument(format!(
                "RecurrentAttention needs positive out_size and rho, got out_size={} rho={}",
                out_size, rho
            )));
        }
        Ok(Self {
            out_size,
            rho,
            forward_step: 0,
            backward_step: 0,
            recurrent,
            action,
            deterministic: false,
            pending_backward: false,
            snapshots: SnapshotStack::new(),
            initial_input: None,
            intermediate_gradient: None,
            attention_gradient: None,
            action_error: None,
            output: Array2::zeros((0, 0)),
        })
    }

    pub fn out_size(&self) -> usize {
        self.out_size
    }

    pub fn rho(&self) -> usize {
        self.rho
    }

    pub fn recurrent(&self) -> &R {
        &self.recurrent
    }

    pub fn recurrent_mut(&mut self) -> &mut R {
        &mut self.recurrent
    }

    pub fn action(&self) -> &A {
        &self.action
    }

    pub fn action_mut(&mut self) -> &mut A {
        &mut self.action
    }

    pub fn forward_step(&self) -> usize {
        self.forward_step
    }

    pub fn backward_step(&self) -> usize {
        self.backward_step
    }

    /// Number of step snapshots waiting to be replayed by `backward`.
    pub fn pending_snapshots(&self) -> usize {
        self.snapshots.len()
    }

    /// Discards undrained snapshots, e.g. after a training forward pass that
    /// will not be followed by a backward pass.
    ///
    /// A `backward` that fails after validation does this itself; the next
    /// training pass starts with a fresh `forward`.
    pub fn clear_snapshots(&mut self) {
        self.snapshots.clear();
        self.pending_backward = false;
        self.backward_step = 0;
    }

    /// Parameter gradient accumulated over all steps by the last `backward`.
    pub fn attention_gradient(&self) -> Option<ArrayView1<'_, T>> {
        self.attention_gradient.as_ref().map(|g| g.view())
    }

    fn initial_input(&self) -> Result<&Array2<T>, GlimpseError> {
        self.initial_input.as_ref().ok_or_else(|| {
            GlimpseError::InternalError("initial action input is not allocated".to_string())
        })
    }

    /// Runs the `rho` forward steps and returns the snapshots they produced
    /// (empty in deterministic mode).
    fn unroll(&mut self, input: &Array2<T>) -> Result<Vec<StepSnapshot<T>>, GlimpseError> {
        let input_data = column_major(input);
        let mut steps = Vec::with_capacity(if self.deterministic { 0 } else { self.rho });
        for step in 0..self.rho {
            self.forward_step = step;
            if step == 0 {
                let initial = self.initial_input()?.clone();
                self.action.forward(&initial)?;
            } else {
                let hidden = self.recurrent.output().clone();
                self.action.forward(&hidden)?;
            }

            let glimpse = build_glimpse(&input_data, self.action.output())?;
            self.recurrent.forward(&glimpse)?;

            if !self.deterministic {
                steps.push(StepSnapshot {
                    recurrent: self.recurrent.output().clone(),
                    action: self.action.output().clone(),
                });
            }
            trace!("RecurrentAttention: forward step {}/{}", step + 1, self.rho);
        }
        Ok(steps)
    }

    /// Back-propagates through time over the stored snapshots, last time
    /// step first.
    fn replay(&mut self, input: &Array2<T>, output_grad: &Array2<T>) -> Result<Array2<T>, GlimpseError> {
        if self.intermediate_gradient.is_none() && self.backward_step == 0 {
            let weights = self.recurrent.num_parameters() + self.action.num_parameters();
            debug!(
                "RecurrentAttention: allocating attention gradient for {} parameter(s)",
                weights
            );
            self.intermediate_gradient = Some(GradientBuffer::zeros(weights));
            self.attention_gradient = Some(GradientBuffer::zeros(weights));
            self.action_error = Some(Array2::zeros(self.action.output().dim()));
        }

        if self.backward_step == 0 {
            if let Some(attention) = self.attention_gradient.as_mut() {
                attention.fill_zero();
            }
        }

        let input_data = column_major(input).into_owned();
        let mut input_grad: Option<Array1<T>> = None;
        let mut action_delta: Option<Array2<T>> = None;

        while self.backward_step < self.rho {
            let recurrent_error = if self.backward_step == 0 {
                output_grad.clone()
            } else {
                action_delta.take().ok_or_else(|| {
                    GlimpseError::InternalError("missing action delta from the later step".to_string())
                })?
            };

            let snapshot = self.snapshots.pop()?;
            self.recurrent.set_output(snapshot.recurrent);
            self.action.set_output(snapshot.action);

            // The error buffer follows the restored action output's shape.
            let action_dim = self.action.output().dim();
            if self.action_error.as_ref().map_or(true, |e| e.dim() != action_dim) {
                self.action_error = Some(Array2::zeros(action_dim));
            }

            let delta = {
                let action_error = self.action_error.as_ref().ok_or_else(|| {
                    GlimpseError::InternalError("action error buffer is not allocated".to_string())
                })?;
                if self.backward_step == self.rho - 1 {
                    let own_output = self.action.output().clone();
                    self.action.backward(&own_output, action_error)?
                } else {
                    let initial = self.initial_input.as_ref().ok_or_else(|| {
                        GlimpseError::InternalError("initial action input is not allocated".to_string())
                    })?;
                    self.action.backward(initial, action_error)?
                }
            };

            let recurrent_output = self.recurrent.output().clone();
            let recurrent_delta = self.recurrent.backward(&recurrent_output, &recurrent_error)?;
            if recurrent_delta.ncols() < 2 {
                return Err(GlimpseError::ShapeMismatch {
                    expected: vec![input_data.len(), 2],
                    actual: recurrent_delta.shape().to_vec(),
                    operation: "RecurrentAttention::backward (recurrent delta)".to_string(),
                });
            }
            let glimpse_grad = recurrent_delta.column(1);
            match input_grad {
                None => input_grad = Some(glimpse_grad.to_owned()),
                Some(ref mut total) => {
                    if total.len() != glimpse_grad.len() {
                        return Err(GlimpseError::ShapeMismatch {
                            expected: vec![total.len()],
                            actual: vec![glimpse_grad.len()],
                            operation: "RecurrentAttention::backward (input gradient)".to_string(),
                        });
                    }
                    *total += &glimpse_grad;
                }
            }

            self.accumulate_step_gradient(&input_data, &recurrent_error)?;
            action_delta = Some(delta);

            trace!(
                "RecurrentAttention: backward step {}/{} (time step {})",
                self.backward_step + 1,
                self.rho,
                self.rho - 1 - self.backward_step
            );
            self.backward_step += 1;
        }

        self.backward_step = 0;
        self.pending_backward = false;
        debug!("RecurrentAttention: backward replayed {} step(s)", self.rho);

        let input_grad = input_grad.ok_or_else(|| {
            GlimpseError::InternalError("backward produced no input gradient".to_string())
        })?;
        reshape(&input_grad.insert_axis(Axis(1)), input.nrows(), input.ncols())
    }

    /// Adds the current step's parameter gradients to the attention gradient.
    ///
    /// The recurrent module writes into `[0, r)` and the action module into
    /// `[r, r + a)` of the intermediate buffer, which is then summed into
    /// the running total.
    fn accumulate_step_gradient(
        &mut self,
        input: &[T],
        recurrent_error: &Array2<T>,
    ) -> Result<(), GlimpseError> {
        let time_step = self.rho - 1 - self.backward_step;
        let recurrent_len = self.recurrent.num_parameters();
        let action_len = self.action.num_parameters();

        // The action module saw the initial input at t = 0 and the previous
        // hidden state otherwise; that state is the next snapshot to pop.
        let action_input = if time_step == 0 {
            self.initial_input()?.clone()
        } else {
            self.snapshots
                .peek()
                .map(|previous| previous.recurrent.clone())
                .ok_or(GlimpseError::SnapshotUnderflow {
                    requested: 1,
                    available: 0,
                })?
        };
        let glimpse = build_glimpse(input, self.action.output())?;

        let action_error = self.action_error.as_ref().ok_or_else(|| {
            GlimpseError::InternalError("action error buffer is not allocated".to_string())
        })?;
        let intermediate = self.intermediate_gradient.as_mut().ok_or_else(|| {
            GlimpseError::InternalError("intermediate gradient is not allocated".to_string())
        })?;
        intermediate.fill_zero();
        self.action.gradient(
            &action_input,
            action_error,
            intermediate.segment_mut(recurrent_len, action_len)?,
        )?;
        self.recurrent.gradient(
            &glimpse,
            recurrent_error,
            intermediate.segment_mut(0, recurrent_len)?,
        )?;

        let attention = self.attention_gradient.as_mut().ok_or_else(|| {
            GlimpseError::InternalError("attention gradient is not allocated".to_string())
        })?;
        attention.accumulate(intermediate)
    }
}

impl<T, R, A> Layer<T> for RecurrentAttention<T, R, A>
where
    T: Element,
    R: Layer<T>,
    A: Layer<T>,
{
    fn forward(&mut self, input: &Array2<T>) -> Result<Array2<T>, GlimpseError> {
        if !self.deterministic && !self.snapshots.is_empty() {
            return Err(GlimpseError::UnbalancedSnapshots {
                expected: 0,
                actual: self.snapshots.len(),
            });
        }

        let batch = input.ncols();
        if self.initial_input.as_ref().map_or(true, |m| m.ncols() != batch) {
            debug!(
                "RecurrentAttention: allocating initial action input ({}, {})",
                self.out_size, batch
            );
            self.initial_input = Some(zeros(self.out_size, batch));
        }

        // Snapshots are committed only once every step has succeeded.
        let steps = match self.unroll(input) {
            Ok(steps) => steps,
            Err(err) => {
                self.forward_step = 0;
                self.pending_backward = false;
                return Err(err);
            }
        };
        for snapshot in steps {
            self.snapshots.push(snapshot);
        }

        self.output = self.recurrent.output().clone();
        self.forward_step = 0;
        self.backward_step = 0;
        self.pending_backward = !self.deterministic;

        debug!(
            "RecurrentAttention: forward {:?} -> {:?} over {} step(s), {} snapshot(s) pending",
            input.dim(),
            self.output.dim(),
            self.rho,
            self.snapshots.len()
        );
        Ok(self.output.clone())
    }

    fn backward(
        &mut self,
        input: &Array2<T>,
        output_grad: &Array2<T>,
    ) -> Result<Array2<T>, GlimpseError> {
        if self.deterministic {
            return Err(GlimpseError::Sequencing(
                "RecurrentAttention::backward is not available in deterministic mode".to_string(),
            ));
        }
        if !self.pending_backward {
            return Err(GlimpseError::Sequencing(
                "RecurrentAttention::backward requires a matching training forward pass".to_string(),
            ));
        }
        self.snapshots.expect_len(self.rho - self.backward_step)?;
        if output_grad.dim() != self.output.dim() {
            return Err(GlimpseError::ShapeMismatch {
                expected: vec![self.output.nrows(), self.output.ncols()],
                actual: output_grad.shape().to_vec(),
                operation: "RecurrentAttention::backward (output gradient)".to_string(),
            });
        }

        // A failed replay abandons the pass and drops the remaining snapshots.
        match self.replay(input, output_grad) {
            Ok(input_grad) => Ok(input_grad),
            Err(err) => {
                self.clear_snapshots();
                Err(err)
            }
        }
    }

    fn gradient(
        &mut self,
        _input: &Array2<T>,
        _error: &Array2<T>,
        mut gradient: ArrayViewMut1<'_, T>,
    ) -> Result<(), GlimpseError> {
        let attention = self.attention_gradient.as_ref().ok_or_else(|| {
            GlimpseError::Sequencing(
                "RecurrentAttention::gradient requires a preceding backward pass".to_string(),
            )
        })?;
        let recurrent_len = self.recurrent.num_parameters();
        let action_len = self.action.num_parameters();
        check_gradient_len(&gradient, recurrent_len + action_len, "RecurrentAttention::gradient")?;

        let mut offset = 0;
        if recurrent_len != 0 {
            gradient
                .slice_mut(s![offset..offset + recurrent_len])
                .assign(&attention.segment(offset, recurrent_len)?);
            offset += recurrent_len;
        }
        if action_len != 0 {
            gradient
                .slice_mut(s![offset..offset + action_len])
                .assign(&attention.segment(offset, action_len)?);
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
        let mut params = self.recurrent.parameters().to_vec();
        params.extend(self.action.parameters().iter().copied());
        Array1::from(params)
    }

    fn set_parameters(&mut self, parameters: ArrayView1<'_, T>) -> Result<(), GlimpseError> {
        let recurrent_len = self.recurrent.num_parameters();
        let action_len = self.action.num_parameters();
        if parameters.len() != recurrent_len + action_len {
            return Err(GlimpseError::ShapeMismatch {
                expected: vec![recurrent_len + action_len],
                actual: vec![parameters.len()],
                operation: "RecurrentAttention::set_parameters".to_string(),
            });
        }
        self.recurrent
            .set_parameters(parameters.slice(s![..recurrent_len]))?;
        self.action
            .set_parameters(parameters.slice(s![recurrent_len..]))
    }

    fn num_parameters(&self) -> usize {
        self.recurrent.num_parameters() + self.action.num_parameters()
    }

    fn set_deterministic(&mut self, deterministic: bool) {
        self.deterministic = deterministic;
        self.recurrent.set_deterministic(deterministic);
        self.action.set_deterministic(deterministic);
    }

    fn deterministic(&self) -> bool {
        self.deterministic
    }
}

#[cfg(test)]
#[path = "recurrent_attention_test.rs"]
mod tests;
