use crate::error::GlimpseError;
use crate::types::Element;
use ndarray::{s, Array1, ArrayView1, ArrayViewMut1};

/// One owned, flat parameter-gradient buffer shared by several layers.
///
/// Each layer is bound to a contiguous segment `[offset, offset + len)`;
/// segments are handed out as bounds-checked views so a layer writes its
/// gradient in place instead of into a temporary that is copied afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientBuffer<T> {
    data: Array1<T>,
}

impl<T: Element> GradientBuffer<T> {
    /// Zero-initialised buffer with room for `len` parameters.
    pub fn zeros(len: usize) -> Self {
        Self {
            data: Array1::zeros(len),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn fill_zero(&mut self) {
        self.data.fill(T::zero());
    }

    pub fn view(&self) -> ArrayView1<'_, T> {
        self.data.view()
    }

    fn check_bounds(&self, offset: usize, len: usize) -> Result<(), GlimpseError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(GlimpseError::GradientBufferOutOfBounds {
                offset,
                len,
                capacity: self.data.len(),
            }),
        }
    }

    /// Read-only view of `[offset, offset + len)`.
    pub fn segment(&self, offset: usize, len: usize) -> Result<ArrayView1<'_, T>, GlimpseError> {
        self.check_bounds(offset, len)?;
        Ok(self.data.slice(s![offset..offset + len]))
    }

    /// Mutable view of `[offset, offset + len)`.
    pub fn segment_mut(
        &mut self,
        offset: usize,
        len: usize,
    ) -> Result<ArrayViewMut1<'_, T>, GlimpseError> {
        self.check_bounds(offset, len)?;
        Ok(self.data.slice_mut(s![offset..offset + len]))
    }

    /// Element-wise `self += other`.
    pub fn accumulate(&mut self, other: &GradientBuffer<T>) -> Result<(), GlimpseError> {
        if other.len() != self.len() {
            return Err(GlimpseError::ShapeMismatch {
                expected: vec![self.len()],
                actual: vec![other.len()],
                operation: "GradientBuffer::accumulate".to_string(),
            });
        }
        self.data += &other.data;
        Ok(())
    }
}

#[cfg(test)]
#[path = "gradient_buffer_test.rs"]
mod tests;
