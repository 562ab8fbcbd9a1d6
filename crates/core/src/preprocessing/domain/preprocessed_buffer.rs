use ndarray::{Array4, ArrayView4};

use crate::shared::constants::{CLASSIFIER_INPUT_LEN, CLASSIFIER_INPUT_SIZE};

/// Classifier input: one 48x48 grayscale face, values in `[0, 1]`.
///
/// Laid out as `[batch=1, height=48, width=48, channel=1]` in row-major
/// order. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct PreprocessedBuffer {
    array: Array4<f32>,
}

impl PreprocessedBuffer {
    pub const SHAPE: [usize; 4] = [1, CLASSIFIER_INPUT_SIZE, CLASSIFIER_INPUT_SIZE, 1];

    /// Builds a buffer from `48 * 48` row-major samples.
    ///
    /// Returns `None` if the sample count is wrong.
    pub fn from_samples(samples: Vec<f32>) -> Option<Self> {
        if samples.len() != CLASSIFIER_INPUT_LEN {
            return None;
        }
        let shape = (1, CLASSIFIER_INPUT_SIZE, CLASSIFIER_INPUT_SIZE, 1);
        Array4::from_shape_vec(shape, samples)
            .ok()
            .map(|array| Self { array })
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.array.view()
    }

    /// Owned copy of the tensor, for runtimes that take ownership of input.
    pub fn to_array(&self) -> Array4<f32> {
        self.array.clone()
    }

    /// Flat row-major samples.
    pub fn as_slice(&self) -> &[f32] {
        // Constructed from a Vec in standard layout, so always contiguous.
        self.array.as_slice().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn shape(&self) -> &[usize] {
        self.array.shape()
    }

    /// Sample at row `y`, column `x`.
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.array[[0, y, x, 0]]
    }
}
