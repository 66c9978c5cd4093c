//! Flat numeric tensors backing batch buffers
//!
//! Row-major storage, N outermost and W innermost. Reshaping only
//! reallocates when the element count changes.

use serde::{Deserialize, Serialize};

use crate::error::{FetchError, Result};

/// Element type written by the transform and label packing steps
pub type Scalar = f32;

/// Shape of one transformed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl FrameShape {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self { channels, height, width }
    }

    /// Elements in a single frame
    pub fn count(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn dims(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }
}

/// Contiguous tensor with an explicit shape
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<Scalar>,
}

impl Tensor {
    /// Allocate a zero-filled tensor
    pub fn zeros(shape: &[usize]) -> Self {
        let count = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: vec![0.0; count],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total number of elements
    pub fn count(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[Scalar] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [Scalar] {
        &mut self.data
    }

    /// Change the shape, reallocating only if the element count differs.
    /// Returns true when the buffer was reallocated.
    pub fn reshape(&mut self, shape: &[usize]) -> bool {
        if self.shape == shape {
            return false;
        }
        let count: usize = shape.iter().product();
        self.shape = shape.to_vec();
        if count == self.data.len() {
            return false;
        }
        self.data = vec![0.0; count];
        true
    }

    /// Elements per outermost index
    pub fn item_len(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    /// Mutable view over item `index` along the outermost axis
    pub fn item_mut(&mut self, index: usize) -> Result<&mut [Scalar]> {
        let outer = self.shape.first().copied().unwrap_or(0);
        if index >= outer {
            return Err(FetchError::Internal {
                message: format!("item {} out of range for shape {:?}", index, self.shape),
            });
        }
        let len = self.item_len();
        let offset = index * len;
        Ok(&mut self.data[offset..offset + len])
    }

    /// Immutable view over item `index` along the outermost axis
    pub fn item(&self, index: usize) -> Option<&[Scalar]> {
        let outer = self.shape.first().copied().unwrap_or(0);
        if index >= outer {
            return None;
        }
        let len = self.item_len();
        let offset = index * len;
        Some(&self.data[offset..offset + len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reshape_same_count_keeps_buffer() {
        let mut t = Tensor::zeros(&[2, 3, 4]);
        t.data_mut()[5] = 7.0;
        assert!(!t.reshape(&[4, 3, 2]));
        assert_eq!(t.shape(), &[4, 3, 2]);
        assert_eq!(t.data()[5], 7.0);
    }

    #[test]
    fn test_reshape_grows() {
        let mut t = Tensor::zeros(&[1, 2]);
        assert!(t.reshape(&[3, 2]));
        assert_eq!(t.count(), 6);
        assert!(!t.reshape(&[3, 2]));
    }

    #[test]
    fn test_item_views() {
        let mut t = Tensor::zeros(&[2, 2, 3]);
        t.item_mut(1).unwrap().fill(1.0);
        assert_eq!(t.item(0).unwrap(), &[0.0; 6]);
        assert_eq!(t.item(1).unwrap(), &[1.0; 6]);
        assert!(t.item(2).is_none());
        assert!(t.item_mut(2).is_err());
    }
}
