//! Batch buffers cycled between producer and consumer

use super::manifest::ManifestEntry;
use crate::imaging::LabelPacker;
use crate::tensor::{FrameShape, Tensor};

/// A data tensor and its label tensor, filled item by item
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// Transformed frames, `[N, K, C, H, W]`
    pub data: Tensor,
    /// Labels, `[N, 3, 64, 64]`
    pub label: Tensor,
    /// Manifest entries packed into this batch, in item order
    pub entries: Vec<ManifestEntry>,
    /// Fill order of this batch, starting at 0
    pub sequence: u64,
}

impl Batch {
    /// Preallocate a batch at the given steady-state shape
    pub fn allocate(batch_size: usize, frames_per_group: usize, shape: FrameShape) -> Self {
        Self {
            data: Tensor::zeros(&data_shape(batch_size, frames_per_group, shape)),
            label: Tensor::zeros(&LabelPacker::shape(batch_size)),
            entries: Vec::with_capacity(batch_size),
            sequence: 0,
        }
    }

    /// Number of items in the batch
    pub fn len(&self) -> usize {
        self.data.shape().first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Data tensor shape for a batch of frame groups
pub fn data_shape(batch_size: usize, frames_per_group: usize, shape: FrameShape) -> [usize; 5] {
    [batch_size, frames_per_group, shape.channels, shape.height, shape.width]
}
