//! Frame-group shape inference and transform
//!
//! `FrameTransform` is the seam a host uses to plug in its own
//! augmentation policy. `PlanarTransform` is the default: it normalizes
//! pixels and packs them frame, channel, row, column.

use serde::{Deserialize, Serialize};

use crate::error::{FetchError, Result};
use crate::imaging::FrameGroup;
use crate::tensor::{FrameShape, Scalar};

/// Shape inference plus transform into a destination region
pub trait FrameTransform: Send + Sync {
    /// Shape of one transformed frame
    fn infer_shape(&self, group: &FrameGroup) -> Result<FrameShape>;

    /// Write the transformed group into `dest`, which holds exactly
    /// `group.len() * shape.count()` elements
    fn transform(&self, group: &FrameGroup, dest: &mut [Scalar]) -> Result<()>;
}

/// Normalization parameters for `PlanarTransform`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Multiplier applied after mean subtraction
    pub scale: f32,
    /// Per-channel mean; empty, one value for all channels, or one per channel
    pub mean_values: Vec<f32>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            mean_values: Vec::new(),
        }
    }
}

/// Default transform: `(pixel - mean[c]) * scale`, channel-planar per frame
#[derive(Debug, Clone, Default)]
pub struct PlanarTransform {
    config: TransformConfig,
}

impl PlanarTransform {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    fn mean_for(&self, channel: usize, channels: usize) -> Result<f32> {
        match self.config.mean_values.len() {
            0 => Ok(0.0),
            1 => Ok(self.config.mean_values[0]),
            n if n == channels => Ok(self.config.mean_values[channel]),
            n => Err(FetchError::InvalidConfig {
                reason: format!("{} mean values given for {} channels", n, channels),
            }),
        }
    }
}

impl FrameTransform for PlanarTransform {
    fn infer_shape(&self, group: &FrameGroup) -> Result<FrameShape> {
        let first = group.frames().first().ok_or_else(|| FetchError::Internal {
            message: "cannot infer shape of an empty frame group".into(),
        })?;
        let shape = FrameShape::new(first.channels, first.height, first.width);
        for frame in &group.frames()[1..] {
            let other = FrameShape::new(frame.channels, frame.height, frame.width);
            if other != shape {
                return Err(FetchError::InconsistentBatchShape {
                    expected: shape.dims().to_vec(),
                    actual: other.dims().to_vec(),
                });
            }
        }
        Ok(shape)
    }

    fn transform(&self, group: &FrameGroup, dest: &mut [Scalar]) -> Result<()> {
        let shape = self.infer_shape(group)?;
        let frame_len = shape.count();
        if dest.len() != group.len() * frame_len {
            return Err(FetchError::InconsistentBatchShape {
                expected: vec![group.len() * frame_len],
                actual: vec![dest.len()],
            });
        }

        let means = (0..shape.channels)
            .map(|c| self.mean_for(c, shape.channels))
            .collect::<Result<Vec<_>>>()?;
        let scale = self.config.scale;

        for (frame, out) in group.frames().iter().zip(dest.chunks_exact_mut(frame_len)) {
            let mut offset = 0;
            for (c, mean) in means.iter().enumerate() {
                for h in 0..shape.height {
                    for w in 0..shape.width {
                        out[offset] = (frame.at(h, w, c) as f32 - mean) * scale;
                        offset += 1;
                    }
                }
            }
        }
        Ok(())
    }
}
