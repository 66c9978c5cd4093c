//! Label image packing
//!
//! Labels are decoded at a fixed 64x64 size regardless of the frame size
//! and written channel-planar (channel, row, column) into the label tensor.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{self, ImageDataConfig};
use crate::error::{FetchError, Result};
use crate::tensor::Scalar;
use super::loader::{ColorMode, ImageLoader, PixelGrid};

/// Channels in the label tensor
pub const LABEL_CHANNELS: usize = 3;

/// Label height and width
pub const LABEL_SIZE: usize = 64;

/// Value mapping applied to label pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum LabelMode {
    /// Copy raw pixel values
    #[default]
    Raw,
    /// 0 at or below `threshold`, 1 above
    Binarize { threshold: u8 },
}

impl LabelMode {
    #[inline]
    fn map(&self, value: u8) -> Scalar {
        match self {
            LabelMode::Raw => value as Scalar,
            LabelMode::Binarize { threshold } => {
                if value > *threshold {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Decodes label images into per-item label regions
pub struct LabelPacker {
    loader: Arc<dyn ImageLoader>,
    root_folder: String,
    color: ColorMode,
    mode: LabelMode,
}

impl LabelPacker {
    pub fn new(loader: Arc<dyn ImageLoader>, config: &ImageDataConfig) -> Self {
        Self {
            loader,
            root_folder: config.root_folder.clone(),
            color: ColorMode::from_is_color(config.is_color),
            mode: config.label_mode,
        }
    }

    /// Elements written per batch item
    pub const fn item_len() -> usize {
        LABEL_CHANNELS * LABEL_SIZE * LABEL_SIZE
    }

    /// Label tensor shape for a batch
    pub fn shape(batch_size: usize) -> [usize; 4] {
        [batch_size, LABEL_CHANNELS, LABEL_SIZE, LABEL_SIZE]
    }

    /// Decode `label_path` and write it into `dest`
    pub fn pack(&self, label_path: &str, dest: &mut [Scalar]) -> Result<()> {
        let path = config::resolve(&self.root_folder, label_path);
        let grid = self
            .loader
            .decode(&path, LABEL_SIZE as u32, LABEL_SIZE as u32, self.color)?;
        if grid.is_empty() {
            return Err(FetchError::decode(&path, "decoded label is empty"));
        }
        if grid.height != LABEL_SIZE || grid.width != LABEL_SIZE {
            return Err(FetchError::InconsistentBatchShape {
                expected: vec![LABEL_SIZE, LABEL_SIZE],
                actual: vec![grid.height, grid.width],
            });
        }
        write_planar(&grid, self.mode, dest)
    }
}

fn write_planar(grid: &PixelGrid, mode: LabelMode, dest: &mut [Scalar]) -> Result<()> {
    if dest.len() != LabelPacker::item_len() {
        return Err(FetchError::InconsistentBatchShape {
            expected: vec![LabelPacker::item_len()],
            actual: vec![dest.len()],
        });
    }

    let mut offset = 0;
    for i in 0..LABEL_CHANNELS {
        // Grayscale labels fill every plane from their single channel
        let src = i.min(grid.channels - 1);
        for r in 0..LABEL_SIZE {
            for c in 0..LABEL_SIZE {
                dest[offset] = mode.map(grid.at(r, c, src));
                offset += 1;
            }
        }
    }
    Ok(())
}
