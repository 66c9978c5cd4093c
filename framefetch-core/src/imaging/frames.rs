//! Multi-frame group reading
//!
//! Each manifest entry names one group root. The reader decodes that path
//! `frames_per_group` times with a shared size and color policy; a single
//! failed frame fails the whole group.

use std::sync::Arc;

use crate::config::{self, ImageDataConfig};
use crate::data::manifest::ManifestEntry;
use crate::error::{FetchError, Result};
use super::loader::{ColorMode, ImageLoader, PixelGrid};

/// Ordered frames decoded for one manifest entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameGroup {
    frames: Vec<PixelGrid>,
}

impl FrameGroup {
    pub fn new(frames: Vec<PixelGrid>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[PixelGrid] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Reads fixed-length frame groups through an `ImageLoader`
pub struct FrameGroupReader {
    loader: Arc<dyn ImageLoader>,
    root_folder: String,
    frames_per_group: usize,
    new_height: u32,
    new_width: u32,
    color: ColorMode,
}

impl FrameGroupReader {
    pub fn new(loader: Arc<dyn ImageLoader>, config: &ImageDataConfig) -> Self {
        Self {
            loader,
            root_folder: config.root_folder.clone(),
            frames_per_group: config.frames_per_group,
            new_height: config.new_height,
            new_width: config.new_width,
            color: ColorMode::from_is_color(config.is_color),
        }
    }

    pub fn frames_per_group(&self) -> usize {
        self.frames_per_group
    }

    /// Decode the group for `entry`
    // The group root is read once per frame; manifests carry no per-frame paths.
    pub fn read_group(&self, entry: &ManifestEntry) -> Result<FrameGroup> {
        let path = config::resolve(&self.root_folder, &entry.group_root);
        let mut frames = Vec::with_capacity(self.frames_per_group);
        for _ in 0..self.frames_per_group {
            let grid = self.loader.decode(&path, self.new_height, self.new_width, self.color)?;
            if grid.is_empty() {
                return Err(FetchError::decode(&path, "decoded image is empty"));
            }
            frames.push(grid);
        }
        Ok(FrameGroup::new(frames))
    }
}
