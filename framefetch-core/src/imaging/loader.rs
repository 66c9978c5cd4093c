//! Decode image files into pixel grids

use std::path::Path;

use image::imageops::FilterType;

use crate::error::{FetchError, Result};

/// Color policy applied while decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Three channels, RGB order
    Color,
    /// Single luminance channel
    Grayscale,
}

impl ColorMode {
    pub fn from_is_color(is_color: bool) -> Self {
        if is_color {
            ColorMode::Color
        } else {
            ColorMode::Grayscale
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            ColorMode::Color => 3,
            ColorMode::Grayscale => 1,
        }
    }
}

/// Decoded image, interleaved HWC bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub data: Vec<u8>,
}

impl PixelGrid {
    /// Grid filled with one pixel value
    pub fn solid(height: usize, width: usize, pixel: &[u8]) -> Self {
        let mut data = Vec::with_capacity(height * width * pixel.len());
        for _ in 0..height * width {
            data.extend_from_slice(pixel);
        }
        Self {
            height,
            width,
            channels: pixel.len(),
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0 || self.channels == 0 || self.data.is_empty()
    }

    /// Value of channel `c` at row `r`, column `col`
    #[inline]
    pub fn at(&self, r: usize, col: usize, c: usize) -> u8 {
        self.data[(r * self.width + col) * self.channels + c]
    }
}

/// Capability to decode an image file at a target size
///
/// A target of `(0, 0)` keeps the decoded size.
pub trait ImageLoader: Send + Sync {
    fn decode(&self, path: &Path, target_height: u32, target_width: u32, mode: ColorMode) -> Result<PixelGrid>;
}

/// Loader backed by the `image` crate, resizing with a triangle filter
#[derive(Debug, Clone, Copy, Default)]
pub struct FsImageLoader;

impl FsImageLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ImageLoader for FsImageLoader {
    fn decode(&self, path: &Path, target_height: u32, target_width: u32, mode: ColorMode) -> Result<PixelGrid> {
        let mut img = image::open(path).map_err(|e| FetchError::decode(path, e))?;

        if target_height > 0
            && target_width > 0
            && (img.height() != target_height || img.width() != target_width)
        {
            img = img.resize_exact(target_width, target_height, FilterType::Triangle);
        }

        let (width, height) = (img.width() as usize, img.height() as usize);
        let grid = match mode {
            ColorMode::Color => PixelGrid {
                height,
                width,
                channels: 3,
                data: img.to_rgb8().into_raw(),
            },
            ColorMode::Grayscale => PixelGrid {
                height,
                width,
                channels: 1,
                data: img.to_luma8().into_raw(),
            },
        };

        if grid.is_empty() {
            return Err(FetchError::decode(path, "decoded image is empty"));
        }
        Ok(grid)
    }
}
