//! Image decoding and per-item packing
//!
//! Frame groups and label images are decoded through an `ImageLoader`,
//! so tests and hosts can substitute their own decoder.

pub mod frames;
pub mod label;
pub mod loader;

pub use frames::{FrameGroup, FrameGroupReader};
pub use label::{LabelMode, LabelPacker, LABEL_CHANNELS, LABEL_SIZE};
pub use loader::{ColorMode, FsImageLoader, ImageLoader, PixelGrid};
