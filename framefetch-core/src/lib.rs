//! framefetch - asynchronous multi-frame image batch prefetching
//!
//! This crate feeds a training loop with fixed-shape tensors built from a
//! manifest of (frame group, label image) pairs:
//! - Manifest parsing, shuffling and wraparound
//! - Frame-group decoding and label packing
//! - Shape inference and transform into preallocated buffers
//! - A background producer with bounded, ownership-transferring handoff

pub mod config;
pub mod data;
pub mod error;
pub mod imaging;
pub mod metrics;
pub mod runtime;
pub mod tensor;
pub mod transform;

pub use config::ImageDataConfig;
pub use data::{Batch, BatchLease, EngineState, PrefetchEngine, StopHandle};
pub use error::{FetchError, Result};
pub use runtime::FetchRuntime;

/// Channels in every label tensor
pub const LABEL_CHANNELS: usize = imaging::LABEL_CHANNELS;

/// Height and width of every label tensor
pub const LABEL_SIZE: usize = imaging::LABEL_SIZE;
