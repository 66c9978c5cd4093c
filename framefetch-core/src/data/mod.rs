//! Batch prefetching pipeline
//!
//! Manifest traversal, per-batch filling on a background task, and the
//! slot handoff between producer and consumer.

pub mod backpressure;
pub mod batch;
pub mod cursor;
pub mod filler;
pub mod loader;
pub mod manifest;
pub mod prefetcher;
pub mod state;

pub use backpressure::BatchLease;
pub use batch::Batch;
pub use cursor::ManifestCursor;
pub use loader::{PrefetchEngine, StopHandle};
pub use manifest::{Manifest, ManifestEntry};
pub use state::EngineState;
