//! Async runtime management for framefetch
//!
//! Runtime construction for hosts without one, and shutdown signaling.

pub mod executor;
pub mod shutdown;

pub use executor::{FetchRuntime, RuntimeConfig};
pub use shutdown::ShutdownSignal;
