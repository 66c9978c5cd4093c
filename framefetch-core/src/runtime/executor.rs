//! Tokio runtime executor configuration
//!
//! Hosts without their own runtime (a synchronous training loop, the
//! `framefetch` binary) build a `FetchRuntime` and start engines on its
//! handle. Decode work runs on the runtime's blocking pool.

use tokio::runtime::{Builder, Runtime};
use crate::error::{FetchError, Result};

/// Configuration for the prefetch runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Async worker threads (producer loops, channel handoff)
    pub worker_threads: usize,
    /// Upper bound on blocking threads used for decode and transform
    pub blocking_threads: usize,
    /// Thread name prefix
    pub thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let cpus = num_cpus::get();
        Self {
            worker_threads: (cpus / 4).max(1),
            blocking_threads: cpus.max(2),
            thread_name: "framefetch".into(),
        }
    }
}

/// Multi-thread runtime dedicated to prefetching
pub struct FetchRuntime {
    runtime: Runtime,
}

impl FetchRuntime {
    /// Create a new runtime with the given configuration
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .max_blocking_threads(config.blocking_threads)
            .thread_name(config.thread_name)
            .enable_all()
            .build()
            .map_err(|e| FetchError::Internal {
                message: format!("Failed to create prefetch runtime: {}", e),
            })?;

        Ok(Self { runtime })
    }

    /// Run a future to completion, blocking the calling thread
    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Handle for starting engines from outside the runtime
    pub fn handle(&self) -> tokio::runtime::Handle {
        self.runtime.handle().clone()
    }

    /// Shut down, waiting briefly for in-flight decode work
    pub fn shutdown(self) {
        self.runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    }
}
