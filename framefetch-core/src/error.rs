//! Error types for framefetch
//!
//! Error taxonomy covering setup, image decode, shape and engine
//! lifecycle failures. Payloads are plain strings so a terminal error can
//! be handed to every later `next_batch` call.

use thiserror::Error;

/// Primary error type for all framefetch operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    // ========== Setup Errors ==========

    /// Manifest contained no entries
    #[error("Manifest is empty: {manifest}")]
    EmptyManifest { manifest: String },

    /// Manifest line has no space separating path and label
    #[error("Manifest line {line} is malformed: {content:?}")]
    ManifestParse { line: usize, content: String },

    /// Initial skip is not smaller than the manifest
    #[error("Not enough entries to skip: skip={skip}, manifest has {len}")]
    SkipExceedsSize { skip: usize, len: usize },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Filesystem error outside of image decoding
    #[error("I/O error at {path}: {reason}")]
    Io { path: String, reason: String },

    // ========== Image Errors ==========

    /// Image could not be loaded or decoded to a non-empty grid
    #[error("Could not load {path}: {reason}")]
    DecodeFailed { path: String, reason: String },

    // ========== Shape Errors ==========

    /// Shape inference disagreed within a batch
    #[error("Inconsistent batch shape: expected {expected:?}, got {actual:?}")]
    InconsistentBatchShape { expected: Vec<usize>, actual: Vec<usize> },

    // ========== Engine Errors ==========

    /// start() called on an engine that already left Idle
    #[error("Engine already started")]
    AlreadyRunning,

    /// Engine is not producing batches
    #[error("Engine not running")]
    NotRunning,

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl FetchError {
    /// Returns true if this error can only occur while setting up
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            FetchError::EmptyManifest { .. }
                | FetchError::ManifestParse { .. }
                | FetchError::SkipExceedsSize { .. }
                | FetchError::InvalidConfig { .. }
                | FetchError::Io { .. }
        )
    }

    /// Returns true if this error terminates the producer
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FetchError::AlreadyRunning)
    }

    pub(crate) fn decode(path: impl AsRef<std::path::Path>, reason: impl std::fmt::Display) -> Self {
        FetchError::DecodeFailed {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        FetchError::Io {
            path: path.as_ref().display().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result type alias for framefetch operations
pub type Result<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(FetchError::EmptyManifest { manifest: "list.txt".into() }.is_setup_error());
        assert!(FetchError::SkipExceedsSize { skip: 3, len: 2 }.is_setup_error());
        assert!(!FetchError::NotRunning.is_setup_error());
        assert!(FetchError::decode("a.png", "missing").is_fatal());
        assert!(!FetchError::AlreadyRunning.is_fatal());
    }

    #[test]
    fn test_decode_message() {
        let err = FetchError::decode("frames/a.png", "No such file");
        assert_eq!(err.to_string(), "Could not load frames/a.png: No such file");
    }
}
