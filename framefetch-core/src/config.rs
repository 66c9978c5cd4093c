//! Image data configuration
//!
//! Loaded from JSON, optionally overridden from `FRAMEFETCH_*` environment
//! variables, and validated before the engine sets up.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FetchError, Result};
use crate::imaging::label::LabelMode;
use crate::transform::TransformConfig;

/// Default number of frames read per manifest entry
pub const DEFAULT_FRAMES_PER_GROUP: usize = 11;

/// Default number of batch slots cycled between producer and consumer
pub const DEFAULT_PREFETCH_DEPTH: usize = 2;

/// Configuration consumed by the prefetch engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageDataConfig {
    /// Manifest file listing `<group_root> <label_path>` lines
    pub source: PathBuf,
    /// Prefix joined onto every manifest path
    pub root_folder: String,
    /// Resize height (0 keeps the decoded size)
    pub new_height: u32,
    /// Resize width (0 keeps the decoded size)
    pub new_width: u32,
    /// Decode as RGB when true, grayscale otherwise
    pub is_color: bool,
    pub batch_size: usize,
    /// Shuffle the manifest at setup and on every wraparound
    pub shuffle: bool,
    /// Initial cursor offset
    pub rand_skip: usize,
    /// Draw the initial offset uniformly from `[0, rand_skip)` instead
    pub randomize_skip: bool,
    /// Frames read per manifest entry (K)
    pub frames_per_group: usize,
    /// Number of preallocated batch slots
    pub prefetch_depth: usize,
    /// RNG seed for shuffling and randomized skip; random when unset
    pub seed: Option<u64>,
    pub label_mode: LabelMode,
    pub transform: TransformConfig,
}

impl Default for ImageDataConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            root_folder: String::new(),
            new_height: 0,
            new_width: 0,
            is_color: true,
            batch_size: 1,
            shuffle: false,
            rand_skip: 0,
            randomize_skip: false,
            frames_per_group: DEFAULT_FRAMES_PER_GROUP,
            prefetch_depth: DEFAULT_PREFETCH_DEPTH,
            seed: None,
            label_mode: LabelMode::Raw,
            transform: TransformConfig::default(),
        }
    }
}

impl ImageDataConfig {
    /// Create a configuration for a manifest with defaults elsewhere
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Read a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| FetchError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| FetchError::InvalidConfig {
            reason: format!("{}: {}", path.display(), e),
        })
    }

    /// Apply `FRAMEFETCH_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("FRAMEFETCH_SOURCE") {
            self.source = PathBuf::from(source);
        }
        if let Ok(root) = std::env::var("FRAMEFETCH_ROOT_FOLDER") {
            self.root_folder = root;
        }
        if let Some(v) = env_parse("FRAMEFETCH_BATCH_SIZE")? {
            self.batch_size = v;
        }
        if let Some(v) = env_parse("FRAMEFETCH_PREFETCH_DEPTH")? {
            self.prefetch_depth = v;
        }
        if let Some(v) = env_parse("FRAMEFETCH_SHUFFLE")? {
            self.shuffle = v;
        }
        if let Some(v) = env_parse("FRAMEFETCH_SEED")? {
            self.seed = Some(v);
        }
        if let Some(v) = env_parse("FRAMEFETCH_RAND_SKIP")? {
            self.rand_skip = v;
        }
        Ok(())
    }

    /// Check invariants the engine relies on
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(FetchError::InvalidConfig {
                reason: reason.to_string(),
            })
        };
        if (self.new_height == 0) != (self.new_width == 0) {
            return invalid("new_height and new_width must be set at the same time");
        }
        if self.batch_size == 0 {
            return invalid("positive batch_size required");
        }
        if self.frames_per_group == 0 {
            return invalid("positive frames_per_group required");
        }
        if self.prefetch_depth == 0 {
            return invalid("positive prefetch_depth required");
        }
        if self.source.as_os_str().is_empty() {
            return invalid("source manifest path is empty");
        }
        let channels = if self.is_color { 3 } else { 1 };
        let means = self.transform.mean_values.len();
        if means > 1 && means != channels {
            return Err(FetchError::InvalidConfig {
                reason: format!("{} mean values given for {} channels", means, channels),
            });
        }
        Ok(())
    }
}

/// Manifest path joined onto the root folder. The root is a plain prefix,
/// so it needs its own trailing separator.
pub fn resolve(root_folder: &str, path: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", root_folder, path))
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| FetchError::InvalidConfig {
            reason: format!("{} has unparseable value {:?}", key, raw),
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ImageDataConfig::new("list.txt");
        assert!(config.validate().is_ok());
        assert_eq!(config.frames_per_group, 11);
        assert_eq!(config.prefetch_depth, 2);
    }

    #[test]
    fn test_resize_both_or_neither() {
        let config = ImageDataConfig {
            new_height: 64,
            ..ImageDataConfig::new("list.txt")
        };
        assert!(matches!(config.validate(), Err(FetchError::InvalidConfig { .. })));

        let config = ImageDataConfig {
            new_height: 64,
            new_width: 32,
            ..ImageDataConfig::new("list.txt")
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_rejected() {
        let config = ImageDataConfig {
            batch_size: 0,
            ..ImageDataConfig::new("list.txt")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_partial_fields() {
        let config: ImageDataConfig =
            serde_json::from_str(r#"{"source": "train.txt", "batch_size": 8, "shuffle": true}"#).unwrap();
        assert_eq!(config.source, PathBuf::from("train.txt"));
        assert_eq!(config.batch_size, 8);
        assert!(config.shuffle);
        assert_eq!(config.label_mode, LabelMode::Raw);
    }

    #[test]
    fn test_mean_count_matches_channels() {
        let mut config = ImageDataConfig::new("list.txt");
        config.transform.mean_values = vec![1.0, 2.0];
        assert!(matches!(config.validate(), Err(FetchError::InvalidConfig { .. })));

        config.transform.mean_values = vec![1.0, 2.0, 3.0];
        assert!(config.validate().is_ok());

        config.is_color = false;
        assert!(config.validate().is_err());
        config.transform.mean_values = vec![128.0];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_concatenates() {
        assert_eq!(resolve("/data/", "seq/a.png"), PathBuf::from("/data/seq/a.png"));
        assert_eq!(resolve("", "a.png"), PathBuf::from("a.png"));
    }
}
