//! Manifest file handling
//!
//! One entry per line: `<group_root> <label_path>`, split at the last
//! space. Entries are immutable; shuffling permutes an index order.

use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{FetchError, Result};

/// A (frame group, label image) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path of the frame group, relative to the root folder
    pub group_root: String,
    /// Path of the label image, relative to the root folder
    pub label_path: String,
}

impl ManifestEntry {
    pub fn new(group_root: impl Into<String>, label_path: impl Into<String>) -> Self {
        Self {
            group_root: group_root.into(),
            label_path: label_path.into(),
        }
    }
}

/// Ordered manifest with a shuffleable index permutation
#[derive(Debug, Clone)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
    order: Vec<usize>,
}

impl Manifest {
    /// Build from entries, rejecting an empty list
    pub fn from_entries(entries: Vec<ManifestEntry>, origin: &str) -> Result<Self> {
        if entries.is_empty() {
            return Err(FetchError::EmptyManifest {
                manifest: origin.to_string(),
            });
        }
        let order = (0..entries.len()).collect();
        Ok(Self { entries, order })
    }

    /// Read and parse a manifest file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening file {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| FetchError::io(path, e))?;
        let manifest = Self::parse(&text, &path.display().to_string())?;
        info!("A total of {} images.", manifest.len());
        Ok(manifest)
    }

    /// Parse manifest text; `origin` names the source in errors
    pub fn parse(text: &str, origin: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let pos = line.rfind(' ').ok_or_else(|| FetchError::ManifestParse {
                line: idx + 1,
                content: line.to_string(),
            })?;
            let (group_root, label) = (&line[..pos], &line[pos + 1..]);
            if group_root.is_empty() || label.is_empty() {
                return Err(FetchError::ManifestParse {
                    line: idx + 1,
                    content: line.to_string(),
                });
            }
            entries.push(ManifestEntry::new(group_root, label));
        }
        Self::from_entries(entries, origin)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at position `pos` of the current order
    pub fn get(&self, pos: usize) -> Option<&ManifestEntry> {
        self.order.get(pos).map(|&idx| &self.entries[idx])
    }

    /// Original file index at position `pos` of the current order
    pub fn index_at(&self, pos: usize) -> Option<usize> {
        self.order.get(pos).copied()
    }

    /// Entries in file order
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Uniformly permute the iteration order
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.order.shuffle(rng);
    }
}
