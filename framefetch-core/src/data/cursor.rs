//! Manifest traversal with wraparound
//!
//! Owns the manifest order, the position and the shuffle RNG. Only the
//! producer holds a cursor.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::manifest::{Manifest, ManifestEntry};
use crate::error::{FetchError, Result};

/// Position within a manifest, reshuffling on wraparound
#[derive(Debug)]
pub struct ManifestCursor {
    manifest: Manifest,
    position: usize,
    shuffle: bool,
    rng: StdRng,
    epochs: u64,
}

impl ManifestCursor {
    /// Create a cursor; shuffles immediately when `shuffle` is set
    pub fn new(mut manifest: Manifest, shuffle: bool, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = StdRng::seed_from_u64(seed);
        if shuffle {
            info!("Shuffling data (seed {})", seed);
            manifest.shuffle(&mut rng);
        }
        Self {
            manifest,
            position: 0,
            shuffle,
            rng,
            epochs: 0,
        }
    }

    /// Offset the starting position by `n`, which must be below the manifest length
    pub fn skip(&mut self, n: usize) -> Result<()> {
        let len = self.manifest.len();
        if n >= len {
            return Err(FetchError::SkipExceedsSize { skip: n, len });
        }
        if n > 0 {
            info!("Skipping first {} data points.", n);
        }
        self.position = (self.position + n) % len;
        Ok(())
    }

    /// Skip a uniformly drawn count in `[0, bound)`
    pub fn random_skip(&mut self, bound: usize) -> Result<usize> {
        if bound == 0 {
            return Ok(0);
        }
        let n = self.rng.random_range(0..bound);
        self.skip(n)?;
        Ok(n)
    }

    /// Entry under the cursor
    pub fn current(&self) -> &ManifestEntry {
        // position < len is maintained by advance() and skip()
        &self.manifest.entries()[self.current_index()]
    }

    /// File index of the entry under the cursor
    pub fn current_index(&self) -> usize {
        self.manifest.index_at(self.position).unwrap_or(0)
    }

    /// Move to the next entry. Returns true when the cursor wrapped.
    pub fn advance(&mut self) -> bool {
        self.position += 1;
        if self.position < self.manifest.len() {
            return false;
        }
        debug!("Restarting data prefetching from start.");
        self.position = 0;
        self.epochs += 1;
        if self.shuffle {
            self.manifest.shuffle(&mut self.rng);
        }
        true
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Completed passes over the manifest
    pub fn epochs(&self) -> u64 {
        self.epochs
    }

    pub fn len(&self) -> usize {
        self.manifest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(n: usize) -> Manifest {
        let text: String = (0..n).map(|i| format!("f{i}.png l{i}.png\n")).collect();
        Manifest::parse(&text, "mem").unwrap()
    }

    #[test]
    fn test_sequential_wraparound() {
        let mut cursor = ManifestCursor::new(manifest(3), false, Some(1));
        let mut seen = Vec::new();
        let mut wraps = 0;
        for _ in 0..7 {
            seen.push(cursor.current_index());
            if cursor.advance() {
                wraps += 1;
            }
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(wraps, 2);
        assert_eq!(cursor.epochs(), 2);
    }

    #[test]
    fn test_skip() {
        let mut cursor = ManifestCursor::new(manifest(5), false, Some(1));
        cursor.skip(3).unwrap();
        assert_eq!(cursor.current_index(), 3);
        assert_eq!(cursor.current().group_root, "f3.png");
    }

    #[test]
    fn test_skip_exceeds_size() {
        let mut cursor = ManifestCursor::new(manifest(2), false, Some(1));
        assert_eq!(cursor.skip(2), Err(FetchError::SkipExceedsSize { skip: 2, len: 2 }));
    }

    #[test]
    fn test_random_skip_in_bounds() {
        let mut cursor = ManifestCursor::new(manifest(10), false, Some(9));
        let n = cursor.random_skip(4).unwrap();
        assert!(n < 4);
        assert_eq!(cursor.position(), n);
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let order = |seed| {
            let mut cursor = ManifestCursor::new(manifest(16), true, Some(seed));
            (0..48)
                .map(|_| {
                    let idx = cursor.current_index();
                    cursor.advance();
                    idx
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(order(42), order(42));
        assert_ne!(order(42), order(43));
    }

    #[test]
    fn test_reshuffle_visits_every_entry_per_pass() {
        let mut cursor = ManifestCursor::new(manifest(8), true, Some(5));
        for _ in 0..3 {
            let mut pass: Vec<usize> = (0..8)
                .map(|_| {
                    let idx = cursor.current_index();
                    cursor.advance();
                    idx
                })
                .collect();
            pass.sort_unstable();
            assert_eq!(pass, (0..8).collect::<Vec<_>>());
        }
    }
}
