//! Shared fixtures: solid-color images and manifests in a temp directory

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use framefetch_core::imaging::{ColorMode, FsImageLoader, ImageLoader, PixelGrid};
use framefetch_core::{ImageDataConfig, Result};
use image::{Rgb, RgbImage};
use tempfile::TempDir;

/// Temp directory holding frames, labels and a manifest
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a solid RGB image of `width` x `height`
    pub fn image(&self, name: &str, width: u32, height: u32, rgb: [u8; 3]) -> &Self {
        RgbImage::from_pixel(width, height, Rgb(rgb))
            .save(self.root().join(name))
            .expect("write fixture image");
        self
    }

    /// Write a 64x64 solid label image
    pub fn label(&self, name: &str, rgb: [u8; 3]) -> &Self {
        self.image(name, 64, 64, rgb)
    }

    pub fn manifest(&self, lines: &[&str]) -> PathBuf {
        let path = self.root().join("list.txt");
        let mut text = lines.join("\n");
        text.push('\n');
        std::fs::write(&path, text).expect("write manifest");
        path
    }

    /// Configuration rooted at the fixture directory
    pub fn config(&self, manifest: PathBuf, batch_size: usize, frames_per_group: usize) -> ImageDataConfig {
        ImageDataConfig {
            root_folder: format!("{}/", self.root().display()),
            batch_size,
            frames_per_group,
            seed: Some(7),
            ..ImageDataConfig::new(manifest)
        }
    }
}

/// Standard fixture: `n` 8x8 frames `f{i}.png` with labels `l{i}.png`
pub fn numbered(n: usize) -> (Fixture, PathBuf) {
    let fixture = Fixture::new();
    let mut lines = Vec::new();
    for i in 0..n {
        fixture.image(&format!("f{i}.png"), 8, 8, [i as u8 * 10, 0, 0]);
        fixture.label(&format!("l{i}.png"), [0, i as u8 * 10, 0]);
        lines.push(format!("f{i}.png l{i}.png"));
    }
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let manifest = fixture.manifest(&refs);
    (fixture, manifest)
}

/// Manifest index encoded in a numbered fixture entry name
pub fn index_of(group_root: &str) -> usize {
    group_root
        .trim_start_matches('f')
        .trim_end_matches(".png")
        .parse()
        .expect("numbered entry")
}

/// Filesystem loader that counts decodes and can be slowed down
pub struct CountingLoader {
    inner: FsImageLoader,
    pub calls: AtomicUsize,
    delay: Duration,
}

impl CountingLoader {
    pub fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: FsImageLoader::new(),
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageLoader for CountingLoader {
    fn decode(&self, path: &Path, h: u32, w: u32, mode: ColorMode) -> Result<PixelGrid> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.inner.decode(path, h, w, mode)
    }
}
