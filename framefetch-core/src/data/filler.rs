//! Per-batch fill loop
//!
//! Runs on the blocking pool. For each item: read the frame group under
//! the cursor, infer its shape, transform it into the item's region, pack
//! the label, advance the cursor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use super::batch::{data_shape, Batch};
use super::cursor::ManifestCursor;
use crate::error::{FetchError, Result};
use crate::imaging::{FrameGroupReader, LabelPacker};
use crate::metrics::PrefetchMetrics;
use crate::runtime::ShutdownSignal;
use crate::tensor::FrameShape;
use crate::transform::FrameTransform;

/// Result of a fill attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Every item was written
    Complete,
    /// Shutdown was observed before the batch was full
    Cancelled,
}

/// Producer-owned state needed to fill batches
pub struct BatchFiller {
    cursor: ManifestCursor,
    frames: FrameGroupReader,
    labels: LabelPacker,
    transform: Arc<dyn FrameTransform>,
    batch_size: usize,
    shape: FrameShape,
    metrics: Arc<PrefetchMetrics>,
}

impl BatchFiller {
    pub fn new(
        cursor: ManifestCursor,
        frames: FrameGroupReader,
        labels: LabelPacker,
        transform: Arc<dyn FrameTransform>,
        batch_size: usize,
        shape: FrameShape,
        metrics: Arc<PrefetchMetrics>,
    ) -> Self {
        Self {
            cursor,
            frames,
            labels,
            transform,
            batch_size,
            shape,
            metrics,
        }
    }

    /// Shape of one transformed frame in the current batches
    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    pub fn cursor(&self) -> &ManifestCursor {
        &self.cursor
    }

    /// Fill `batch` with the next `batch_size` items
    pub fn fill(&mut self, batch: &mut Batch, shutdown: &ShutdownSignal) -> Result<FillOutcome> {
        let batch_timer = Instant::now();
        let mut read_time = Duration::ZERO;
        let mut trans_time = Duration::ZERO;
        let k = self.frames.frames_per_group();

        batch.entries.clear();
        batch.label.reshape(&LabelPacker::shape(self.batch_size));

        for item_id in 0..self.batch_size {
            if shutdown.is_shutdown() {
                return Ok(FillOutcome::Cancelled);
            }

            let timer = Instant::now();
            let entry = self.cursor.current().clone();
            let group = self.frames.read_group(&entry)?;
            read_time += timer.elapsed();

            let shape = self.transform.infer_shape(&group)?;
            if item_id == 0 {
                // Reshape according to the first group of each batch
                if shape != self.shape {
                    debug!("Frame shape changed from {:?} to {:?}", self.shape, shape);
                    self.shape = shape;
                }
                if batch.data.reshape(&data_shape(self.batch_size, k, shape)) {
                    self.metrics.reallocations.inc();
                }
            } else if shape != self.shape {
                return Err(FetchError::InconsistentBatchShape {
                    expected: self.shape.dims().to_vec(),
                    actual: shape.dims().to_vec(),
                });
            }

            let timer = Instant::now();
            self.transform.transform(&group, batch.data.item_mut(item_id)?)?;
            self.labels.pack(&entry.label_path, batch.label.item_mut(item_id)?)?;
            trans_time += timer.elapsed();

            batch.entries.push(entry);
            self.metrics.items_loaded.inc();
            if self.cursor.advance() {
                self.metrics.epochs.inc();
            }
        }

        let elapsed = batch_timer.elapsed();
        self.metrics.fill_latency.observe(elapsed);
        self.metrics.read_micros.inc_by(read_time.as_micros() as u64);
        self.metrics.transform_micros.inc_by(trans_time.as_micros() as u64);
        debug!("Prefetch batch: {:.3} ms.", elapsed.as_secs_f64() * 1000.0);
        debug!("     Read time: {:.3} ms.", read_time.as_secs_f64() * 1000.0);
        debug!("Transform time: {:.3} ms.", trans_time.as_secs_f64() * 1000.0);

        Ok(FillOutcome::Complete)
    }
}
