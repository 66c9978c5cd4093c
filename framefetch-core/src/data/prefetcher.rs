//! Background batch producer
//!
//! Runs on a separate task, filling free batch slots ahead of consumption
//! and publishing them in fill order.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::backpressure::FreeSlots;
use super::batch::Batch;
use super::filler::{BatchFiller, FillOutcome};
use super::state::{EngineShared, EngineState};
use crate::error::FetchError;
use crate::metrics::PrefetchMetrics;
use crate::runtime::ShutdownSignal;

/// Producer task that owns the cursor and fills batches
pub struct Prefetcher {
    /// Channel delivering filled batches to the consumer
    sender: mpsc::Sender<Batch>,
    /// Empty slots returned by the consumer
    free: FreeSlots,
    /// Fill state; moved onto the blocking pool for each batch
    filler: Option<BatchFiller>,
    shutdown: ShutdownSignal,
    shared: Arc<EngineShared>,
    metrics: Arc<PrefetchMetrics>,
    /// Next batch sequence number
    sequence: u64,
}

impl Prefetcher {
    pub fn new(
        sender: mpsc::Sender<Batch>,
        free: FreeSlots,
        filler: BatchFiller,
        shutdown: ShutdownSignal,
        shared: Arc<EngineShared>,
        metrics: Arc<PrefetchMetrics>,
    ) -> Self {
        Self {
            sender,
            free,
            filler: Some(filler),
            shutdown,
            shared,
            metrics,
            sequence: 0,
        }
    }

    /// Run the producer loop until shutdown, failure or consumer drop
    pub async fn run(mut self) {
        debug!("Prefetcher starting");

        loop {
            // Wait for a free slot (backpressure)
            let batch = tokio::select! {
                biased;
                _ = self.shutdown.wait() => break,
                slot = self.free.acquire() => match slot {
                    Some(batch) => batch,
                    None => break,
                },
            };

            let batch = match self.fill(batch).await {
                Ok(Some(batch)) => batch,
                Ok(None) => {
                    debug!("Prefetcher: shutdown observed mid-batch");
                    break;
                }
                Err(e) => {
                    error!("Prefetch failed: {}", e);
                    self.shared.fail(e);
                    break;
                }
            };

            tokio::select! {
                biased;
                _ = self.shutdown.wait() => break,
                sent = self.sender.send(batch) => {
                    if sent.is_err() {
                        debug!("Prefetcher: consumer dropped, stopping");
                        break;
                    }
                    self.metrics.batches_produced.inc();
                    self.metrics.queued_batches.inc();
                }
            }
        }

        self.shared.set_state(EngineState::Stopped);
        debug!("Prefetcher stopped after {} batches", self.sequence);
    }

    /// Fill one batch on the blocking pool. `Ok(None)` when cancelled.
    async fn fill(&mut self, mut batch: Batch) -> Result<Option<Batch>, FetchError> {
        let mut filler = self.filler.take().ok_or_else(|| FetchError::Internal {
            message: "prefetcher lost its fill state".into(),
        })?;
        let shutdown = self.shutdown.clone();

        let joined = tokio::task::spawn_blocking(move || {
            let outcome = filler.fill(&mut batch, &shutdown);
            (filler, batch, outcome)
        })
        .await
        .map_err(|e| FetchError::Internal {
            message: format!("fill task panicked: {}", e),
        })?;

        let (filler, mut batch, outcome) = joined;
        self.filler = Some(filler);
        match outcome? {
            FillOutcome::Complete => {
                batch.sequence = self.sequence;
                self.sequence += 1;
                Ok(Some(batch))
            }
            FillOutcome::Cancelled => Ok(None),
        }
    }
}
