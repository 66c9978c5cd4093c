//! Backpressure through batch slot ownership
//!
//! A fixed number of preallocated batches circulate between the producer
//! and the consumer. The producer can only fill a batch it received from
//! the free-slot channel, so it blocks once every slot is queued or held.
//! Consumers hold a `BatchLease`; the slot goes back when the lease is
//! released or dropped.

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::batch::Batch;
use crate::error::{FetchError, Result};

/// Sending half of the free-slot channel, held by leases
#[derive(Clone)]
pub struct SlotReturn {
    sender: mpsc::Sender<Batch>,
    leased: Arc<AtomicUsize>,
}

/// Receiving half of the free-slot channel, held by the producer
pub struct FreeSlots {
    receiver: mpsc::Receiver<Batch>,
}

/// Create a slot pool seeded with `batches`
pub fn slot_pool(batches: Vec<Batch>) -> Result<(SlotReturn, FreeSlots)> {
    let depth = batches.len();
    if depth == 0 {
        return Err(FetchError::InvalidConfig {
            reason: "slot pool needs at least one batch".into(),
        });
    }
    let (sender, receiver) = mpsc::channel(depth);
    for batch in batches {
        sender.try_send(batch).map_err(|e| FetchError::Internal {
            message: format!("failed to seed slot pool: {}", e),
        })?;
    }
    Ok((
        SlotReturn {
            sender,
            leased: Arc::new(AtomicUsize::new(0)),
        },
        FreeSlots { receiver },
    ))
}

impl SlotReturn {
    /// Wrap a delivered batch so its slot returns on drop
    pub fn lease(&self, batch: Batch) -> BatchLease {
        self.leased.fetch_add(1, Ordering::Relaxed);
        BatchLease {
            batch,
            slots: self.clone(),
        }
    }

    /// Batches currently held by consumers
    pub fn leased_count(&self) -> usize {
        self.leased.load(Ordering::Relaxed)
    }

    fn give_back(&self, batch: Batch) {
        self.leased.fetch_sub(1, Ordering::Relaxed);
        // Capacity equals the slot count, so this only fails once the
        // producer has gone away and the slot is no longer needed.
        let _ = self.sender.try_send(batch);
    }
}

impl FreeSlots {
    /// Wait for an empty slot. `None` once every sender is gone.
    pub async fn acquire(&mut self) -> Option<Batch> {
        self.receiver.recv().await
    }

    /// Take an empty slot without waiting
    pub fn try_acquire(&mut self) -> Option<Batch> {
        self.receiver.try_recv().ok()
    }
}

/// Consumer-held ownership of a filled batch
pub struct BatchLease {
    batch: Batch,
    slots: SlotReturn,
}

impl BatchLease {
    /// Return the slot to the producer
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for BatchLease {
    type Target = Batch;

    fn deref(&self) -> &Batch {
        &self.batch
    }
}

impl Drop for BatchLease {
    fn drop(&mut self) {
        // Leaves an unallocated placeholder behind
        self.slots.give_back(std::mem::take(&mut self.batch));
    }
}

impl std::fmt::Debug for BatchLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchLease").field("batch", &self.batch).finish()
    }
}
