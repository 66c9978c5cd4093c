//! Prefetch engine
//!
//! Main interface for consuming batches: `start`, `next_batch`, `stop`.

use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info};

use super::backpressure::{slot_pool, BatchLease, SlotReturn};
use super::batch::{data_shape, Batch};
use super::cursor::ManifestCursor;
use super::filler::BatchFiller;
use super::manifest::Manifest;
use super::prefetcher::Prefetcher;
use super::state::{EngineShared, EngineState};
use crate::config::ImageDataConfig;
use crate::error::{FetchError, Result};
use crate::imaging::{FrameGroupReader, FsImageLoader, ImageLoader, LabelPacker};
use crate::metrics::PrefetchMetrics;
use crate::runtime::ShutdownSignal;
use crate::tensor::FrameShape;
use crate::transform::{FrameTransform, PlanarTransform};

/// Asynchronous multi-frame batch prefetcher
///
/// A background task fills up to `prefetch_depth` batches ahead of the
/// consumer. Batches arrive in fill order as `BatchLease`s; a slot is
/// refilled only after its lease is released.
pub struct PrefetchEngine {
    config: ImageDataConfig,
    loader: Arc<dyn ImageLoader>,
    transform: Arc<dyn FrameTransform>,
    shared: Arc<EngineShared>,
    shutdown: ShutdownSignal,
    metrics: Arc<PrefetchMetrics>,
    /// Filled batches from the producer
    receiver: Option<mpsc::Receiver<Batch>>,
    /// Return path for released slots
    slots: Option<SlotReturn>,
    /// Task handle for the producer
    prefetch_handle: Option<tokio::task::JoinHandle<()>>,
    frame_shape: Option<FrameShape>,
    batches_delivered: u64,
}

impl PrefetchEngine {
    /// Create an idle engine using the filesystem loader and planar transform
    pub fn new(config: ImageDataConfig) -> Self {
        let transform = Arc::new(PlanarTransform::new(config.transform.clone()));
        Self {
            config,
            loader: Arc::new(FsImageLoader::new()),
            transform,
            shared: Arc::new(EngineShared::new()),
            shutdown: ShutdownSignal::new(),
            metrics: Arc::new(PrefetchMetrics::new()),
            receiver: None,
            slots: None,
            prefetch_handle: None,
            frame_shape: None,
            batches_delivered: 0,
        }
    }

    /// Replace the image decoder
    pub fn with_loader(mut self, loader: Arc<dyn ImageLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Replace the shape inference and transform step
    pub fn with_transform(mut self, transform: Arc<dyn FrameTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// Set up and spawn the producer on the current tokio runtime
    pub fn start(&mut self) -> Result<()> {
        let handle = Handle::try_current().map_err(|_| FetchError::Internal {
            message: "start() needs a tokio runtime; use start_on() from synchronous code".into(),
        })?;
        self.start_on(&handle)
    }

    /// Set up and spawn the producer on `handle`
    pub fn start_on(&mut self, handle: &Handle) -> Result<()> {
        if !self.shared.transition(EngineState::Idle, EngineState::Setup) {
            return Err(FetchError::AlreadyRunning);
        }

        let (filler, batches) = match self.setup() {
            Ok(parts) => parts,
            Err(e) => {
                self.shared.set_state(EngineState::Stopped);
                return Err(e);
            }
        };

        let depth = batches.len();
        let (slots, free) = slot_pool(batches)?;
        let (sender, receiver) = mpsc::channel(depth);

        let prefetcher = Prefetcher::new(
            sender,
            free,
            filler,
            self.shutdown.clone(),
            self.shared.clone(),
            self.metrics.clone(),
        );

        self.shared.set_state(EngineState::Running);
        self.prefetch_handle = Some(handle.spawn(prefetcher.run()));
        self.receiver = Some(receiver);
        self.slots = Some(slots);
        Ok(())
    }

    /// Parse the manifest, position the cursor, probe the shape and
    /// allocate every batch slot
    fn setup(&mut self) -> Result<(BatchFiller, Vec<Batch>)> {
        let config = &self.config;
        config.validate()?;

        let manifest = Manifest::load(&config.source)?;
        let mut cursor = ManifestCursor::new(manifest, config.shuffle, config.seed);
        if config.randomize_skip {
            cursor.random_skip(config.rand_skip)?;
        } else {
            cursor.skip(config.rand_skip)?;
        }

        let frames = FrameGroupReader::new(self.loader.clone(), config);
        let labels = LabelPacker::new(self.loader.clone(), config);

        // Use the first group to size the steady-state buffers
        let entry = cursor.current().clone();
        let group = frames.read_group(&entry)?;
        let shape = self.transform.infer_shape(&group)?;
        let mut probe = vec![0.0; LabelPacker::item_len()];
        labels.pack(&entry.label_path, &mut probe)?;

        let dims = data_shape(config.batch_size, config.frames_per_group, shape);
        info!("output data size: {:?}", dims);
        info!("output label size: {:?}", LabelPacker::shape(config.batch_size));

        let batches = (0..config.prefetch_depth)
            .map(|_| Batch::allocate(config.batch_size, config.frames_per_group, shape))
            .collect();
        let filler = BatchFiller::new(
            cursor,
            frames,
            labels,
            self.transform.clone(),
            config.batch_size,
            shape,
            self.metrics.clone(),
        );
        self.frame_shape = Some(shape);
        Ok((filler, batches))
    }

    /// Error to report when no batch can be delivered
    fn unavailable(&self) -> FetchError {
        self.shared.terminal().unwrap_or(FetchError::NotRunning)
    }

    /// Fail fast when the engine cannot deliver
    fn check_running(&self) -> Result<()> {
        if let Some(err) = self.shared.terminal() {
            return Err(err);
        }
        match self.shared.state() {
            EngineState::Running => Ok(()),
            _ => Err(FetchError::NotRunning),
        }
    }

    fn deliver(&mut self, batch: Batch) -> Result<BatchLease> {
        let slots = self.slots.as_ref().ok_or(FetchError::NotRunning)?;
        self.metrics.batches_consumed.inc();
        self.metrics.queued_batches.dec();
        self.batches_delivered += 1;
        Ok(slots.lease(batch))
    }

    /// Wait for the next filled batch
    ///
    /// After a decode or shape failure every call returns that error.
    pub async fn next_batch(&mut self) -> Result<BatchLease> {
        self.check_running()?;
        let receiver = self.receiver.as_mut().ok_or(FetchError::NotRunning)?;
        let next = receiver.recv().await;
        match next {
            Some(batch) => self.deliver(batch),
            None => Err(self.unavailable()),
        }
    }

    /// Blocking variant of `next_batch` for synchronous hosts.
    ///
    /// Must not be called from inside an async context.
    pub fn next_batch_blocking(&mut self) -> Result<BatchLease> {
        self.check_running()?;
        let receiver = self.receiver.as_mut().ok_or(FetchError::NotRunning)?;
        let next = receiver.blocking_recv();
        match next {
            Some(batch) => self.deliver(batch),
            None => Err(self.unavailable()),
        }
    }

    /// Take a filled batch if one is ready
    pub fn try_next_batch(&mut self) -> Result<Option<BatchLease>> {
        self.check_running()?;
        let receiver = self.receiver.as_mut().ok_or(FetchError::NotRunning)?;
        let next = receiver.try_recv();
        match next {
            Ok(batch) => self.deliver(batch).map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.unavailable()),
        }
    }

    /// Signal the producer to stop. Idempotent.
    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    /// Handle that stops this engine from another task or thread
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: self.shared.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Stop and wait for the producer task to exit
    pub async fn shutdown(mut self) {
        self.stop();
        drop(self.receiver.take());

        if let Some(handle) = self.prefetch_handle.take() {
            let _ = handle.await;
        }

        debug!(
            "Prefetch engine shutdown complete, delivered {} batches",
            self.batches_delivered
        );
    }

    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    pub fn config(&self) -> &ImageDataConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<PrefetchMetrics> {
        self.metrics.clone()
    }

    /// Frame shape probed at setup
    pub fn frame_shape(&self) -> Option<FrameShape> {
        self.frame_shape
    }

    /// Batches handed to the consumer so far
    pub fn batches_delivered(&self) -> u64 {
        self.batches_delivered
    }

    /// Batches currently held by the consumer
    pub fn leased_count(&self) -> usize {
        self.slots.as_ref().map(|s| s.leased_count()).unwrap_or(0)
    }
}

/// Cloneable stop trigger detached from the engine borrow
///
/// A consumer waiting in `next_batch` holds the engine mutably; a host
/// cancels it through this handle instead. The waiting call then returns
/// `NotRunning`.
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<EngineShared>,
    shutdown: ShutdownSignal,
}

impl StopHandle {
    /// Signal the producer to stop. Idempotent.
    pub fn stop(&self) {
        if self.shared.transition(EngineState::Running, EngineState::Stopping)
            || self.shared.transition(EngineState::Idle, EngineState::Stopped)
        {
            debug!("Stopping prefetch engine");
        }
        self.shutdown.shutdown();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_shutdown()
    }
}

impl Drop for PrefetchEngine {
    fn drop(&mut self) {
        self.shutdown.shutdown();
    }
}
