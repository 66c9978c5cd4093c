//! Prefetch metrics
//!
//! Lock-free values owned by one engine, rendered in Prometheus text
//! format on demand.

use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Upper bounds, in seconds, of the batch fill latency buckets
const FILL_BUCKETS: [f64; 11] = [0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Counter,
    Gauge,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Kind::Counter => "counter",
            Kind::Gauge => "gauge",
        }
    }
}

/// Single named value; counters only go up, gauges also go down
pub struct Metric {
    value: AtomicI64,
    name: &'static str,
    help: &'static str,
    kind: Kind,
}

impl Metric {
    fn new(kind: Kind, name: &'static str, help: &'static str) -> Self {
        Self {
            value: AtomicI64::new(0),
            name,
            help,
            kind,
        }
    }

    pub fn counter(name: &'static str, help: &'static str) -> Self {
        Self::new(Kind::Counter, name, help)
    }

    pub fn gauge(name: &'static str, help: &'static str) -> Self {
        Self::new(Kind::Gauge, name, help)
    }

    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, delta: u64) {
        self.value.fetch_add(delta as i64, Ordering::Relaxed);
    }

    /// Decrement a gauge; counters ignore it
    pub fn dec(&self) {
        if self.kind == Kind::Gauge {
            self.value.fetch_sub(1, Ordering::Relaxed);
        }
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    fn render(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.name, self.help);
        let _ = writeln!(out, "# TYPE {} {}", self.name, self.kind.as_str());
        let _ = writeln!(out, "{} {}", self.name, self.get());
    }
}

/// Batch fill latency distribution
pub struct FillLatency {
    buckets: [AtomicU64; FILL_BUCKETS.len()],
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl FillLatency {
    const NAME: &'static str = "framefetch_batch_fill_seconds";

    fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, elapsed: Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros.fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);

        let secs = elapsed.as_secs_f64();
        // Buckets are cumulative
        for (bound, bucket) in FILL_BUCKETS.iter().zip(&self.buckets) {
            if secs <= *bound {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Batches observed so far
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn render(&self, out: &mut String) {
        let name = Self::NAME;
        let _ = writeln!(out, "# HELP {} Wall time to fill one batch", name);
        let _ = writeln!(out, "# TYPE {} histogram", name);
        for (bound, bucket) in FILL_BUCKETS.iter().zip(&self.buckets) {
            let _ = writeln!(out, "{}_bucket{{le=\"{}\"}} {}", name, bound, bucket.load(Ordering::Relaxed));
        }
        let _ = writeln!(out, "{}_bucket{{le=\"+Inf\"}} {}", name, self.count());
        let sum_secs = self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        let _ = writeln!(out, "{}_sum {}", name, sum_secs);
        let _ = writeln!(out, "{}_count {}", name, self.count());
    }
}

/// Metrics recorded by one prefetch engine
pub struct PrefetchMetrics {
    pub batches_produced: Metric,
    pub batches_consumed: Metric,
    pub items_loaded: Metric,
    pub epochs: Metric,
    pub reallocations: Metric,
    pub read_micros: Metric,
    pub transform_micros: Metric,
    /// Filled batches waiting in the handoff channel
    pub queued_batches: Metric,
    pub fill_latency: FillLatency,
}

impl PrefetchMetrics {
    pub fn new() -> Self {
        Self {
            batches_produced: Metric::counter("framefetch_batches_produced_total", "Batches filled by the producer"),
            batches_consumed: Metric::counter("framefetch_batches_consumed_total", "Batches handed to the consumer"),
            items_loaded: Metric::counter("framefetch_items_loaded_total", "Manifest items decoded and packed"),
            epochs: Metric::counter("framefetch_epochs_total", "Completed passes over the manifest"),
            reallocations: Metric::counter(
                "framefetch_buffer_reallocations_total",
                "Data buffers reallocated after a shape change",
            ),
            read_micros: Metric::counter("framefetch_read_microseconds_total", "Time spent decoding frame groups"),
            transform_micros: Metric::counter(
                "framefetch_transform_microseconds_total",
                "Time spent transforming frames and packing labels",
            ),
            queued_batches: Metric::gauge("framefetch_queued_batches", "Filled batches waiting for the consumer"),
            fill_latency: FillLatency::new(),
        }
    }

    /// Render every metric in Prometheus text format
    pub fn export(&self) -> String {
        let mut out = String::new();
        for metric in [
            &self.batches_produced,
            &self.batches_consumed,
            &self.items_loaded,
            &self.epochs,
            &self.reallocations,
            &self.read_micros,
            &self.transform_micros,
            &self.queued_batches,
        ] {
            metric.render(&mut out);
        }
        self.fill_latency.render(&mut out);
        out
    }
}

impl Default for PrefetchMetrics {
    fn default() -> Self {
        Self::new()
    }
}
