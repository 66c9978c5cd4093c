//! Prefetch driver binary
//!
//! Streams a number of batches from a JSON-configured engine and reports
//! timings and metrics.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use framefetch_core::runtime::{FetchRuntime, RuntimeConfig};
use framefetch_core::{ImageDataConfig, PrefetchEngine};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "framefetch", about = "Prefetch multi-frame image batches from a manifest")]
struct Args {
    /// JSON image data configuration
    #[arg(env = "FRAMEFETCH_CONFIG")]
    config: PathBuf,
    /// Number of batches to consume
    #[arg(long, env = "FRAMEFETCH_BATCHES", default_value_t = 10)]
    batches: u64,
    /// Async worker threads (defaults to a quarter of the CPUs)
    #[arg(long)]
    worker_threads: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = ImageDataConfig::from_json_file(&args.config)?;
    config.apply_env()?;
    info!("Loaded configuration from {}", args.config.display());

    let mut runtime_config = RuntimeConfig::default();
    if let Some(threads) = args.worker_threads {
        runtime_config.worker_threads = threads.max(1);
    }
    let runtime = FetchRuntime::new(runtime_config)?;
    let mut engine = PrefetchEngine::new(config);
    engine.start_on(&runtime.handle())?;
    info!(
        "Prefetching {} batches ahead, frame shape {:?}",
        engine.config().prefetch_depth,
        engine.frame_shape()
    );

    let started = Instant::now();
    for _ in 0..args.batches {
        let wait = Instant::now();
        match engine.next_batch_blocking() {
            Ok(batch) => {
                info!(
                    "Batch {}: data {:?}, label {:?}, waited {:?}",
                    batch.sequence,
                    batch.data.shape(),
                    batch.label.shape(),
                    wait.elapsed()
                );
                batch.release();
            }
            Err(e) => {
                error!("Prefetch failed: {}", e);
                engine.stop();
                return Err(e.into());
            }
        }
    }

    let elapsed = started.elapsed();
    info!(
        "Consumed {} batches in {:?} ({:.2} batches/s)",
        engine.batches_delivered(),
        elapsed,
        engine.batches_delivered() as f64 / elapsed.as_secs_f64()
    );

    let metrics = engine.metrics();
    runtime.block_on(engine.shutdown());
    print!("{}", metrics.export());
    runtime.shutdown();
    Ok(())
}
