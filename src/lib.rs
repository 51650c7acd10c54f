//! Map Tiler
//!
//! Batch job that turns uploaded map-sea captures into slippy-map tile pyramids.
//!
//! # Architecture
//!
//! Each run walks `<upload_root>/<tenant>/<item>/`, where an item is a
//! directory of six PNG captures. For every item the pipeline:
//!
//! - **Upload**: checks the destination is free, the file set is exactly the
//!   six required names, and every file really is PNG data
//! - **Transform**: stitches the captures onto a 9216x9216 master, then
//!   resamples it to zoom levels 5..0 and cuts each into 256x256 tiles
//! - **Pipeline**: marks the item processed in its tenant's database, removes
//!   the upload, and removes the tenant directory once all its items are done
//!
//! A marker file keeps runs from overlapping. Failures are contained to the
//! item; the upload stays in place for the next run.
//!
//! # Usage
//!
//! ```no_run
//! use map_tiler::{Config, run_pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file(&"config.yaml".into())?;
//!     run_pipeline(config).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod transform;
pub mod upload;

pub use config::Config;
pub use error::{ItemError, LockError, StoreError, ValidationError};
pub use io::{ItemStore, PostgresItemStore};
pub use pipeline::{ItemProcessor, Metrics, RunLock, RunReport, RunStats, Scheduler, SchedulerConfig};
pub use transform::Geometry;
pub use upload::{ItemValidator, ScanReport, UploadTree};

use anyhow::Result;
use std::sync::Arc;

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The pass over the upload tree finished
    Completed(RunReport),

    /// Another run holds the lock; nothing was scanned
    AlreadyRunning,
}

/// Run the tiling job against the production item store.
pub async fn run_pipeline(config: Config) -> Result<RunOutcome> {
    let store = io::create_item_store(&config);
    run_pipeline_with(config, Geometry::standard(), store).await
}

/// Run the tiling job with an explicit geometry and item store.
pub async fn run_pipeline_with(
    config: Config,
    geometry: Geometry,
    store: Arc<dyn ItemStore>,
) -> Result<RunOutcome> {
    config.validate()?;

    let start = chrono::Utc::now();
    tracing::info!("Map processing running {}", start.to_rfc3339());

    let lock = match RunLock::acquire(&config.paths.lock_path) {
        Ok(lock) => lock,
        Err(LockError::AlreadyRunning { path }) => {
            tracing::warn!("Aborting - process already running ({} exists)", path.display());
            return Ok(RunOutcome::AlreadyRunning);
        }
        Err(e) => return Err(e.into()),
    };

    let metrics = Metrics::new();

    let processor = Arc::new(ItemProcessor::new(
        config.paths.storage_root.clone(),
        geometry,
        store,
        config.store.clone(),
        metrics.clone(),
    ));

    let scheduler_config = SchedulerConfig {
        concurrency: config.processing.tenant_concurrency,
        enable_metrics: config.processing.enable_metrics,
        metrics_output_path: config.processing.metrics_output_path.clone(),
    };

    let scheduler = Scheduler::new(
        processor,
        UploadTree::new(&config.paths.upload_root),
        metrics,
        scheduler_config,
    );

    let result = scheduler.run().await;

    // Released even when the pass failed
    let released = lock.release();
    let report = result?;
    released?;

    let end = chrono::Utc::now();
    tracing::info!("Map processing finished {}: {}", end.to_rfc3339(), report.stats);

    Ok(RunOutcome::Completed(report))
}

/// Validate every pending item without taking the lock or changing anything.
pub fn scan_uploads(config: &Config) -> Result<ScanReport> {
    let geometry = Geometry::standard();
    let tree = UploadTree::new(&config.paths.upload_root);
    let validator = ItemValidator::new(&geometry);
    Ok(upload::scan(&tree, &validator, &config.paths.storage_root)?)
}

/// Build a Tokio runtime with the specified configuration.
pub fn build_runtime(worker_threads: Option<usize>) -> Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();

    if let Some(threads) = worker_threads {
        builder.worker_threads(threads);
    }

    builder.enable_all();

    Ok(builder.build()?)
}

/// Initialize the Rayon thread pool used for tile encoding.
pub fn init_rayon(threads: Option<usize>) -> Result<()> {
    if let Some(threads) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }
    Ok(())
}
