//! Run metrics collection.

use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Metrics for one run.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Items picked up for processing
    pub items_attempted: AtomicU64,

    /// Items whose pyramid was generated and source removed
    pub items_promoted: AtomicU64,

    /// Items rejected by validation
    pub items_skipped: AtomicU64,

    /// Items that failed after validation
    pub items_failed: AtomicU64,

    /// Tenant directories removed
    pub tenants_removed: AtomicU64,

    /// Tiles written
    pub tiles_written: AtomicU64,

    /// Store updates that failed
    pub store_failures: AtomicU64,

    /// Start time
    start_time: Option<Instant>,

    /// Time spent stitching masters (microseconds)
    pub compose_us: AtomicU64,

    /// Time spent generating pyramids (microseconds)
    pub pyramid_us: AtomicU64,
}

impl Metrics {
    /// Create new metrics.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        })
    }

    pub fn add_item_attempted(&self) {
        self.items_attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_item_promoted(&self) {
        self.items_promoted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_item_skipped(&self) {
        self.items_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_item_failed(&self) {
        self.items_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_tenant_removed(&self) {
        self.tenants_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_tiles_written(&self, count: u64) {
        self.tiles_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record time spent stitching (in microseconds).
    pub fn add_compose_time(&self, duration: Duration) {
        self.compose_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record time spent cutting pyramids (in microseconds).
    pub fn add_pyramid_time(&self, duration: Duration) {
        self.pyramid_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start_time.map_or(Duration::ZERO, |t| t.elapsed())
    }

    /// Tiles written per second of wall time.
    pub fn tiles_per_second(&self) -> f64 {
        let tiles = self.tiles_written.load(Ordering::Relaxed);
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            tiles as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_attempted: self.items_attempted.load(Ordering::Relaxed),
            items_promoted: self.items_promoted.load(Ordering::Relaxed),
            items_skipped: self.items_skipped.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            tenants_removed: self.tenants_removed.load(Ordering::Relaxed),
            tiles_written: self.tiles_written.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
            tiles_per_second: self.tiles_per_second(),
            compose_secs: self.compose_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            pyramid_secs: self.pyramid_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub items_attempted: u64,
    pub items_promoted: u64,
    pub items_skipped: u64,
    pub items_failed: u64,
    pub tenants_removed: u64,
    pub tiles_written: u64,
    pub store_failures: u64,
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
    pub tiles_per_second: f64,
    /// Total time spent stitching masters (seconds)
    pub compose_secs: f64,
    /// Total time spent cutting pyramids (seconds)
    pub pyramid_secs: f64,
}

impl MetricsSnapshot {
    /// Save metrics to a JSON file.
    pub fn save_to_file(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!("Metrics saved to {}", path);
        Ok(())
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Items: {} attempted, {} promoted, {} skipped, {} failed | \
             Tenants removed: {} | Tiles: {} ({:.1}/s) | Store failures: {} | \
             Time: compose {:.1}s, pyramid {:.1}s, elapsed {:.1}s",
            self.items_attempted,
            self.items_promoted,
            self.items_skipped,
            self.items_failed,
            self.tenants_removed,
            self.tiles_written,
            self.tiles_per_second,
            self.store_failures,
            self.compose_secs,
            self.pyramid_secs,
            self.elapsed.as_secs_f64(),
        )
    }
}
