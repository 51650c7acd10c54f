//! Work distribution across tenants.
//!
//! Items within a tenant are always processed one after another, in listing
//! order. Tenants share no state, so several may run side by side when
//! `concurrency` allows it.

use crate::pipeline::{ItemProcessor, ItemResult, Metrics, ProgressLedger, TenantProgress};
use crate::upload::{TenantBatch, UploadTree};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of tenants processed concurrently
    pub concurrency: usize,

    /// Log a metrics summary at the end of the run
    pub enable_metrics: bool,

    /// Optional path to save metrics JSON after run completes
    pub metrics_output_path: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            enable_metrics: true,
            metrics_output_path: None,
        }
    }
}

/// Scheduler for one pass over the upload tree.
pub struct Scheduler {
    /// Item processor
    processor: Arc<ItemProcessor>,

    /// Upload tree to walk
    tree: UploadTree,

    /// Metrics
    metrics: Arc<Metrics>,

    /// Configuration
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a new scheduler.
    pub fn new(
        processor: Arc<ItemProcessor>,
        tree: UploadTree,
        metrics: Arc<Metrics>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            processor,
            tree,
            metrics,
            config,
        }
    }

    /// Walk every tenant and item once.
    pub async fn run(&self) -> Result<RunReport> {
        if !self.tree.root().exists() {
            tracing::warn!("Upload root {} does not exist, nothing to do", self.tree.root().display());
            return Ok(RunReport::default());
        }

        // Listed before any work starts; tenant directories are removed during the pass
        let tenants: Vec<TenantBatch> = self
            .tree
            .tenants()
            .with_context(|| format!("listing {}", self.tree.root().display()))?
            .filter_map(|t| match t {
                Ok(t) => Some(t),
                Err(e) => {
                    tracing::error!("Unreadable entry in {}: {}", self.tree.root().display(), e);
                    None
                }
            })
            .collect();

        tracing::info!(
            "Scheduling {} tenants ({} concurrent)",
            tenants.len(),
            self.config.concurrency
        );

        let processor = self.processor.clone();
        let metrics = self.metrics.clone();

        let results: Vec<TenantProgress> = stream::iter(tenants)
            .map(|tenant| {
                let processor = processor.clone();
                let metrics = metrics.clone();
                async move { process_tenant(&processor, &metrics, tenant).await }
            })
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        let mut report = RunReport::default();
        for progress in results {
            report.stats.tenants += 1;
            report.stats.items_attempted += progress.attempted();
            report.stats.items_promoted += progress.promoted();
            report.ledger.record(progress);
        }

        let snapshot = self.metrics.snapshot();
        report.stats.tenants_removed = snapshot.tenants_removed as usize;
        report.stats.tiles_written = snapshot.tiles_written as usize;

        if self.config.enable_metrics {
            tracing::info!("Run metrics: {}", snapshot);

            if let Some(ref path) = self.config.metrics_output_path {
                if let Err(e) = snapshot.save_to_file(path) {
                    tracing::warn!("Failed to save metrics to {}: {}", path, e);
                }
            }
        }

        Ok(report)
    }
}

/// Process every item of one tenant, then remove the tenant directory if
/// every attempted item was promoted.
async fn process_tenant(
    processor: &ItemProcessor,
    metrics: &Metrics,
    tenant: TenantBatch,
) -> TenantProgress {
    tracing::info!("Processing tenant {}", tenant.name);
    let mut progress = TenantProgress::new(&tenant.name);

    let items = match tenant.items() {
        Ok(items) => items,
        Err(e) => {
            tracing::error!("Cannot list tenant {}: {}", tenant.name, e);
            return progress;
        }
    };

    for item in items {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                tracing::error!("Unreadable entry in tenant {}: {}", tenant.name, e);
                continue;
            }
        };

        if let ItemResult::Promoted { tiles } = processor.process(&item, &mut progress).await {
            tracing::info!("Map {} of tenant {} promoted ({} tiles)", item.name, tenant.name, tiles);
        }
    }

    if progress.all_promoted() {
        tracing::info!("Removing {}", tenant.path.display());
        match tokio::fs::remove_dir_all(&tenant.path).await {
            Ok(()) => metrics.add_tenant_removed(),
            Err(e) => tracing::warn!("Could not remove {}: {}", tenant.path.display(), e),
        }
    }

    progress
}

/// Everything a run did.
#[derive(Debug, Default)]
pub struct RunReport {
    pub stats: RunStats,
    pub ledger: ProgressLedger,
}

/// Statistics from a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    /// Tenant directories visited
    pub tenants: usize,

    /// Tenant directories removed
    pub tenants_removed: usize,

    /// Items attempted
    pub items_attempted: usize,

    /// Items promoted
    pub items_promoted: usize,

    /// Tiles written
    pub tiles_written: usize,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tenants: {} ({} removed), Items: {} attempted, {} promoted, Tiles: {}",
            self.tenants,
            self.tenants_removed,
            self.items_attempted,
            self.items_promoted,
            self.tiles_written
        )
    }
}
