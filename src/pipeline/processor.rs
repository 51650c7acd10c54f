//! Per-item processing: validate, stitch, cut, promote.

use crate::config::StoreConfig;
use crate::error::{ItemError, StoreError};
use crate::io::{decode_item_id, ItemStore};
use crate::pipeline::{Metrics, TenantProgress};
use crate::transform::{build_master, generate_pyramid, Geometry, PyramidSummary};
use crate::upload::{ItemValidator, MapItem};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How an item ended up.
#[derive(Debug)]
pub enum ItemResult {
    /// Pyramid generated and source removed
    Promoted { tiles: usize },

    /// Left in the upload tree for a later run
    Unpromoted(ItemError),
}

impl ItemResult {
    pub fn is_promoted(&self) -> bool {
        matches!(self, ItemResult::Promoted { .. })
    }
}

/// Processor for individual map items.
pub struct ItemProcessor {
    /// Root of generated pyramids
    storage_root: PathBuf,

    /// Canvas and pyramid geometry
    geometry: Arc<Geometry>,

    /// Pre-flight checks
    validator: Arc<ItemValidator>,

    /// Where promoted items are recorded
    store: Arc<dyn ItemStore>,

    /// Store commit policy and retry settings
    store_config: StoreConfig,

    /// Metrics collector
    metrics: Arc<Metrics>,
}

impl ItemProcessor {
    pub fn new(
        storage_root: PathBuf,
        geometry: Geometry,
        store: Arc<dyn ItemStore>,
        store_config: StoreConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            validator: Arc::new(ItemValidator::new(&geometry)),
            storage_root,
            geometry: Arc::new(geometry),
            store,
            store_config,
            metrics,
        }
    }

    /// Process one item, recording its outcome in `progress`.
    ///
    /// Never fails as a whole: every error is logged and reported as
    /// [`ItemResult::Unpromoted`].
    pub async fn process(&self, item: &MapItem, progress: &mut TenantProgress) -> ItemResult {
        tracing::info!("Processing map {} of tenant {}", item.name, item.tenant);
        progress.begin(&item.name);
        self.metrics.add_item_attempted();

        match self.try_process(item, progress).await {
            Ok(tiles) => {
                self.metrics.add_item_promoted();
                ItemResult::Promoted { tiles }
            }
            Err(e) if e.is_validation() => {
                tracing::warn!("Skipping map {} of tenant {}: {}", item.name, item.tenant, e);
                self.metrics.add_item_skipped();
                ItemResult::Unpromoted(e)
            }
            Err(e) => {
                tracing::error!("Map {} of tenant {} failed: {}", item.name, item.tenant, e);
                self.metrics.add_item_failed();
                ItemResult::Unpromoted(e)
            }
        }
    }

    async fn try_process(
        &self,
        item: &MapItem,
        progress: &mut TenantProgress,
    ) -> Result<usize, ItemError> {
        let summary = self.build(item).await?;
        let tiles = summary.total_tiles();
        self.metrics.add_tiles_written(tiles as u64);

        self.promote(item, progress).await?;
        Ok(tiles)
    }

    /// Validate, stitch the master and cut the pyramid on the blocking pool.
    async fn build(&self, item: &MapItem) -> Result<PyramidSummary, ItemError> {
        let validator = self.validator.clone();
        let geometry = self.geometry.clone();
        let metrics = self.metrics.clone();
        let dest = item.destination(&self.storage_root);
        let item = item.clone();

        tokio::task::spawn_blocking(move || -> Result<PyramidSummary, ItemError> {
            validator.validate(&item, &dest)?;

            let start = Instant::now();
            let master = build_master(&item.path, &dest, &geometry)?;
            metrics.add_compose_time(start.elapsed());

            let start = Instant::now();
            let summary = generate_pyramid(master, &dest, &geometry)?;
            metrics.add_pyramid_time(start.elapsed());
            Ok(summary)
        })
        .await
        .map_err(|e| ItemError::Task(e.to_string()))?
    }

    /// Record the item as processed and remove its source directory.
    async fn promote(&self, item: &MapItem, progress: &mut TenantProgress) -> Result<(), ItemError> {
        if self.store_config.require_commit {
            self.commit_with_retry(item).await?;
            progress.mark_promoted(&item.name);
        } else {
            progress.mark_promoted(&item.name);
            if let Err(e) = self.commit_with_retry(item).await {
                tracing::error!(
                    "Map {} of tenant {} is tiled but not marked processed: {}",
                    item.name,
                    item.tenant,
                    e
                );
            }
        }

        if let Err(e) = tokio::fs::remove_dir_all(&item.path).await {
            tracing::warn!("Could not remove source {}: {}", item.path.display(), e);
        }
        Ok(())
    }

    /// Mark the item processed, retrying transient failures with backoff.
    async fn commit_with_retry(&self, item: &MapItem) -> Result<(), StoreError> {
        let result = self.commit(item).await;
        if result.is_err() {
            self.metrics.add_store_failure();
        }
        result
    }

    async fn commit(&self, item: &MapItem) -> Result<(), StoreError> {
        let id = decode_item_id(&item.name)?;
        let retry = &self.store_config.retry;

        let mut attempt = 0;
        let mut backoff = retry.initial_backoff_ms;

        loop {
            match self.store.mark_processed(&item.tenant, &id).await {
                Ok(0) => {
                    tracing::warn!("No store record matched map {} ({}) of tenant {}", item.name, id, item.tenant);
                    return Ok(());
                }
                Ok(_) => return Ok(()),
                Err(e) => {
                    attempt += 1;
                    if attempt >= retry.max_retries.max(1) {
                        return Err(e);
                    }

                    tracing::warn!(
                        "Store update for map {} attempt {} failed: {}, retrying in {}ms",
                        item.name,
                        attempt,
                        e,
                        backoff
                    );

                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    backoff = (backoff * 2).min(retry.max_backoff_ms);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PyramidError, ValidationError};
    use crate::transform::SourceTile;
    use async_trait::async_trait;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ItemStore for CountingStore {
        async fn mark_processed(&self, _tenant: &str, _item_id: &str) -> Result<u64, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        }
    }

    fn small_geometry(tile_size: u32) -> Geometry {
        let offsets = [(0, 0), (4, 0), (0, 3), (4, 3), (0, 5), (4, 5)];
        Geometry {
            canvas_size: 8,
            tile_size,
            max_zoom: 1,
            sources: Geometry::standard()
                .sources
                .iter()
                .zip(offsets)
                .map(|(s, (x, y))| SourceTile { name: s.name, x, y })
                .collect(),
        }
    }

    struct Setup {
        _root: tempfile::TempDir,
        item: MapItem,
        storage: PathBuf,
        store: Arc<CountingStore>,
        metrics: Arc<Metrics>,
    }

    fn setup(geometry: &Geometry) -> Setup {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("uploads").join("acme").join("MTI=");
        std::fs::create_dir_all(&path).unwrap();
        for name in geometry.required_names() {
            RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255]))
                .save_with_format(path.join(name), ImageFormat::Png)
                .unwrap();
        }
        Setup {
            item: MapItem {
                tenant: "acme".to_string(),
                name: "MTI=".to_string(),
                path,
            },
            storage: root.path().join("storage"),
            store: Arc::new(CountingStore::default()),
            metrics: Metrics::new(),
            _root: root,
        }
    }

    fn processor(setup: &Setup, geometry: Geometry) -> ItemProcessor {
        ItemProcessor::new(
            setup.storage.clone(),
            geometry,
            setup.store.clone(),
            StoreConfig::default(),
            setup.metrics.clone(),
        )
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_promoted_item() {
        let geometry = small_geometry(2);
        let setup = setup(&geometry);
        let mut progress = TenantProgress::new("acme");

        let result = processor(&setup, geometry).process(&setup.item, &mut progress).await;

        assert!(matches!(result, ItemResult::Promoted { tiles: 5 }));
        assert_eq!(progress.outcome("MTI="), Some(true));
        assert_eq!(setup.store.calls.load(Ordering::SeqCst), 1);
        assert!(!setup.item.path.exists());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_rejected_item_is_skipped() {
        let geometry = small_geometry(2);
        let setup = setup(&geometry);
        std::fs::write(setup.item.path.join("extra"), b"x").unwrap();
        let mut progress = TenantProgress::new("acme");

        let result = processor(&setup, geometry).process(&setup.item, &mut progress).await;

        assert!(matches!(
            result,
            ItemResult::Unpromoted(ItemError::Validation(ValidationError::WrongFileCount { found: 7, .. }))
        ));
        assert_eq!(progress.outcome("MTI="), Some(false));
        assert_eq!(setup.metrics.snapshot().items_skipped, 1);
        assert!(!setup.storage.exists());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_pyramid_failure_is_not_promoted() {
        let geometry = small_geometry(0);
        let setup = setup(&geometry);
        let mut progress = TenantProgress::new("acme");

        let result = processor(&setup, geometry).process(&setup.item, &mut progress).await;

        assert!(matches!(
            result,
            ItemResult::Unpromoted(ItemError::Pyramid(PyramidError::InvalidGeometry(_)))
        ));
        assert_eq!(progress.outcome("MTI="), Some(false));
        assert_eq!(setup.store.calls.load(Ordering::SeqCst), 0);
        assert_eq!(setup.metrics.snapshot().items_failed, 1);
        assert!(setup.item.path.exists());
        assert!(setup.item.destination(&setup.storage).exists());
    }
}
