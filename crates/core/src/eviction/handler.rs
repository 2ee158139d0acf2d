//! Post-commit eviction handler.
//!
//! Consumes a flushed batch and drives each record through the eviction
//! strategy. Failures on one record never abort the rest of the batch;
//! re-delivering a batch only causes redundant eviction work.

use std::sync::Arc;

use async_trait::async_trait;
use cachesync_domain::{PendingEviction, Result};
use tracing::{debug, info, warn};

use super::ports::EvictionBatchSink;
use super::registry::{EvictionTargetRegistry, RegionRegistry};
use super::strategy::EvictionStrategy;

/// Applies flushed eviction batches record by record.
pub struct PostCommitEvictionHandler {
    strategy: Arc<EvictionStrategy>,
    registry: Arc<EvictionTargetRegistry>,
    regions: Arc<RegionRegistry>,
}

impl PostCommitEvictionHandler {
    pub fn new(
        strategy: Arc<EvictionStrategy>,
        registry: Arc<EvictionTargetRegistry>,
        regions: Arc<RegionRegistry>,
    ) -> Self {
        Self { strategy, registry, regions }
    }

    /// The strategy this handler drives.
    pub fn strategy(&self) -> &Arc<EvictionStrategy> {
        &self.strategy
    }
}

#[async_trait]
impl EvictionBatchSink for PostCommitEvictionHandler {
    async fn publish(&self, batch: Vec<PendingEviction>) -> Result<()> {
        debug!(count = batch.len(), "Processing eviction batch");

        let mut processed = 0_u32;
        let mut skipped = 0_u32;

        for mut record in batch {
            let Some(target) = self.registry.resolve(&record.target_type) else {
                warn!(type_name = %record.target_type, "Skipping unresolvable eviction target");
                skipped = skipped.saturating_add(1);
                continue;
            };

            if record.region.is_none() {
                record.region = target.default_region.clone();
            }
            if let Some(region) = &record.region {
                self.regions.record(region);
            }

            // Strategy swallows cache/broadcast failures; a record only
            // counts as skipped when its target cannot be resolved.
            if let Err(err) = self.strategy.evict_record(&record).await {
                warn!(
                    type_name = %record.target_type,
                    error = %err,
                    "Eviction record failed"
                );
                skipped = skipped.saturating_add(1);
                continue;
            }

            if record.evict_query_cache && !target.query_regions.is_empty() {
                self.strategy.evict_query_regions(&target.query_regions).await;
            }

            processed = processed.saturating_add(1);
        }

        info!(processed, skipped, "Eviction batch completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cachesync_domain::{
        BatchSettings, CacheMode, EvictionEvent, EvictionOperation, ProviderKind, ProviderStats,
        RetrySettings,
    };
    use tokio::sync::Mutex as TokioMutex;

    use super::*;
    use crate::eviction::batcher::BatchOptimizer;
    use crate::eviction::ports::{CacheBackend, ClusterProvider, EvictionListener};
    use crate::eviction::registry::EvictionTarget;
    use crate::eviction::retry::RetryingBroadcaster;

    #[derive(Default)]
    struct RecordingBackend {
        evictions: TokioMutex<Vec<(String, Option<String>)>>,
        query_evictions: TokioMutex<Vec<String>>,
    }

    #[async_trait]
    impl CacheBackend for RecordingBackend {
        async fn evict(&self, type_name: &str, id: &str) -> Result<()> {
            self.evictions.lock().await.push((type_name.to_string(), Some(id.to_string())));
            Ok(())
        }

        async fn evict_all(&self, type_name: &str) -> Result<()> {
            self.evictions.lock().await.push((type_name.to_string(), None));
            Ok(())
        }

        async fn evict_region(&self, _region: &str) -> Result<()> {
            Ok(())
        }

        async fn evict_query_region(&self, region: &str) -> Result<()> {
            self.query_evictions.lock().await.push(region.to_string());
            Ok(())
        }

        async fn clear(&self) -> Result<()> {
            Ok(())
        }

        async fn contains(&self, _type_name: &str, _id: &str) -> Result<bool> {
            Ok(false)
        }
    }

    struct NullProvider;

    #[async_trait]
    impl ClusterProvider for NullProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Local
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn initialize(&self) -> Result<()> {
            Ok(())
        }

        async fn shutdown(&self) -> Result<()> {
            Ok(())
        }

        async fn broadcast(&self, _event: &EvictionEvent) -> Result<()> {
            Ok(())
        }

        async fn broadcast_many(&self, _events: &[EvictionEvent]) -> Result<()> {
            Ok(())
        }

        fn subscribe(&self, _listener: Arc<dyn EvictionListener>) {}

        fn stats(&self) -> ProviderStats {
            ProviderStats {
                node_id: "null".to_string(),
                connected: true,
                evictions_sent: 0,
                evictions_received: 0,
            }
        }
    }

    struct Fixture {
        backend: Arc<RecordingBackend>,
        regions: Arc<RegionRegistry>,
        handler: PostCommitEvictionHandler,
    }

    fn fixture(backend: RecordingBackend) -> Fixture {
        let backend = Arc::new(backend);
        let registry = Arc::new(EvictionTargetRegistry::new());
        registry.register(
            EvictionTarget::new("Order")
                .with_region("orders")
                .with_query_region("order-queries"),
        );
        registry.register(EvictionTarget::new("Product"));
        let regions = Arc::new(RegionRegistry::new());
        let broadcaster = Arc::new(RetryingBroadcaster::new(
            Arc::new(NullProvider),
            RetrySettings::default(),
        ));
        let outbound = Arc::new(BatchOptimizer::new(broadcaster, BatchSettings::default()));
        let strategy = Arc::new(EvictionStrategy::new(
            CacheMode::Local,
            ProviderKind::Local,
            "node-a",
            backend.clone() as Arc<dyn CacheBackend>,
            registry.clone(),
            regions.clone(),
            outbound,
            RetrySettings::default(),
        ));
        let handler = PostCommitEvictionHandler::new(strategy, registry, regions.clone());
        Fixture { backend, regions, handler }
    }

    #[tokio::test]
    async fn batch_evicts_each_record() {
        let fx = fixture(RecordingBackend::default());

        fx.handler
            .publish(vec![
                PendingEviction::new("Order", "42", EvictionOperation::Update)
                    .without_query_cache(),
                PendingEviction::new("Order", "43", EvictionOperation::Delete)
                    .without_query_cache(),
            ])
            .await
            .unwrap();

        let evictions = fx.backend.evictions.lock().await;
        assert_eq!(
            evictions.as_slice(),
            &[
                ("Order".to_string(), Some("42".to_string())),
                ("Order".to_string(), Some("43".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn bulk_record_evicts_whole_type() {
        let fx = fixture(RecordingBackend::default());

        fx.handler
            .publish(vec![PendingEviction::bulk("Product", EvictionOperation::BulkUpdate)])
            .await
            .unwrap();

        let evictions = fx.backend.evictions.lock().await;
        assert_eq!(evictions.as_slice(), &[("Product".to_string(), None)]);
    }

    #[tokio::test]
    async fn unresolvable_target_is_skipped_without_aborting() {
        let fx = fixture(RecordingBackend::default());

        fx.handler
            .publish(vec![
                PendingEviction::new("Ghost", "1", EvictionOperation::Update),
                PendingEviction::new("Product", "7", EvictionOperation::Update),
            ])
            .await
            .unwrap();

        let evictions = fx.backend.evictions.lock().await;
        assert_eq!(evictions.as_slice(), &[("Product".to_string(), Some("7".to_string()))]);
    }

    #[tokio::test]
    async fn default_region_is_recorded() {
        let fx = fixture(RecordingBackend::default());

        fx.handler
            .publish(vec![
                PendingEviction::new("Order", "42", EvictionOperation::Update)
                    .without_query_cache(),
            ])
            .await
            .unwrap();

        assert!(fx.regions.contains("orders"));
    }

    #[tokio::test]
    async fn query_regions_cleared_when_flag_set() {
        let fx = fixture(RecordingBackend::default());

        fx.handler
            .publish(vec![PendingEviction::new("Order", "42", EvictionOperation::Update)])
            .await
            .unwrap();

        let cleared = fx.backend.query_evictions.lock().await;
        assert_eq!(cleared.as_slice(), &["order-queries".to_string()]);
    }

    #[tokio::test]
    async fn query_regions_untouched_when_flag_cleared() {
        let fx = fixture(RecordingBackend::default());

        fx.handler
            .publish(vec![
                PendingEviction::new("Order", "42", EvictionOperation::Update)
                    .without_query_cache(),
            ])
            .await
            .unwrap();

        assert!(fx.backend.query_evictions.lock().await.is_empty());
    }

    #[tokio::test]
    async fn redelivery_is_idempotent() {
        let fx = fixture(RecordingBackend::default());
        let batch = vec![
            PendingEviction::new("Order", "42", EvictionOperation::Update).without_query_cache(),
        ];

        fx.handler.publish(batch.clone()).await.unwrap();
        fx.handler.publish(batch).await.unwrap();

        // Redundant eviction work, never incorrect state.
        assert_eq!(fx.backend.evictions.lock().await.len(), 2);
    }
}
