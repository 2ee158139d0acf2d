//! No-op provider for single-node deployments.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cachesync_core::{ClusterProvider, EvictionListener};
use cachesync_domain::{EvictionEvent, ProviderKind, ProviderStats, Result};
use tracing::debug;

/// Provider that accepts broadcasts and discards them.
///
/// Always available, so it is the terminal fallback during provider
/// selection. Sent counters still advance, which keeps stats meaningful
/// when a deployment silently runs without a cluster transport.
pub struct LocalProvider {
    node_id: String,
    evictions_sent: AtomicU64,
}

impl LocalProvider {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self { node_id: node_id.into(), evictions_sent: AtomicU64::new(0) }
    }
}

#[async_trait]
impl ClusterProvider for LocalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn initialize(&self) -> Result<()> {
        debug!(node_id = %self.node_id, "Local provider initialized (no transport)");
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn broadcast(&self, _event: &EvictionEvent) -> Result<()> {
        self.evictions_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn broadcast_many(&self, events: &[EvictionEvent]) -> Result<()> {
        self.evictions_sent.fetch_add(events.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn subscribe(&self, _listener: Arc<dyn EvictionListener>) {}

    fn stats(&self) -> ProviderStats {
        ProviderStats {
            node_id: self.node_id.clone(),
            connected: false,
            evictions_sent: self.evictions_sent.load(Ordering::Relaxed),
            evictions_received: 0,
        }
    }
}
