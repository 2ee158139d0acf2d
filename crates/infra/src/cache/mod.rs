//! Moka-backed cache adapter.
//!
//! Implements the core `CacheBackend` port on top of `moka::future::Cache`.
//! Entries are keyed by `(type name, id)`; a separate query cache holds
//! derived results keyed by `(region, query key)`. Type-wide and
//! region-wide eviction use moka's invalidation closures, which apply
//! lazily on the read path, so `contains` is answered through `get`.

use std::sync::Arc;

use async_trait::async_trait;
use cachesync_core::CacheBackend;
use cachesync_domain::{CacheSyncError, Result};
use dashmap::DashMap;
use moka::future::Cache;
use tracing::debug;

type EntryKey = (String, String);

/// Cache adapter storing values of type `V` under `(type, id)` keys.
pub struct MokaCacheBackend<V>
where
    V: Clone + Send + Sync + 'static,
{
    entries: Cache<EntryKey, V>,
    query_entries: Cache<EntryKey, V>,
    /// Region assignment per type, used for region-wide eviction.
    type_regions: Arc<DashMap<String, String>>,
}

impl<V> MokaCacheBackend<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a backend bounded to `max_capacity` entries per cache.
    pub fn new(max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_capacity)
                .support_invalidation_closures()
                .build(),
            query_entries: Cache::builder()
                .max_capacity(max_capacity)
                .support_invalidation_closures()
                .build(),
            type_regions: Arc::new(DashMap::new()),
        }
    }

    /// Assign a type to a named region.
    pub fn assign_region(&self, type_name: impl Into<String>, region: impl Into<String>) {
        self.type_regions.insert(type_name.into(), region.into());
    }

    /// Store an entry.
    pub async fn put(&self, type_name: &str, id: &str, value: V) {
        self.entries.insert((type_name.to_string(), id.to_string()), value).await;
    }

    /// Fetch an entry.
    pub async fn get(&self, type_name: &str, id: &str) -> Option<V> {
        self.entries.get(&(type_name.to_string(), id.to_string())).await
    }

    /// Store a derived/query result under a region.
    pub async fn put_query(&self, region: &str, key: &str, value: V) {
        self.query_entries.insert((region.to_string(), key.to_string()), value).await;
    }

    /// Fetch a derived/query result.
    pub async fn get_query(&self, region: &str, key: &str) -> Option<V> {
        self.query_entries.get(&(region.to_string(), key.to_string())).await
    }
}

#[async_trait]
impl<V> CacheBackend for MokaCacheBackend<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn evict(&self, type_name: &str, id: &str) -> Result<()> {
        self.entries.invalidate(&(type_name.to_string(), id.to_string())).await;
        Ok(())
    }

    async fn evict_all(&self, type_name: &str) -> Result<()> {
        let type_name = type_name.to_string();
        debug!(type_name = %type_name, "Evicting all entries of type");
        self.entries
            .invalidate_entries_if(move |key, _| key.0 == type_name)
            .map_err(|e| CacheSyncError::Cache(e.to_string()))?;
        Ok(())
    }

    async fn evict_region(&self, region: &str) -> Result<()> {
        let types: Vec<String> = self
            .type_regions
            .iter()
            .filter(|entry| entry.value() == region)
            .map(|entry| entry.key().clone())
            .collect();
        debug!(region = %region, types = types.len(), "Evicting region");
        self.entries
            .invalidate_entries_if(move |key, _| types.contains(&key.0))
            .map_err(|e| CacheSyncError::Cache(e.to_string()))?;
        Ok(())
    }

    async fn evict_query_region(&self, region: &str) -> Result<()> {
        let region = region.to_string();
        self.query_entries
            .invalidate_entries_if(move |key, _| key.0 == region)
            .map_err(|e| CacheSyncError::Cache(e.to_string()))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        debug!("Clearing all cached entries");
        self.entries.invalidate_all();
        self.query_entries.invalidate_all();
        Ok(())
    }

    async fn contains(&self, type_name: &str, id: &str) -> Result<bool> {
        // Invalidation closures apply lazily; `get` gives the settled answer.
        Ok(self.get(type_name, id).await.is_some())
    }
}
