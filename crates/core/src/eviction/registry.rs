//! Typed eviction-target registry and the active-region registry.
//!
//! Targets are registered once at startup, mapping the logical type name
//! carried on the wire to a descriptor with the cache regions it touches.
//! This replaces reflective type resolution: an unregistered name is a
//! resolution failure the caller logs and skips.

use dashmap::DashMap;

/// Descriptor for one cached type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionTarget {
    /// Logical type name, as carried in eviction records and events.
    pub type_name: String,
    /// Region this type's entries live in, if partitioned.
    pub default_region: Option<String>,
    /// Derived/query-level regions cleared when `evict_query_cache` is set.
    pub query_regions: Vec<String>,
}

impl EvictionTarget {
    /// Descriptor with no region partitioning.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), default_region: None, query_regions: Vec::new() }
    }

    /// Set the default region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = Some(region.into());
        self
    }

    /// Add a query region.
    pub fn with_query_region(mut self, region: impl Into<String>) -> Self {
        self.query_regions.push(region.into());
        self
    }
}

/// Startup-time lookup table from type name to descriptor.
#[derive(Debug, Default)]
pub struct EvictionTargetRegistry {
    targets: DashMap<String, EvictionTarget>,
}

impl EvictionTargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target, replacing any previous descriptor for the name.
    pub fn register(&self, target: EvictionTarget) {
        self.targets.insert(target.type_name.clone(), target);
    }

    /// Resolve a type name to its descriptor.
    pub fn resolve(&self, type_name: &str) -> Option<EvictionTarget> {
        self.targets.get(type_name).map(|entry| entry.value().clone())
    }

    /// Number of registered targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Append-only set of region names seen by the pipeline.
///
/// Read by administrative tooling; never shrinks during normal operation.
#[derive(Debug, Default)]
pub struct RegionRegistry {
    regions: DashMap<String, ()>,
}

impl RegionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a region as active. Idempotent.
    pub fn record(&self, region: &str) {
        self.regions.entry(region.to_string()).or_insert(());
    }

    /// Whether a region has ever been recorded.
    pub fn contains(&self, region: &str) -> bool {
        self.regions.contains_key(region)
    }

    /// Snapshot of all active region names.
    pub fn active_regions(&self) -> Vec<String> {
        self.regions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of distinct regions recorded.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
