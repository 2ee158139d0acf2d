//! Pipeline metrics.
//!
//! Lock-free counters for the eviction pipeline, bumped by the runtime on
//! its entry points. Provider-level counters (sent/received) live in the
//! provider's own stats; these cover what the transport cannot see.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of pipeline counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Eviction intents handed to the collector.
    pub collected: u64,
    /// Direct evictions requested through the runtime, bypassing
    /// transaction scoping.
    pub direct_evictions: u64,
    /// Region-wide evictions (entity and query regions).
    pub region_evictions: u64,
    /// Dead-lettered events recovered by reprocessing.
    pub dead_letters_recovered: u64,
}

/// Atomic metrics collector shared across the runtime.
#[derive(Debug, Default)]
pub struct EvictionMetrics {
    collected: AtomicU64,
    direct_evictions: AtomicU64,
    region_evictions: AtomicU64,
    dead_letters_recovered: AtomicU64,
}

impl EvictionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_collected(&self) {
        self.collected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_direct_eviction(&self) {
        self.direct_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_region_eviction(&self) {
        self.region_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dead_letters_recovered(&self, count: u64) {
        self.dead_letters_recovered.fetch_add(count, Ordering::Relaxed);
    }

    /// Current counter values.
    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            collected: self.collected.load(Ordering::Relaxed),
            direct_evictions: self.direct_evictions.load(Ordering::Relaxed),
            region_evictions: self.region_evictions.load(Ordering::Relaxed),
            dead_letters_recovered: self.dead_letters_recovered.load(Ordering::Relaxed),
        }
    }
}
