//! Configuration structures for the eviction pipeline.
//!
//! All settings have sensible defaults so embedding applications only
//! override what they need. The infra crate loads these from environment
//! variables or a config file.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coordination mode for cache eviction.
///
/// `Hybrid` currently behaves exactly like `Distributed`; it is kept as a
/// distinct setting so deployments can opt in if the semantics diverge
/// later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Evict only on this node.
    Local,
    /// Evict locally and broadcast to the cluster.
    Distributed,
    /// Currently identical to `Distributed`.
    Hybrid,
    /// No eviction side effects at all.
    Disabled,
    /// Infer `Distributed` when a non-local provider is selected.
    #[default]
    Auto,
}

impl CacheMode {
    /// Whether this mode requires broadcasting to remote peers.
    pub fn is_distributed(&self) -> bool {
        matches!(self, Self::Distributed | Self::Hybrid)
    }
}

impl std::str::FromStr for CacheMode {
    type Err = crate::CacheSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "distributed" => Ok(Self::Distributed),
            "hybrid" => Ok(Self::Hybrid),
            "disabled" => Ok(Self::Disabled),
            "auto" => Ok(Self::Auto),
            other => Err(crate::CacheSyncError::Config(format!("Unknown cache mode: {other}"))),
        }
    }
}

/// Which cluster provider implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// No-op broadcast; nothing to distribute to.
    Local,
    /// Shared in-process broadcast bus.
    InProcess,
    /// Probe distributed providers in priority order, fall back to local.
    #[default]
    Auto,
}

impl ProviderKind {
    /// Whether this provider reaches beyond the local process node.
    pub fn is_distributed(&self) -> bool {
        matches!(self, Self::InProcess)
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = crate::CacheSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "in_process" | "in-process" => Ok(Self::InProcess),
            "auto" => Ok(Self::Auto),
            other => Err(crate::CacheSyncError::Config(format!("Unknown provider kind: {other}"))),
        }
    }
}

/// Retry and dead-letter behaviour around provider broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Maximum broadcast attempts before dead-lettering.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_backoff_ms: u64,
    /// Maximum entries held in the dead-letter queue.
    pub dead_letter_capacity: usize,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            backoff_multiplier: 2.0,
            max_backoff_ms: 30_000,
            dead_letter_capacity: 1_000,
        }
    }
}

impl RetrySettings {
    /// Calculate the backoff delay before the given retry attempt
    /// (0-based), capped at `max_backoff_ms`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let delay =
            self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = delay.min(self.max_backoff_ms as f64) as u64;
        std::time::Duration::from_millis(delay_ms)
    }
}

/// Batch optimizer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Queue size at which an open batch window flushes early.
    pub max_batch_size: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { max_batch_size: 100 }
    }
}

/// Top-level configuration for the eviction pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSyncConfig {
    /// Coordination mode.
    pub mode: CacheMode,
    /// Provider selection.
    pub provider: ProviderKind,
    /// This node's cluster identifier.
    pub node_id: String,
    /// Retry and dead-letter settings.
    pub retry: RetrySettings,
    /// Batch optimizer settings.
    pub batch: BatchSettings,
}

impl Default for CacheSyncConfig {
    fn default() -> Self {
        Self {
            mode: CacheMode::Auto,
            provider: ProviderKind::Auto,
            node_id: format!("node-{}", Uuid::new_v4()),
            retry: RetrySettings::default(),
            batch: BatchSettings::default(),
        }
    }
}
