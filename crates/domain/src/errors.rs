//! Error types used throughout the eviction pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for CacheSync
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CacheSyncError {
    /// The collector could not hand a completed batch to the handler.
    #[error("Publish error: {0}")]
    Publish(String),

    /// The active provider could not reach remote peers.
    #[error("Broadcast error: {0}")]
    Broadcast(String),

    /// An event or record names a type that is not registered locally.
    #[error("Unknown eviction target: {0}")]
    Resolution(String),

    /// Provider lifecycle or availability failure.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The underlying cache rejected an operation.
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheSyncError {
    /// Whether the failure is transient and worth retrying.
    ///
    /// Resolution and configuration failures are deterministic; retrying
    /// them can never succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Publish(_) | Self::Broadcast(_) | Self::Provider(_) | Self::Cache(_)
        )
    }
}

/// Result type alias for CacheSync operations
pub type Result<T> = std::result::Result<T, CacheSyncError>;
