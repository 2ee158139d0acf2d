//! Eviction data types shared across the pipeline.
//!
//! `PendingEviction` is the in-process record produced by a mutation
//! trigger; `EvictionEvent` is the wire form exchanged between cluster
//! nodes. Both carry the target type as a plain string so records survive
//! serialization across process boundaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of data mutation that triggered an eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvictionOperation {
    Insert,
    Update,
    Delete,
    BulkUpdate,
    BulkDelete,
}

impl EvictionOperation {
    /// Bulk operations target every entry of a type rather than one id.
    pub fn is_bulk(&self) -> bool {
        matches!(self, Self::BulkUpdate | Self::BulkDelete)
    }
}

/// Identifier for an active transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Generate a fresh transaction id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One invalidation intent, scoped to the lifetime of a transaction.
///
/// Invariant: `target_id` is `None` if and only if the eviction is
/// type-wide (bulk). Records are never persisted; they are discarded once
/// processed or once their owning transaction rolls back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEviction {
    /// String identifier of the cached type.
    pub target_type: String,
    /// Specific entry id, or `None` for "all entries of this type".
    pub target_id: Option<String>,
    /// Optional cache partition name.
    pub region: Option<String>,
    /// Mutation kind that produced this record.
    pub operation: EvictionOperation,
    /// Whether derived/query-level caches for this type should also clear.
    pub evict_query_cache: bool,
    /// Creation time of the record.
    pub timestamp: DateTime<Utc>,
}

impl PendingEviction {
    /// Create a single-entry eviction record.
    pub fn new(
        target_type: impl Into<String>,
        target_id: impl Into<String>,
        operation: EvictionOperation,
    ) -> Self {
        Self {
            target_type: target_type.into(),
            target_id: Some(target_id.into()),
            region: None,
            operation,
            evict_query_cache: true,
            timestamp: Utc::now(),
        }
    }

    /// Create a type-wide (bulk) eviction record.
    pub fn bulk(target_type: impl Into<String>, operation: EvictionOperation) -> Self {
        Self {
            target_type: target_type.into(),
            target_id: None,
            region: None,
            operation,
            evict_query_cache: true,
            timestamp: Utc::now(),
        }
    }

    /// Attach a region name.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Opt out of query-cache eviction for this record.
    pub fn without_query_cache(mut self) -> Self {
        self.evict_query_cache = false;
        self
    }

    /// True when the record intends type-wide eviction.
    pub fn is_bulk(&self) -> bool {
        self.target_id.is_none() || self.operation.is_bulk()
    }
}

/// Wire form of an eviction broadcast between cluster nodes.
///
/// A receiving node must ignore any event whose `origin_node` equals its
/// own node id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvictionEvent {
    /// String identifier of the cached type.
    pub type_name: String,
    /// Specific entry id, or `None` for a type-wide eviction.
    pub target_id: Option<String>,
    /// Optional cache partition name.
    pub region: Option<String>,
    /// Mutation kind that produced the eviction.
    pub operation: EvictionOperation,
    /// Cluster member that initiated the eviction.
    pub origin_node: String,
    /// Unix epoch milliseconds at event creation.
    pub timestamp: i64,
}

impl EvictionEvent {
    /// Build an event from a pending record, stamped with the origin node.
    pub fn from_pending(record: &PendingEviction, origin_node: impl Into<String>) -> Self {
        Self {
            type_name: record.target_type.clone(),
            target_id: record.target_id.clone(),
            region: record.region.clone(),
            operation: record.operation,
            origin_node: origin_node.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// True when the event intends type-wide eviction.
    pub fn is_bulk(&self) -> bool {
        self.target_id.is_none() || self.operation.is_bulk()
    }
}

/// Read-only snapshot of a provider's counters and connectivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStats {
    /// This node's identifier.
    pub node_id: String,
    /// Whether the provider currently considers itself connected.
    pub connected: bool,
    /// Evictions broadcast to the cluster.
    pub evictions_sent: u64,
    /// Evictions received from other nodes.
    pub evictions_received: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_record_is_not_bulk() {
        let record = PendingEviction::new("Order", "42", EvictionOperation::Update);
        assert!(!record.is_bulk());
        assert_eq!(record.target_id.as_deref(), Some("42"));
        assert!(record.evict_query_cache);
    }

    #[test]
    fn absent_id_means_bulk() {
        let record = PendingEviction::bulk("Order", EvictionOperation::BulkDelete);
        assert!(record.is_bulk());
        assert!(record.target_id.is_none());
    }

    #[test]
    fn bulk_operation_implies_bulk_even_with_id() {
        let mut record = PendingEviction::new("Order", "42", EvictionOperation::BulkUpdate);
        record.operation = EvictionOperation::BulkUpdate;
        assert!(record.is_bulk());
    }

    #[test]
    fn event_round_trips_through_json() {
        let record = PendingEviction::new("Product", "7", EvictionOperation::Delete)
            .with_region("catalog");
        let event = EvictionEvent::from_pending(&record, "node-a");

        let json = serde_json::to_string(&event).unwrap();
        let back: EvictionEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(back, event);
        assert_eq!(back.origin_node, "node-a");
        assert_eq!(back.region.as_deref(), Some("catalog"));
    }

    #[test]
    fn operation_serializes_screaming_snake() {
        let json = serde_json::to_string(&EvictionOperation::BulkUpdate).unwrap();
        assert_eq!(json, "\"BULK_UPDATE\"");
    }

    #[test]
    fn transaction_ids_are_unique() {
        assert_ne!(TransactionId::new(), TransactionId::new());
    }
}
