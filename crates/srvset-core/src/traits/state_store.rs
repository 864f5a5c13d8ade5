// # State Store Trait
//
// Defines the interface for the persisted side of a record set.
//
// ## Purpose
//
// After every successful cycle the engine records what the server
// authoritatively holds, keyed by the set's owner FQDN:
// - The reconciled records
// - The canonical (minimum) TTL
// - The reconciliation timestamp
//
// A failed update removes the entry so the next cycle starts clean.
//
// ## Implementations
//
// - In-memory: `MemoryStateStore`
// - File-based: `FileStateStore` (JSON)

use crate::record::{SetName, SrvRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Persisted state of one record set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetState {
    /// Opaque identifier: the owner FQDN
    pub id: String,
    /// Service/proto/zone of the set
    pub name: SetName,
    /// Canonical TTL (minimum across the records)
    pub ttl: u32,
    /// Records as last reported by the server, sorted by identity
    pub records: Vec<SrvRecord>,
    /// Time of the last successful cycle
    pub last_reconciled: chrono::DateTime<chrono::Utc>,
}

impl SetState {
    /// Create a state entry stamped with the current time
    pub(crate) fn new(name: SetName, ttl: u32, records: Vec<SrvRecord>) -> Self {
        Self {
            id: name.owner_name(),
            name,
            ttl,
            records,
            last_reconciled: chrono::Utc::now(),
        }
    }
}

/// Trait for state store implementations
///
/// All methods must be safe to call concurrently from multiple tasks.
/// Stores hold data only; they never decide whether a set needs an update.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the state for a set
    ///
    /// - `Ok(Some(SetState))`: The stored state
    /// - `Ok(None)`: The set is unknown
    async fn get_set(&self, id: &str) -> Result<Option<SetState>, crate::Error>;

    /// Create or replace the state for a set (keyed by `state.id`)
    async fn put_set(&self, state: &SetState) -> Result<(), crate::Error>;

    /// Delete the state for a set; deleting an unknown set is not an error
    async fn delete_set(&self, id: &str) -> Result<(), crate::Error>;

    /// List all known set ids
    async fn list_sets(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing state stores from configuration
#[async_trait]
pub trait StateStoreFactory: Send + Sync {
    /// Create a StateStore instance from its serialized configuration
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn StateStore>, crate::Error>;
}
