// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - The next `apply` after a restart reads the server first, so lost state
//   only costs one extra query per set
//
// ## When to Use
//
// - Testing environments
// - One-shot invocations of the daemon

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{SetState, StateStore, StateStoreFactory};

/// In-memory state store implementation
///
/// Entries live in a map behind an async `RwLock`; clones share the map.
///
/// # Example
///
/// ```rust,no_run
/// use srvset_core::state::MemoryStateStore;
/// use srvset_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///     assert!(store.get_set("_sip._tcp.example.org.").await?.is_none());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<BTreeMap<String, SetState>>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of sets in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Remove every entry
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_set(&self, id: &str) -> Result<Option<SetState>, Error> {
        Ok(self.inner.read().await.get(id).cloned())
    }

    async fn put_set(&self, state: &SetState) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .insert(state.id.clone(), state.clone());
        Ok(())
    }

    async fn delete_set(&self, id: &str) -> Result<(), Error> {
        self.inner.write().await.remove(id);
        Ok(())
    }

    async fn list_sets(&self) -> Result<Vec<String>, Error> {
        Ok(self.inner.read().await.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Factory for `{"type": "memory"}` state store configurations
#[derive(Debug, Default)]
pub struct MemoryStateStoreFactory;

#[async_trait]
impl StateStoreFactory for MemoryStateStoreFactory {
    async fn create(&self, _config: &serde_json::Value) -> Result<Box<dyn StateStore>, Error> {
        Ok(Box::new(MemoryStateStore::new()))
    }
}
