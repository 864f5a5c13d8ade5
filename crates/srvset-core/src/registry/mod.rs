//! Plugin-based factory registry
//!
//! The registry maps transport names and state store types to factories, so
//! the daemon never hardcodes which implementations exist.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use srvset_core::registry::Registry;
//! use srvset_core::config::ResolverConfig;
//!
//! let registry = Registry::new();
//! srvset_core::state::register_builtin(&registry)?;
//! srvset_transport_dns::register(&registry)?;
//!
//! let exchange = registry.create_exchange(&ResolverConfig::new("192.0.2.53"))?;
//! ```
//!
//! ## Registration
//!
//! Implementations register themselves during initialization:
//!
//! ```rust,ignore
//! // In the srvset-transport-dns crate
//! pub fn register(registry: &Registry) -> srvset_core::Result<()> {
//!     registry.register_exchange("udp", Box::new(DnsExchangeFactory))?;
//!     registry.register_exchange("tcp", Box::new(DnsExchangeFactory))
//! }
//! ```

use crate::config::{ResolverConfig, StateStoreConfig};
use crate::error::{Error, Result};
use crate::traits::{Exchange, ExchangeFactory, StateStore, StateStoreFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Factory registry for exchanges and state stores
///
/// Interior mutability through `RwLock` allows concurrent reads and
/// registration through a shared reference.
#[derive(Default)]
pub struct Registry {
    /// Exchange factories keyed by transport name
    exchanges: RwLock<HashMap<String, Arc<dyn ExchangeFactory>>>,

    /// State store factories keyed by store type
    state_stores: RwLock<HashMap<String, Arc<dyn StateStoreFactory>>>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| Error::Other("registry lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| Error::Other("registry lock poisoned".to_string()))
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an exchange factory for a transport name (e.g. "udp", "tcp")
    pub fn register_exchange(
        &self,
        name: impl Into<String>,
        factory: Box<dyn ExchangeFactory>,
    ) -> Result<()> {
        write(&self.exchanges)?.insert(name.into(), Arc::from(factory));
        Ok(())
    }

    /// Register a state store factory for a store type (e.g. "file", "memory")
    pub fn register_state_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn StateStoreFactory>,
    ) -> Result<()> {
        write(&self.state_stores)?.insert(name.into(), Arc::from(factory));
        Ok(())
    }

    /// Create an exchange for the transport named in `config`
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: If the transport is not registered
    pub fn create_exchange(&self, config: &ResolverConfig) -> Result<Arc<dyn Exchange>> {
        let transport = config.transport.as_str();
        let factory = read(&self.exchanges)?
            .get(transport)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown transport: {}", transport)))?;

        factory.create(config)
    }

    /// Create a state store from configuration
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: If the store type is not registered
    pub async fn create_state_store(&self, config: &StateStoreConfig) -> Result<Box<dyn StateStore>> {
        let store_type = config.type_name();

        // The guard must be gone before awaiting the factory
        let factory = read(&self.state_stores)?
            .get(store_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown state store type: {}", store_type)))?;

        let config_json = match config {
            StateStoreConfig::Custom { config, .. } => config.clone(),
            other => serde_json::to_value(other)?,
        };

        factory.create(&config_json).await
    }

    /// List registered transport names
    pub fn list_exchanges(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = read(&self.exchanges)?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// List registered state store types
    pub fn list_state_stores(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = read(&self.state_stores)?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Check if a transport is registered
    pub fn has_exchange(&self, name: &str) -> bool {
        read(&self.exchanges).is_ok_and(|map| map.contains_key(name))
    }

    /// Check if a state store type is registered
    pub fn has_state_store(&self, name: &str) -> bool {
        read(&self.state_stores).is_ok_and(|map| map.contains_key(name))
    }
}
