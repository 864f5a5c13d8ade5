// # State Store Implementations
//
// Built-in implementations of the StateStore trait.

pub mod file;
pub mod memory;

pub use file::{FileStateStore, FileStateStoreFactory};
pub use memory::{MemoryStateStore, MemoryStateStoreFactory};

use crate::registry::Registry;

/// Register the `memory` and `file` state store factories
pub fn register_builtin(registry: &Registry) -> crate::Result<()> {
    registry.register_state_store("memory", Box::new(MemoryStateStoreFactory))?;
    registry.register_state_store("file", Box::new(FileStateStoreFactory))?;
    Ok(())
}
