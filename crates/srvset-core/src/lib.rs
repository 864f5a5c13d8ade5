// # srvset-core
//
// Core library for reconciling DNS SRV record sets through RFC 2136 dynamic
// updates.
//
// ## Architecture Overview
//
// - **Record codec**: text and wire conversion of SRV records
// - **RecordSet**: identity-bucketed set with exact-field membership
// - **plan**: minimal remove/add lists between observed and desired sets
// - **UpdateMessage**: one RFC 2136 transaction per plan
// - **Reconciler**: Read → Diff → Update → Verify cycle over an `Exchange`
// - **SrvSetEngine**: lifecycle operations and persisted state on top
// - **Registry**: factories for exchanges and state stores
//
// ## Design Principles
//
// 1. Core logic never touches a socket; transports implement `Exchange`
// 2. A cycle never retries; retry is caller policy
// 3. Removals precede insertions within a single update message
// 4. Library-first: the daemon is a thin wrapper

pub mod config;
pub mod engine;
pub mod error;
pub mod message;
pub mod plan;
pub mod reconciler;
pub mod record;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{RecordSetConfig, ResolverConfig, SrvSetConfig, StateStoreConfig, VerifyPolicy};
pub use engine::{ApplySummary, EngineEvent, SrvSetEngine};
pub use error::{Error, Result};
pub use message::UpdateMessage;
pub use plan::{UpdatePlan, plan};
pub use reconciler::{LookupResult, Observation, ReconcileOutcome, Reconciler};
pub use record::{RecordIdentity, RecordSet, SetName, SrvRecord};
pub use registry::Registry;
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{Exchange, SetState, StateStore};
