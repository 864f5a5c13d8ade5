//! Core traits for srvset
//!
//! This module defines the abstract interfaces that implementations plug into.
//!
//! - [`Exchange`]: Send DNS queries and updates to the authoritative server
//! - [`StateStore`]: Persist reconciled record sets

pub mod exchange;
pub mod state_store;

pub use exchange::{Exchange, ExchangeFactory};
pub use state_store::{SetState, StateStore, StateStoreFactory};
