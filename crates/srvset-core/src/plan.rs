//! Diff planner
//!
//! Computes the removals and additions that move an RRset from its observed
//! state to a desired state. DNS dynamic update has no in-place modify, so a
//! changed record is always one removal plus one addition; a record whose
//! identity is unchanged is left alone even when its TTL differs.

use crate::record::{RecordSet, SrvRecord};

/// Removals and additions for one reconciliation cycle
///
/// Both lists are sorted by record identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePlan {
    /// Records present on the server but not desired
    pub to_remove: Vec<SrvRecord>,
    /// Records desired but not present on the server
    pub to_add: Vec<SrvRecord>,
}

impl UpdatePlan {
    /// Whether the plan changes nothing
    pub fn is_noop(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

/// Plan the transition from `observed` to `desired`
pub fn plan(observed: &RecordSet, desired: &RecordSet) -> UpdatePlan {
    UpdatePlan {
        to_remove: observed.difference(desired).to_vec(),
        to_add: desired.difference(observed).to_vec(),
    }
}
