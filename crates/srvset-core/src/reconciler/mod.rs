//! Record set reconciler
//!
//! The reconciler runs one cycle per call against a single owner name:
//!
//! ```text
//! Idle ─► Reading ─► Diffing ─► Updating ─► Verifying ─► Idle
//!            │                      │           │
//!            └──────────────────────┴───────────┴──► Failed
//! ```
//!
//! - **Reading** queries the authoritative server and decodes the answer
//!   section into the observed [`RecordSet`].
//! - **Diffing** runs the [`plan`](crate::plan::plan) planner; it cannot fail.
//! - **Updating** submits one [`UpdateMessage`]; skipped when the plan is empty.
//! - **Verifying** re-reads the server and publishes what it reports.
//!
//! A cycle never retries and never keeps state between calls; every
//! [`RecordSet`], plan and message is local to the cycle that built it.

use crate::config::VerifyPolicy;
use crate::error::{Error, Result};
use crate::message::{self, UpdateMessage};
use crate::plan::plan;
use crate::record::codec::{self, Answer};
use crate::record::{RecordSet, SetName, SrvRecord};
use crate::traits::Exchange;
use hickory_proto::op::ResponseCode;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Phase of a reconciliation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePhase {
    /// Not running
    Idle,
    /// Querying the current RRset
    Reading,
    /// Computing the update plan
    Diffing,
    /// Submitting the update message
    Updating,
    /// Re-reading the RRset after the update
    Verifying,
    /// Terminal failure, surfaced to the caller
    Failed,
}

impl fmt::Display for ReconcilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReconcilePhase::Idle => "idle",
            ReconcilePhase::Reading => "reading",
            ReconcilePhase::Diffing => "diffing",
            ReconcilePhase::Updating => "updating",
            ReconcilePhase::Verifying => "verifying",
            ReconcilePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// RRset as reported by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Owner name that was queried
    pub owner: String,
    /// Decoded SRV records
    pub records: RecordSet,
    /// Minimum TTL across the answer records, `None` when empty
    pub ttl: Option<u32>,
}

impl Observation {
    fn empty(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            records: RecordSet::new(),
            ttl: None,
        }
    }

    /// Whether the server holds no records for the owner
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Result of a completed cycle
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// Set that was reconciled
    pub name: SetName,
    /// State read before diffing
    pub observed: Observation,
    /// Update that was submitted, `None` when the plan was empty
    pub message: Option<UpdateMessage>,
    /// State read back after the update
    pub current: Observation,
    /// Phases the cycle went through, in order
    pub phases: Vec<ReconcilePhase>,
}

impl ReconcileOutcome {
    /// Opaque identifier of the set (its owner FQDN)
    pub fn id(&self) -> String {
        self.name.owner_name()
    }

    /// Whether an update message was submitted
    pub fn updated(&self) -> bool {
        self.message.is_some()
    }
}

/// Result of a non-authoritative SRV lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult {
    /// Canonical name the records were found under
    pub name: String,
    /// Records ordered by priority, then by descending weight
    pub records: Vec<SrvRecord>,
}

/// Phase bookkeeping for one cycle
struct Cycle {
    owner: String,
    phases: Vec<ReconcilePhase>,
}

impl Cycle {
    fn start(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            phases: Vec::new(),
        }
    }

    fn enter(&mut self, phase: ReconcilePhase) {
        debug!("{}: entering {}", self.owner, phase);
        self.phases.push(phase);
    }

    fn fail(&mut self, err: Error) -> Error {
        let from = self.phases.last().copied().unwrap_or(ReconcilePhase::Idle);
        warn!("{}: cycle failed while {}: {}", self.owner, from, err);
        self.phases.push(ReconcilePhase::Failed);
        err
    }
}

/// Runs reconciliation cycles through an [`Exchange`]
#[derive(Clone)]
pub struct Reconciler {
    exchange: Arc<dyn Exchange>,
    verify: VerifyPolicy,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("transport", &self.exchange.transport_name())
            .field("verify", &self.verify)
            .finish()
    }
}

impl Reconciler {
    /// Create a reconciler using the trusting verify policy
    pub fn new(exchange: Arc<dyn Exchange>) -> Self {
        Self {
            exchange,
            verify: VerifyPolicy::Trust,
        }
    }

    /// Set the post-update verify policy
    pub fn with_verify_policy(mut self, verify: VerifyPolicy) -> Self {
        self.verify = verify;
        self
    }

    /// Read the current RRset of `name`
    ///
    /// An empty answer is a valid, empty observation.
    pub async fn read(&self, name: &SetName) -> Result<Observation> {
        let owner = name.owner_name();
        let mut cycle = Cycle::start(&owner);

        cycle.enter(ReconcilePhase::Reading);
        let observation = self.observe(&owner).await.map_err(|e| cycle.fail(e))?;
        cycle.enter(ReconcilePhase::Idle);

        Ok(observation)
    }

    /// Recover a set from its owner FQDN and read it
    ///
    /// The observation becomes the caller's baseline; nothing is written.
    pub async fn import(&self, id: &str) -> Result<(SetName, Observation)> {
        let name = SetName::from_owner(id)?;
        let observation = self.read(&name).await?;
        Ok((name, observation))
    }

    /// Move the RRset of `name` to `desired`
    ///
    /// Inserted records get `ttl`. Returns what the server holds afterwards.
    pub async fn reconcile(
        &self,
        name: &SetName,
        desired: &RecordSet,
        ttl: u32,
    ) -> Result<ReconcileOutcome> {
        let owner = name.owner_name();

        // Encoding problems must surface before anything goes on the wire
        codec::parse_name(&owner)?;
        codec::parse_name(&name.zone)?;
        for record in desired.iter() {
            codec::parse_name(&record.target).map_err(|_| {
                Error::malformed(format!("Invalid SRV target '{}' for {owner}", record.target))
            })?;
        }

        let mut cycle = Cycle::start(&owner);

        cycle.enter(ReconcilePhase::Reading);
        let observed = self.observe(&owner).await.map_err(|e| cycle.fail(e))?;

        cycle.enter(ReconcilePhase::Diffing);
        let plan = plan(&observed.records, desired);

        let message = if plan.is_noop() {
            debug!("{}: already matches desired state, skipping update", owner);
            None
        } else {
            cycle.enter(ReconcilePhase::Updating);
            let message = UpdateMessage::build(&name.zone, &owner, ttl, plan);
            self.submit(&message).await.map_err(|e| cycle.fail(e))?;
            info!(
                "{}: removed {} and added {} record(s)",
                owner,
                message.removals().len(),
                message.insertions().len()
            );
            Some(message)
        };

        cycle.enter(ReconcilePhase::Verifying);
        let current = self.observe(&owner).await.map_err(|e| cycle.fail(e))?;

        if self.verify == VerifyPolicy::Strict && !current.records.equals(desired) {
            return Err(cycle.fail(Error::Diverged {
                owner,
                expected: desired.len(),
                found: current.records.len(),
            }));
        }

        cycle.enter(ReconcilePhase::Idle);

        Ok(ReconcileOutcome {
            name: name.clone(),
            observed,
            message,
            current,
            phases: cycle.phases,
        })
    }

    /// Remove every record of `name`
    ///
    /// Equivalent to reconciling against an empty desired set.
    pub async fn delete(&self, name: &SetName) -> Result<ReconcileOutcome> {
        self.reconcile(name, &RecordSet::new(), 0).await
    }

    /// Resolve `_service._proto.domain` through the exchange with recursion desired
    ///
    /// Any non-success response code, including NXDOMAIN, and an answer without
    /// SRV records are reported as [`Error::QueryFailed`].
    pub async fn lookup(&self, service: &str, proto: &str, domain: &str) -> Result<LookupResult> {
        let service = service.strip_prefix('_').unwrap_or(service);
        let proto = proto.strip_prefix('_').unwrap_or(proto);
        let domain = if domain.ends_with('.') {
            domain.to_string()
        } else {
            format!("{domain}.")
        };
        let owner = format!("_{service}._{proto}.{domain}");

        let query = message::srv_query(&owner, true)?;
        let response = self
            .exchange
            .exchange(query, false)
            .await
            .map_err(|e| Error::query_failed(&owner, e))?;

        if response.response_code() != ResponseCode::NoError {
            return Err(Error::query_failed(
                &owner,
                format!("server answered {}", response.response_code()),
            ));
        }

        let mut name = owner.clone();
        let mut records = Vec::new();
        for rr in response.answers() {
            match codec::decode_answer(&owner, rr)? {
                Answer::Srv(record) => records.push(record),
                Answer::Alias(target) => name = target,
            }
        }

        if records.is_empty() {
            return Err(Error::query_failed(&owner, "no SRV records found"));
        }

        records.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| b.weight.cmp(&a.weight))
                .then_with(|| a.field_cmp(b))
        });

        Ok(LookupResult { name, records })
    }

    /// Query the RRset and decode it
    async fn observe(&self, owner: &str) -> Result<Observation> {
        let query = message::srv_query(owner, false)?;
        let response = self
            .exchange
            .exchange(query, false)
            .await
            .map_err(|e| Error::query_failed(owner, e))?;

        match response.response_code() {
            ResponseCode::NoError => {}
            ResponseCode::NXDomain => {
                debug!("{}: name does not exist", owner);
                return Ok(Observation::empty(owner));
            }
            code => {
                return Err(Error::query_failed(owner, format!("server answered {code}")));
            }
        }

        let mut observation = Observation::empty(owner);
        for rr in response.answers() {
            match codec::decode_answer(owner, rr)? {
                Answer::Srv(_) if !same_owner(&rr.name().to_string(), owner) => {
                    debug!("{}: ignoring SRV record held by {}", owner, rr.name());
                }
                Answer::Srv(record) => {
                    observation.ttl = Some(observation.ttl.map_or(record.ttl, |ttl| ttl.min(record.ttl)));
                    observation.records.add(record);
                }
                Answer::Alias(target) => {
                    debug!("{}: answer aliases to {}", owner, target);
                }
            }
        }

        debug!(
            "{}: server holds {} record(s), ttl {:?}",
            owner,
            observation.records.len(),
            observation.ttl
        );
        Ok(observation)
    }

    /// Send the update and check the response code
    async fn submit(&self, message: &UpdateMessage) -> Result<()> {
        let owner = message.owner();
        let wire = message.to_message()?;

        let response = self
            .exchange
            .exchange(wire, true)
            .await
            .map_err(|e| Error::update_failed(owner, e))?;

        match response.response_code() {
            ResponseCode::NoError => Ok(()),
            code => Err(Error::UpdateRejected {
                owner: owner.to_string(),
                code,
            }),
        }
    }
}

/// Owner names compare case-insensitively, with or without the root dot
fn same_owner(a: &str, b: &str) -> bool {
    a.trim_end_matches('.').eq_ignore_ascii_case(b.trim_end_matches('.'))
}
