//! Record set engine
//!
//! The SrvSetEngine is responsible for:
//! - Turning declared record sets into desired [`RecordSet`](crate::RecordSet)s
//! - Driving the [`Reconciler`] for each lifecycle operation
//! - Persisting what the server reports after each cycle
//! - Forgetting a set whose update failed, so the next cycle starts from a read
//!
//! ## Architecture
//!
//! ```text
//!   RecordSetConfig ──► ┌──────────────┐ ──► Events
//!                       │ SrvSetEngine │
//!                       └──────────────┘
//!                          │        │
//!                          ▼        ▼
//!                 ┌────────────┐  ┌────────────┐
//!                 │ Reconciler │  │ StateStore │
//!                 │ (exchange) │  │ (persist)  │
//!                 └────────────┘  └────────────┘
//! ```
//!
//! ## Retry
//!
//! Reconciliation cycles never retry. [`SrvSetEngine::apply_all`] is the one
//! place that does, bounded by `engine.max_retries`.

use crate::config::{RecordSetConfig, SrvSetConfig};
use crate::error::{Error, Result};
use crate::reconciler::Reconciler;
use crate::record::{RecordSet, SetName};
use crate::traits::{Exchange, SetState, StateStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Events emitted by the SrvSetEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A reconciliation cycle started
    CycleStarted {
        id: String,
    },

    /// An update was submitted and the set re-read
    SetReconciled {
        id: String,
        removed: usize,
        added: usize,
    },

    /// The server already matched the desired set
    SetUnchanged {
        id: String,
    },

    /// A reconciliation cycle failed
    CycleFailed {
        id: String,
        error: String,
    },

    /// The server no longer holds any record for the set
    SetGone {
        id: String,
    },

    /// Every record of the set was removed
    SetDeleted {
        id: String,
    },

    /// An existing set was adopted
    SetImported {
        id: String,
        records: usize,
    },

    /// A set failed after every retry
    SetAbandoned {
        id: String,
        error: String,
        attempts: usize,
    },
}

/// Failure of one set during [`SrvSetEngine::apply_all`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailure {
    pub id: String,
    pub error: String,
    pub attempts: usize,
}

/// Result of [`SrvSetEngine::apply_all`]
#[derive(Debug, Clone, Default)]
pub struct ApplySummary {
    /// Persisted state of every set that reconciled
    pub states: Vec<SetState>,
    /// Sets that failed after all attempts
    pub failures: Vec<ApplyFailure>,
}

impl ApplySummary {
    /// Whether every set reconciled
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Core record set engine
///
/// ## Lifecycle
///
/// 1. Create with [`SrvSetEngine::new()`]
/// 2. Call [`SrvSetEngine::apply_all()`] or the individual operations
/// 3. Call [`SrvSetEngine::flush()`] before exiting
///
/// Operations on different sets are independent; the engine keeps no
/// per-set state outside the state store.
pub struct SrvSetEngine {
    /// Reconciler bound to the configured exchange
    reconciler: Reconciler,

    /// Persisted per-set state
    state_store: Box<dyn StateStore>,

    /// Declared record sets
    sets: Vec<RecordSetConfig>,

    /// Maximum retry attempts in `apply_all`
    max_retries: usize,

    /// Delay between retries (in seconds)
    retry_delay_secs: u64,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl SrvSetEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        exchange: Arc<dyn Exchange>,
        state_store: Box<dyn StateStore>,
        config: SrvSetConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            reconciler: Reconciler::new(exchange).with_verify_policy(config.engine.verify),
            state_store,
            sets: config.sets,
            max_retries: config.engine.max_retries,
            retry_delay_secs: config.engine.retry_delay_secs,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// The reconciler used for every operation
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// The state store
    pub fn state_store(&self) -> &dyn StateStore {
        self.state_store.as_ref()
    }

    /// Declared record sets
    pub fn sets(&self) -> &[RecordSetConfig] {
        &self.sets
    }

    /// Reconcile a declared set and persist the result
    ///
    /// The declaration is fully converted before any network interaction.
    pub async fn create(&self, config: &RecordSetConfig) -> Result<SetState> {
        let name = config.set_name()?;
        let desired = config.desired()?;
        self.reconcile(&name, &desired, config.ttl).await
    }

    /// Re-read a set from the server
    ///
    /// Returns `Ok(None)` when the server holds no records; the persisted
    /// state is removed in that case.
    pub async fn read(&self, id: &str) -> Result<Option<SetState>> {
        let name = SetName::from_owner(id)?;
        let id = &name.owner_name();
        let observed = self.reconciler.read(&name).await?;

        if observed.is_empty() {
            info!("{}: no records on server, forgetting set", id);
            self.unset(id).await;
            self.emit_event(EngineEvent::SetGone { id: id.to_string() });
            return Ok(None);
        }

        let ttl = observed.ttl.unwrap_or_default();
        let state = SetState::new(name, ttl, observed.records.to_vec());
        self.state_store.put_set(&state).await?;
        Ok(Some(state))
    }

    /// Move the set persisted under `id` to a new declaration
    ///
    /// A changed name or TTL replaces the set: the old owner is emptied and
    /// the new declaration created. Anything else reconciles in place.
    ///
    /// The TTL compared is the one persisted from the server, so a server-side
    /// TTL drift also replaces the set and leaves the RRset briefly empty.
    pub async fn update(&self, id: &str, config: &RecordSetConfig) -> Result<SetState> {
        let id = &SetName::from_owner(id)?.owner_name();
        let name = config.set_name()?;
        let desired = config.desired()?;

        if let Some(previous) = self.state_store.get_set(id).await? {
            if previous.name != name || previous.ttl != config.ttl {
                info!(
                    "{}: replacing set (now {} with ttl {})",
                    id,
                    name.owner_name(),
                    config.ttl
                );
                self.delete(id).await?;
                return self.reconcile(&name, &desired, config.ttl).await;
            }
        }

        self.reconcile(&name, &desired, config.ttl).await
    }

    /// Remove every record of the set and its persisted state
    pub async fn delete(&self, id: &str) -> Result<()> {
        let name = SetName::from_owner(id)?;
        let id = &name.owner_name();
        self.emit_event(EngineEvent::CycleStarted { id: id.to_string() });

        if let Err(e) = self.reconciler.delete(&name).await {
            if e.resets_identity() {
                self.unset(id).await;
            }
            self.emit_event(EngineEvent::CycleFailed {
                id: id.to_string(),
                error: e.to_string(),
            });
            return Err(e);
        }

        self.state_store.delete_set(id).await?;
        info!("{}: deleted", id);
        self.emit_event(EngineEvent::SetDeleted { id: id.to_string() });
        Ok(())
    }

    /// Adopt the set that already exists on the server under `id`
    pub async fn import(&self, id: &str) -> Result<SetState> {
        let (name, observed) = self.reconciler.import(id).await?;
        let id = &name.owner_name();

        if observed.is_empty() {
            return Err(Error::Other(format!(
                "{id}: no SRV records found, nothing to import"
            )));
        }

        let state = SetState::new(name, observed.ttl.unwrap_or_default(), observed.records.to_vec());
        self.state_store.put_set(&state).await?;

        info!("{}: imported {} record(s)", id, state.records.len());
        self.emit_event(EngineEvent::SetImported {
            id: id.to_string(),
            records: state.records.len(),
        });
        Ok(state)
    }

    /// Create or update one declared set depending on persisted state
    pub async fn apply(&self, config: &RecordSetConfig) -> Result<SetState> {
        let id = config.set_name()?.owner_name();

        if self.state_store.get_set(&id).await?.is_some() {
            self.update(&id, config).await
        } else {
            self.create(config).await
        }
    }

    /// Apply every declared set, serially, with bounded retries
    pub async fn apply_all(&self) -> Result<ApplySummary> {
        let mut summary = ApplySummary::default();

        for set in &self.sets {
            let id = set
                .set_name()
                .map(|name| name.owner_name())
                .unwrap_or_else(|_| format!("_{}._{}.{}", set.service, set.proto, set.zone));

            let mut last_error = None;
            let mut attempts = 0;

            for attempt in 0..=self.max_retries {
                attempts = attempt + 1;
                match self.apply(set).await {
                    Ok(state) => {
                        summary.states.push(state);
                        last_error = None;
                        break;
                    }
                    Err(e) => {
                        warn!("Attempt {} failed for {}: {}", attempts, id, e);
                        let permanent = is_permanent(&e);
                        last_error = Some(e);

                        if permanent {
                            break;
                        }
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_secs(self.retry_delay_secs)).await;
                        }
                    }
                }
            }

            if let Some(e) = last_error {
                error!("Giving up on {} after {} attempt(s): {}", id, attempts, e);
                self.emit_event(EngineEvent::SetAbandoned {
                    id: id.clone(),
                    error: e.to_string(),
                    attempts,
                });
                summary.failures.push(ApplyFailure {
                    id,
                    error: e.to_string(),
                    attempts,
                });
            }
        }

        self.state_store.flush().await?;
        Ok(summary)
    }

    /// Persist pending state store changes
    pub async fn flush(&self) -> Result<()> {
        self.state_store.flush().await
    }

    async fn reconcile(&self, name: &SetName, desired: &RecordSet, ttl: u32) -> Result<SetState> {
        let id = name.owner_name();
        self.emit_event(EngineEvent::CycleStarted { id: id.clone() });

        let outcome = match self.reconciler.reconcile(name, desired, ttl).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // Failed create/update: server state is unknown until read again
                self.unset(&id).await;
                self.emit_event(EngineEvent::CycleFailed {
                    id,
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        match &outcome.message {
            Some(message) => self.emit_event(EngineEvent::SetReconciled {
                id: id.clone(),
                removed: message.removals().len(),
                added: message.insertions().len(),
            }),
            None => self.emit_event(EngineEvent::SetUnchanged { id: id.clone() }),
        }

        let current = outcome.current;
        let state = SetState::new(name.clone(), current.ttl.unwrap_or(ttl), current.records.to_vec());
        self.state_store.put_set(&state).await?;
        Ok(state)
    }

    async fn unset(&self, id: &str) {
        if let Err(e) = self.state_store.delete_set(id).await {
            warn!("Failed to forget state for {}: {}", id, e);
        }
    }

    fn emit_event(&self, event: EngineEvent) {
        debug!("Engine event: {:?}", event);
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

/// Failures that another attempt cannot fix
fn is_permanent(err: &Error) -> bool {
    matches!(
        err,
        Error::MalformedRecord(_) | Error::InvalidName(_) | Error::Config(_)
    )
}
