//! Configuration types for srvset
//!
//! This module defines all configuration structures used throughout the crate.

use crate::error::{Error, Result};
use crate::record::{RecordSet, SetName, SrvRecord};
use serde::{Deserialize, Serialize};

/// Main srvset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrvSetConfig {
    /// Authoritative server to exchange messages with
    pub resolver: ResolverConfig,

    /// State store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Record sets to manage
    #[serde(default)]
    pub sets: Vec<RecordSetConfig>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SrvSetConfig {
    /// Create a configuration for `resolver` with defaults everywhere else
    pub fn new(resolver: ResolverConfig) -> Self {
        Self {
            resolver,
            state_store: StateStoreConfig::default(),
            sets: Vec::new(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    ///
    /// Every declared record is converted here, so malformed desired state is
    /// reported before any network interaction.
    pub fn validate(&self) -> Result<()> {
        self.resolver.validate()?;
        self.engine.validate()?;

        for set in &self.sets {
            set.validate()?;
        }

        Ok(())
    }
}

/// Resolver configuration
///
/// The explicit connection settings handed to an exchange transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Server host name or IP address
    pub server: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport protocol
    #[serde(default)]
    pub transport: TransportProtocol,

    /// Per-attempt timeout (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of resends after a timeout (transport-level only)
    #[serde(default = "default_retries")]
    pub retries: usize,
}

impl ResolverConfig {
    /// Create a resolver configuration with default port, transport and timeouts
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: default_port(),
            transport: TransportProtocol::default(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
        }
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the transport protocol
    pub fn with_transport(mut self, transport: TransportProtocol) -> Self {
        self.transport = transport;
        self
    }

    /// Validate the resolver configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(Error::config("Resolver server cannot be empty"));
        }
        if self.port == 0 {
            return Err(Error::config("Resolver port must be > 0"));
        }
        if self.timeout_secs == 0 {
            return Err(Error::config("Resolver timeout must be > 0"));
        }
        Ok(())
    }

    /// Server address in `host:port` form (IPv6 literals bracketed)
    pub fn address(&self) -> String {
        if self.server.contains(':') && !self.server.starts_with('[') {
            format!("[{}]:{}", self.server, self.port)
        } else {
            format!("{}:{}", self.server, self.port)
        }
    }
}

/// Transport protocol for exchanges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportProtocol {
    /// UDP, falling back to TCP for truncated responses
    #[default]
    Udp,
    /// TCP only
    Tcp,
}

impl TransportProtocol {
    /// Protocol name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportProtocol::Udp => "udp",
            TransportProtocol::Tcp => "tcp",
        }
    }
}

impl std::str::FromStr for TransportProtocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(TransportProtocol::Udp),
            "tcp" => Ok(TransportProtocol::Tcp),
            other => Err(Error::config(format!(
                "Unknown transport '{other}' (expected udp or tcp)"
            ))),
        }
    }
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,

    /// Custom state store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StateStoreConfig {
    /// Get the state store type name
    pub fn type_name(&self) -> &str {
        match self {
            StateStoreConfig::File { .. } => "file",
            StateStoreConfig::Memory => "memory",
            StateStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Declared SRV record set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSetConfig {
    /// Service label (with or without leading underscore)
    pub service: String,

    /// Protocol label (with or without leading underscore)
    pub proto: String,

    /// Fully qualified zone
    pub zone: String,

    /// TTL for inserted records (in seconds)
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Desired records
    pub records: Vec<RecordSpec>,
}

impl RecordSetConfig {
    /// Create a declaration with the default TTL and no records
    pub fn new(
        service: impl Into<String>,
        proto: impl Into<String>,
        zone: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            proto: proto.into(),
            zone: zone.into(),
            ttl: default_ttl(),
            records: Vec::new(),
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Add a desired record
    pub fn with_record(mut self, priority: i64, weight: i64, port: i64, target: impl Into<String>) -> Self {
        self.records.push(RecordSpec {
            priority,
            weight,
            port,
            target: target.into(),
        });
        self
    }

    /// Service/proto/zone of the declaration
    pub fn set_name(&self) -> Result<SetName> {
        SetName::new(&self.service, &self.proto, &self.zone)
    }

    /// Convert the declared records into the desired record set
    pub fn desired(&self) -> Result<RecordSet> {
        self.records
            .iter()
            .map(|spec| spec.to_record(self.ttl))
            .collect()
    }

    /// Validate the declaration
    pub fn validate(&self) -> Result<()> {
        let name = self.set_name()?;
        if self.records.is_empty() {
            return Err(Error::config(format!(
                "Record set {name} must declare at least one record"
            )));
        }
        self.desired()?;
        Ok(())
    }
}

/// One declared SRV record, before range checking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSpec {
    /// Priority (0-65535)
    pub priority: i64,
    /// Weight (0-65535)
    pub weight: i64,
    /// Port (0-65535)
    pub port: i64,
    /// Target host name
    pub target: String,
}

impl RecordSpec {
    /// Convert into a record with the given TTL
    pub fn to_record(&self, ttl: u32) -> Result<SrvRecord> {
        let record = SrvRecord::from_parts(self.priority, self.weight, self.port, &self.target, ttl)?;
        crate::record::codec::parse_name(&record.target)
            .map_err(|_| Error::malformed(format!("Invalid SRV target '{}'", record.target)))?;
        Ok(record)
    }
}

impl From<&SrvRecord> for RecordSpec {
    fn from(record: &SrvRecord) -> Self {
        Self {
            priority: i64::from(record.priority),
            weight: i64::from(record.weight),
            port: i64::from(record.port),
            target: record.target.clone(),
        }
    }
}

/// How the post-update re-read is judged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyPolicy {
    /// Accept whatever the server reports as the new ground truth
    #[default]
    Trust,
    /// Fail the cycle when the server's set differs from the desired set
    Strict,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of times `apply_all` retries a failed set
    ///
    /// Reconciliation cycles themselves never retry; this is caller policy.
    #[serde(default)]
    pub max_retries: usize,

    /// Delay between retry attempts (in seconds)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Post-update verification policy
    #[serde(default)]
    pub verify: VerifyPolicy,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<()> {
        if self.event_channel_capacity == 0 {
            return Err(Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay_secs: default_retry_delay_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            verify: VerifyPolicy::default(),
        }
    }
}

fn default_port() -> u16 {
    53
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retries() -> usize {
    3
}

fn default_ttl() -> u32 {
    3600
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_event_channel_capacity() -> usize {
    1000
}
