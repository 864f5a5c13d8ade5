//! SRV record model
//!
//! - [`SrvRecord`]: one structured SRV record (priority, weight, port, target, ttl)
//! - [`RecordIdentity`]: TTL-independent fingerprint used as the set-membership key
//! - [`SetName`]: service/proto/zone triple that owns an RRset
//!
//! The wire and text codecs live in [`codec`], the unordered collection in [`set`].

pub mod codec;
pub mod set;

pub use set::RecordSet;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single SRV record
///
/// `target` is kept verbatim: no case folding, no trailing-dot normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SrvRecord {
    /// Priority of the target host (lower is preferred)
    pub priority: u16,
    /// Relative weight among records with the same priority
    pub weight: u16,
    /// Port of the service on the target host
    pub port: u16,
    /// Target host name
    pub target: String,
    /// Time-to-live in seconds
    pub ttl: u32,
}

impl SrvRecord {
    /// Create a new record
    pub fn new(priority: u16, weight: u16, port: u16, target: impl Into<String>, ttl: u32) -> Self {
        Self {
            priority,
            weight,
            port,
            target: target.into(),
            ttl,
        }
    }

    /// Build a record from unchecked numeric fields
    ///
    /// This is the entry point for desired-state declarations. Values outside
    /// the 16-bit range are rejected rather than truncated.
    pub fn from_parts(
        priority: i64,
        weight: i64,
        port: i64,
        target: impl Into<String>,
        ttl: u32,
    ) -> Result<Self> {
        let target = target.into();
        if target.trim().is_empty() {
            return Err(Error::malformed("SRV target cannot be empty"));
        }

        Ok(Self {
            priority: u16_field("priority", priority)?,
            weight: u16_field("weight", weight)?,
            port: u16_field("port", port)?,
            target,
            ttl,
        })
    }

    /// The set-membership key of this record
    pub fn identity(&self) -> RecordIdentity {
        RecordIdentity::of(self)
    }

    /// Whether both records describe the same SRV target, ignoring TTL
    pub fn same_record(&self, other: &SrvRecord) -> bool {
        self.priority == other.priority
            && self.weight == other.weight
            && self.port == other.port
            && self.target == other.target
    }

    /// Copy of this record carrying a different TTL
    pub fn with_ttl(&self, ttl: u32) -> Self {
        Self {
            ttl,
            ..self.clone()
        }
    }

    /// Ordering on the identity fields only, used to break ties inside a hash bucket
    pub(crate) fn field_cmp(&self, other: &SrvRecord) -> std::cmp::Ordering {
        (self.priority, self.weight, self.port, self.target.as_str()).cmp(&(
            other.priority,
            other.weight,
            other.port,
            other.target.as_str(),
        ))
    }
}

impl fmt::Display for SrvRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.priority, self.weight, self.port, self.target
        )
    }
}

fn u16_field(field: &str, value: i64) -> Result<u16> {
    u16::try_from(value).map_err(|_| {
        Error::malformed(format!(
            "SRV {field} must be between 0 and {}, got {value}",
            u16::MAX
        ))
    })
}

/// Stable fingerprint of a record's non-TTL fields
///
/// Computed as a 32-bit xxHash (seed 0) over `"{priority}-{weight}-{port}-{target}-"`.
/// Distinct records may collide; [`RecordSet`] still compares full fields
/// inside a bucket, so a collision never makes two records equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordIdentity(u32);

impl RecordIdentity {
    /// Hash seed; fixed so identities are stable across processes and releases
    const SEED: u32 = 0;

    /// Compute the identity of `record`
    pub fn of(record: &SrvRecord) -> Self {
        let key = format!(
            "{}-{}-{}-{}-",
            record.priority, record.weight, record.port, record.target
        );
        Self(xxhash_rust::xxh32::xxh32(key.as_bytes(), Self::SEED))
    }

    /// Raw hash value
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RecordIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Compute the identity of `record`
pub fn identity_of(record: &SrvRecord) -> RecordIdentity {
    RecordIdentity::of(record)
}

/// Service/proto/zone triple naming one SRV RRset
///
/// Service and proto are stored without their leading underscore.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SetName {
    /// Service label, e.g. `sip`
    pub service: String,
    /// Protocol label, e.g. `tcp`
    pub proto: String,
    /// Fully qualified zone, e.g. `example.org.`
    pub zone: String,
}

impl SetName {
    /// Create a set name; a single leading `_` on service or proto is accepted and dropped
    ///
    /// All parts are lowercased, so names differing only in case are one set.
    pub fn new(
        service: impl Into<String>,
        proto: impl Into<String>,
        zone: impl Into<String>,
    ) -> Result<Self> {
        let service = strip_underscore(service.into().to_ascii_lowercase());
        let proto = strip_underscore(proto.into().to_ascii_lowercase());
        let zone = zone.into().to_ascii_lowercase();

        validate_label("service", &service)?;
        validate_label("proto", &proto)?;
        validate_zone(&zone)?;

        Ok(Self {
            service,
            proto,
            zone,
        })
    }

    /// Recover the set name from an owner FQDN such as `_sip._tcp.example.org.`
    ///
    /// The first two labels must carry the underscore prefix; everything after
    /// them is taken as the zone.
    pub fn from_owner(owner: &str) -> Result<Self> {
        let mut labels = owner.splitn(3, '.');
        let service = labels.next().unwrap_or_default();
        let proto = labels.next().unwrap_or_default();
        let zone = match labels.next() {
            Some("") => ".",
            Some(zone) => zone,
            None => "",
        };

        if !service.starts_with('_') || !proto.starts_with('_') {
            return Err(Error::invalid_name(format!(
                "'{owner}' is not an SRV owner name (expected _service._proto.zone.)"
            )));
        }

        Self::new(service, proto, zone)
    }

    /// Owner FQDN shared by every record of the set
    pub fn owner_name(&self) -> String {
        if self.zone == "." {
            return format!("_{}._{}.", self.service, self.proto);
        }
        format!("_{}._{}.{}", self.service, self.proto, self.zone)
    }
}

impl fmt::Display for SetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.owner_name())
    }
}

fn strip_underscore(label: String) -> String {
    match label.strip_prefix('_') {
        Some(stripped) => stripped.to_string(),
        None => label,
    }
}

fn validate_label(field: &str, label: &str) -> Result<()> {
    if label.is_empty() {
        return Err(Error::invalid_name(format!("{field} cannot be empty")));
    }
    if label.contains('.') || label.chars().any(char::is_whitespace) {
        return Err(Error::invalid_name(format!(
            "{field} '{label}' must be a single label"
        )));
    }
    Ok(())
}

/// A zone must be fully qualified
pub(crate) fn validate_zone(zone: &str) -> Result<()> {
    if zone.is_empty() || !zone.ends_with('.') {
        return Err(Error::invalid_name(format!(
            "zone '{zone}' must be fully qualified (end with '.')"
        )));
    }
    if zone != "." && zone.starts_with('.') {
        return Err(Error::invalid_name(format!("zone '{zone}' has an empty label")));
    }
    Ok(())
}
