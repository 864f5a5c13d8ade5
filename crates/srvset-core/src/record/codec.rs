//! Record codec
//!
//! Converts between [`SrvRecord`] and its two external forms:
//!
//! - the presentation line `"<owner> <ttl> SRV <priority> <weight> <port> <target>"`
//! - the wire-level `hickory_proto` [`Record`]
//!
//! All functions are pure.

use super::SrvRecord;
use crate::error::{Error, Result};
use hickory_proto::rr::rdata::SRV;
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};

/// Parse SRV rdata (`"<priority> <weight> <port> <target>"`) into a record
///
/// `owner` is only used for diagnostics. The rdata must consist of exactly
/// four whitespace-separated tokens, the first three being integers in
/// `0..=65535`.
pub fn parse(owner: &str, ttl: u32, rdata: &str) -> Result<SrvRecord> {
    let tokens: Vec<&str> = rdata.split_whitespace().collect();
    let [priority, weight, port, target] = tokens.as_slice() else {
        return Err(Error::malformed(format!(
            "SRV rdata for {owner} must have 4 fields (priority weight port target), got {}: '{rdata}'",
            tokens.len()
        )));
    };

    Ok(SrvRecord {
        priority: parse_u16(owner, "priority", priority)?,
        weight: parse_u16(owner, "weight", weight)?,
        port: parse_u16(owner, "port", port)?,
        target: (*target).to_string(),
        ttl,
    })
}

/// Render a record as a presentation line
///
/// The output is byte-for-byte reproducible and parses back with [`parse_line`].
pub fn serialize(owner: &str, ttl: u32, record: &SrvRecord) -> String {
    format!(
        "{owner} {ttl} SRV {} {} {} {}",
        record.priority, record.weight, record.port, record.target
    )
}

/// Parse a full presentation line produced by [`serialize`]
///
/// An optional `IN` class token between TTL and type is accepted. Returns the
/// owner name together with the record.
pub fn parse_line(line: &str) -> Result<(String, SrvRecord)> {
    let mut tokens = line.split_whitespace();

    let owner = tokens
        .next()
        .ok_or_else(|| Error::malformed("empty SRV record line"))?;
    let ttl = tokens
        .next()
        .ok_or_else(|| Error::malformed(format!("missing TTL in '{line}'")))?;
    let ttl: u32 = ttl
        .parse()
        .map_err(|_| Error::malformed(format!("invalid TTL '{ttl}' in '{line}'")))?;

    let mut rr_type = tokens.next().unwrap_or_default();
    if rr_type.eq_ignore_ascii_case("IN") {
        rr_type = tokens.next().unwrap_or_default();
    }
    if !rr_type.eq_ignore_ascii_case("SRV") {
        return Err(Error::malformed(format!(
            "expected SRV record type in '{line}', got '{rr_type}'"
        )));
    }

    let rdata: Vec<&str> = tokens.collect();
    let record = parse(owner, ttl, &rdata.join(" "))?;
    Ok((owner.to_string(), record))
}

/// Parse a domain name, keeping its case and trailing-dot form
pub fn parse_name(name: &str) -> Result<Name> {
    Name::from_ascii(name).map_err(|e| Error::invalid_name(format!("'{name}': {e}")))
}

/// Build the wire record for `record` under `owner` with the given TTL
pub fn to_rr(owner: &Name, ttl: u32, record: &SrvRecord) -> Result<Record> {
    let target = Name::from_ascii(&record.target).map_err(|e| {
        Error::malformed(format!("invalid SRV target '{}': {e}", record.target))
    })?;

    let srv = SRV::new(record.priority, record.weight, record.port, target);
    let mut rr = Record::from_rdata(owner.clone(), ttl, RData::SRV(srv));
    rr.set_dns_class(DNSClass::IN);
    Ok(rr)
}

/// Decoded answer-section entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// An SRV record belonging to the set
    Srv(SrvRecord),
    /// A CNAME step in the answer chain, carrying its target
    Alias(String),
}

/// Decode one answer record
///
/// SRV and CNAME records are accepted; any other type is
/// [`Error::UnsupportedAnswerType`].
pub fn decode_answer(owner: &str, rr: &Record) -> Result<Answer> {
    match rr.data() {
        RData::SRV(srv) => Ok(Answer::Srv(SrvRecord {
            priority: srv.priority(),
            weight: srv.weight(),
            port: srv.port(),
            target: srv.target().to_string(),
            ttl: rr.ttl(),
        })),
        RData::CNAME(cname) => Ok(Answer::Alias(cname.0.to_string())),
        _ => Err(Error::UnsupportedAnswerType {
            owner: owner.to_string(),
            record_type: rr.record_type(),
        }),
    }
}

/// Decode an answer record that must be SRV
pub fn from_rr(owner: &str, rr: &Record) -> Result<SrvRecord> {
    match decode_answer(owner, rr)? {
        Answer::Srv(record) => Ok(record),
        Answer::Alias(_) => Err(Error::UnsupportedAnswerType {
            owner: owner.to_string(),
            record_type: RecordType::CNAME,
        }),
    }
}

fn parse_u16(owner: &str, field: &str, token: &str) -> Result<u16> {
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::malformed(format!(
            "SRV {field} for {owner} must be a non-negative integer, got '{token}'"
        )));
    }
    token.parse::<u16>().map_err(|_| {
        Error::malformed(format!(
            "SRV {field} for {owner} must be at most {}, got '{token}'",
            u16::MAX
        ))
    })
}
