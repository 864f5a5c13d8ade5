//! Update and query message construction
//!
//! [`UpdateMessage`] is the RFC 2136 transaction for one owner name: a REMOVE
//! section followed by an INSERT section. Every removal precedes every
//! insertion, both in [`UpdateMessage::directives`] and on the wire.

use crate::error::Result;
use crate::plan::UpdatePlan;
use crate::record::{SrvRecord, codec};
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, RecordType};

/// Kind of update directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// Delete one RR from the RRset
    Remove,
    /// Add one RR to the RRset
    Insert,
}

/// One line of an update transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Remove or insert
    pub kind: DirectiveKind,
    /// Record the directive applies to, carrying the TTL it is rendered with
    pub record: SrvRecord,
    /// Presentation form, see [`codec::serialize`]
    pub line: String,
}

/// A dynamic update for one owner name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMessage {
    zone: String,
    owner: String,
    remove: Vec<Directive>,
    insert: Vec<Directive>,
}

impl UpdateMessage {
    /// Build the transaction for `plan`
    ///
    /// Removals are rendered with each record's own TTL, insertions with `ttl`.
    pub fn build(zone: &str, owner: &str, ttl: u32, plan: UpdatePlan) -> Self {
        let remove = plan
            .to_remove
            .into_iter()
            .map(|record| Directive {
                kind: DirectiveKind::Remove,
                line: codec::serialize(owner, record.ttl, &record),
                record,
            })
            .collect();

        let insert = plan
            .to_add
            .into_iter()
            .map(|record| {
                let record = record.with_ttl(ttl);
                Directive {
                    kind: DirectiveKind::Insert,
                    line: codec::serialize(owner, ttl, &record),
                    record,
                }
            })
            .collect();

        Self {
            zone: zone.to_string(),
            owner: owner.to_string(),
            remove,
            insert,
        }
    }

    /// Zone the update is addressed to
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Owner name every directive applies to
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// REMOVE section
    pub fn removals(&self) -> &[Directive] {
        &self.remove
    }

    /// INSERT section
    pub fn insertions(&self) -> &[Directive] {
        &self.insert
    }

    /// All directives, removals first
    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.remove.iter().chain(self.insert.iter())
    }

    /// Whether the transaction contains no directives
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.insert.is_empty()
    }

    /// Encode as a DNS UPDATE message
    ///
    /// Removals use class NONE and TTL 0 (RFC 2136 §2.5.4). The message id is
    /// left at 0 for the transport to assign.
    pub fn to_message(&self) -> Result<Message> {
        let zone = codec::parse_name(&self.zone)?;
        let owner = codec::parse_name(&self.owner)?;

        let mut zone_query = Query::query(zone, RecordType::SOA);
        zone_query.set_query_class(DNSClass::IN);

        let mut message = Message::new();
        message
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Update)
            .set_recursion_desired(false)
            .add_query(zone_query);

        for directive in &self.remove {
            let mut rr = codec::to_rr(&owner, 0, &directive.record)?;
            rr.set_dns_class(DNSClass::NONE);
            message.add_name_server(rr);
        }
        for directive in &self.insert {
            let rr = codec::to_rr(&owner, directive.record.ttl, &directive.record)?;
            message.add_name_server(rr);
        }

        Ok(message)
    }
}

/// Build an SRV query for `owner`
///
/// `recursive` sets the RD bit; authoritative reads leave it clear.
pub fn srv_query(owner: &str, recursive: bool) -> Result<Message> {
    let name = codec::parse_name(owner)?;
    let mut query = Query::query(name, RecordType::SRV);
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new();
    message
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(recursive)
        .add_query(query);
    Ok(message)
}
