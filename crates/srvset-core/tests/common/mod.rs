//! Test doubles and common utilities for contract tests
//!
//! [`ZoneExchange`] is an in-memory authoritative server. It answers SRV
//! queries from its zone data and applies RFC 2136 update sections, after a
//! round trip through the wire format so encoding problems surface here too.

#![allow(dead_code)]

use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::CNAME;
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use srvset_core::config::RecordSetConfig;
use srvset_core::error::{Error, Result};
use srvset_core::record::codec;
use srvset_core::traits::Exchange;
use srvset_core::{RecordSet, SetName, SrvRecord};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// In-memory authoritative zone implementing [`Exchange`]
#[derive(Default)]
pub struct ZoneExchange {
    zone: Mutex<BTreeMap<String, Vec<SrvRecord>>>,
    aliases: Mutex<BTreeMap<String, String>>,
    extra_answers: Mutex<Vec<Record>>,
    updates: Mutex<Vec<Message>>,
    query_count: AtomicUsize,
    update_count: AtomicUsize,
    reject_updates: Mutex<Option<ResponseCode>>,
    query_code: Mutex<Option<ResponseCode>>,
    fail_queries: AtomicBool,
    fail_updates: AtomicBool,
    ignore_updates: AtomicBool,
    reverse_answers: AtomicBool,
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl ZoneExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the records held for `owner`
    pub fn seed(&self, owner: &str, records: Vec<SrvRecord>) {
        self.zone.lock().unwrap().insert(key(owner), records);
    }

    /// Records currently held for `owner`
    pub fn records(&self, owner: &str) -> Vec<SrvRecord> {
        self.zone
            .lock()
            .unwrap()
            .get(&key(owner))
            .cloned()
            .unwrap_or_default()
    }

    /// Answer queries for `owner` with a CNAME to `target` followed by the target's records
    pub fn alias(&self, owner: &str, target: &str) {
        self.aliases
            .lock()
            .unwrap()
            .insert(key(owner), target.to_string());
    }

    /// Append `record` to every query answer
    pub fn inject_answer(&self, record: Record) {
        self.extra_answers.lock().unwrap().push(record);
    }

    /// Answer every update with `code`
    pub fn reject_updates(&self, code: ResponseCode) {
        *self.reject_updates.lock().unwrap() = Some(code);
    }

    /// Answer every query with `code` and no answers
    pub fn answer_queries_with(&self, code: ResponseCode) {
        *self.query_code.lock().unwrap() = Some(code);
    }

    /// Fail queries at the transport level
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Fail updates at the transport level
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Acknowledge updates without applying them
    pub fn ignore_updates(&self, ignore: bool) {
        self.ignore_updates.store(ignore, Ordering::SeqCst);
    }

    /// Return answers in reverse zone order
    pub fn reverse_answers(&self, reverse: bool) {
        self.reverse_answers.store(reverse, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.update_count.load(Ordering::SeqCst)
    }

    /// Update messages received so far, as decoded from the wire
    pub fn updates(&self) -> Vec<Message> {
        self.updates.lock().unwrap().clone()
    }

    fn response_to(request: &Message) -> Message {
        let mut response = Message::new();
        response
            .set_id(request.id())
            .set_message_type(MessageType::Response)
            .set_op_code(request.op_code())
            .set_recursion_desired(request.recursion_desired());
        response
    }

    fn answer(&self, request: &Message) -> Result<Message> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(Error::exchange("query timed out"));
        }

        let mut response = Self::response_to(request);
        if let Some(code) = *self.query_code.lock().unwrap() {
            response.set_response_code(code);
            return Ok(response);
        }

        let query = &request.queries()[0];
        assert_eq!(query.query_type(), RecordType::SRV);
        response.add_query(query.clone());

        let qname = query.name().clone();
        let mut answers = Vec::new();
        let mut lookup = qname.clone();

        if let Some(target) = self.aliases.lock().unwrap().get(&key(&qname.to_string())) {
            let target = Name::from_str(target).unwrap();
            answers.push(Record::from_rdata(
                qname.clone(),
                300,
                RData::CNAME(CNAME(target.clone())),
            ));
            lookup = target;
        }

        let held = self.records(&lookup.to_string());
        for record in &held {
            answers.push(codec::to_rr(&lookup, record.ttl, record)?);
        }
        answers.extend(self.extra_answers.lock().unwrap().iter().cloned());

        if answers.is_empty() {
            response.set_response_code(ResponseCode::NXDomain);
            return Ok(response);
        }

        if self.reverse_answers.load(Ordering::SeqCst) {
            answers.reverse();
        }
        for rr in answers {
            response.add_answer(rr);
        }
        Ok(response)
    }

    fn apply(&self, request: &Message) -> Result<Message> {
        self.update_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Error::exchange("update timed out"));
        }

        let wire = request.to_vec().map_err(|e| Error::exchange(e.to_string()))?;
        let update = Message::from_vec(&wire).map_err(|e| Error::exchange(e.to_string()))?;
        self.updates.lock().unwrap().push(update.clone());

        let mut response = Self::response_to(&update);

        if update.op_code() != OpCode::Update
            || update.queries().len() != 1
            || update.queries()[0].query_type() != RecordType::SOA
        {
            response.set_response_code(ResponseCode::FormErr);
            return Ok(response);
        }

        if let Some(code) = *self.reject_updates.lock().unwrap() {
            response.set_response_code(code);
            return Ok(response);
        }

        if self.ignore_updates.load(Ordering::SeqCst) {
            return Ok(response);
        }

        let mut zone = self.zone.lock().unwrap();
        for rr in update.name_servers() {
            let owner = rr.name().to_string();
            let record = codec::from_rr(&owner, rr)?;
            let held = zone.entry(key(&owner)).or_default();

            match rr.dns_class() {
                DNSClass::NONE => held.retain(|r| !r.same_record(&record)),
                DNSClass::IN => match held.iter_mut().find(|r| r.same_record(&record)) {
                    Some(existing) => existing.ttl = record.ttl,
                    None => held.push(record),
                },
                _ => {
                    response.set_response_code(ResponseCode::FormErr);
                    return Ok(response);
                }
            }
        }
        zone.retain(|_, records| !records.is_empty());

        Ok(response)
    }
}

#[async_trait::async_trait]
impl Exchange for ZoneExchange {
    async fn exchange(&self, message: Message, is_update: bool) -> Result<Message> {
        if is_update {
            self.apply(&message)
        } else {
            self.answer(&message)
        }
    }

    fn transport_name(&self) -> &'static str {
        "zone"
    }
}

pub const ZONE: &str = "example.org.";

pub fn mysql() -> SetName {
    SetName::new("mysql", "tcp", ZONE).unwrap()
}

pub fn srv(priority: u16, weight: u16, port: u16, target: &str, ttl: u32) -> SrvRecord {
    SrvRecord::new(priority, weight, port, target, ttl)
}

pub fn set_of(records: &[SrvRecord]) -> RecordSet {
    records.iter().cloned().collect()
}

pub fn mysql_config() -> RecordSetConfig {
    RecordSetConfig::new("mysql", "tcp", ZONE)
        .with_ttl(300)
        .with_record(10, 10, 3306, "mysql1.example.org.")
        .with_record(20, 10, 3306, "mysql2.example.org.")
}

/// Sort for order-insensitive comparison
pub fn sorted(mut records: Vec<SrvRecord>) -> Vec<SrvRecord> {
    records.sort_by(|a, b| {
        (a.priority, a.weight, a.port, &a.target).cmp(&(b.priority, b.weight, b.port, &b.target))
    });
    records
}
