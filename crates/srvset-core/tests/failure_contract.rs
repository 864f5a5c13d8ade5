//! Contract Test: Cycle Failures
//!
//! Every failure surfaces to the caller as a typed error, and nothing is
//! retried inside a cycle.
//!
//! Constraints verified:
//! - Malformed desired records fail before any network interaction
//! - Transport failures on reads are `QueryFailed`
//! - Non-success update responses are `UpdateRejected` carrying the code
//! - Foreign answer types are `UnsupportedAnswerType`
//! - Strict verification reports divergence

mod common;

use common::*;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use srvset_core::{Error, Reconciler, VerifyPolicy};
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::Arc;

#[tokio::test]
async fn invalid_target_fails_before_any_query() {
    let zone = Arc::new(ZoneExchange::new());
    let long_label = "a".repeat(64);
    let desired = set_of(&[srv(10, 10, 3306, &format!("{long_label}.example.org."), 300)]);

    let err = Reconciler::new(zone.clone())
        .reconcile(&mysql(), &desired, 300)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MalformedRecord(_)));
    assert_eq!(zone.query_count(), 0);
    assert_eq!(zone.update_count(), 0);
}

#[tokio::test]
async fn out_of_range_declaration_is_malformed() {
    let config = mysql_config().with_record(10, 10, 70000, "mysql3.example.org.");
    assert!(matches!(config.desired(), Err(Error::MalformedRecord(_))));
}

#[tokio::test]
async fn transport_failure_on_read_is_query_failed() {
    let zone = Arc::new(ZoneExchange::new());
    zone.fail_queries(true);

    let err = Reconciler::new(zone.clone()).read(&mysql()).await.unwrap_err();
    match err {
        Error::QueryFailed { owner, reason } => {
            assert_eq!(owner, "_mysql._tcp.example.org.");
            assert!(reason.contains("timed out"));
        }
        other => panic!("unexpected error: {other}"),
    }
    // No internal retry
    assert_eq!(zone.query_count(), 1);
}

#[tokio::test]
async fn server_failure_code_on_read_is_query_failed() {
    let zone = Arc::new(ZoneExchange::new());
    zone.answer_queries_with(ResponseCode::ServFail);

    let err = Reconciler::new(zone).read(&mysql()).await.unwrap_err();
    assert!(matches!(err, Error::QueryFailed { .. }));
}

#[tokio::test]
async fn nxdomain_reads_as_empty() {
    let zone = Arc::new(ZoneExchange::new());
    zone.answer_queries_with(ResponseCode::NXDomain);

    let observed = Reconciler::new(zone).read(&mysql()).await.unwrap();
    assert!(observed.is_empty());
    assert_eq!(observed.ttl, None);
}

#[tokio::test]
async fn rejected_update_carries_the_response_code() {
    let zone = Arc::new(ZoneExchange::new());
    zone.reject_updates(ResponseCode::Refused);

    let desired = set_of(&[srv(10, 10, 3306, "mysql1.example.org.", 300)]);
    let err = Reconciler::new(zone.clone())
        .reconcile(&mysql(), &desired, 300)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::UpdateRejected {
            code: ResponseCode::Refused,
            ..
        }
    ));
    assert!(err.resets_identity());
    assert_eq!(zone.update_count(), 1);
    // No verify read after a failed update
    assert_eq!(zone.query_count(), 1);
}

#[tokio::test]
async fn undelivered_update_is_update_failed() {
    let zone = Arc::new(ZoneExchange::new());
    zone.fail_updates(true);

    let desired = set_of(&[srv(10, 10, 3306, "mysql1.example.org.", 300)]);
    let err = Reconciler::new(zone)
        .reconcile(&mysql(), &desired, 300)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UpdateFailed { .. }));
    assert!(err.resets_identity());
}

#[tokio::test]
async fn foreign_answer_type_is_rejected() {
    let zone = Arc::new(ZoneExchange::new());
    let name = mysql();
    zone.seed(&name.owner_name(), vec![srv(10, 10, 3306, "mysql1.example.org.", 300)]);
    zone.inject_answer(Record::from_rdata(
        Name::from_str(&name.owner_name()).unwrap(),
        300,
        RData::A(A(Ipv4Addr::new(192, 0, 2, 1))),
    ));

    let err = Reconciler::new(zone).read(&name).await.unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedAnswerType {
            record_type: RecordType::A,
            ..
        }
    ));
}

#[tokio::test]
async fn strict_verification_reports_divergence() {
    let zone = Arc::new(ZoneExchange::new());
    zone.ignore_updates(true);

    let desired = set_of(&[srv(10, 10, 3306, "mysql1.example.org.", 300)]);
    let err = Reconciler::new(zone.clone())
        .with_verify_policy(VerifyPolicy::Strict)
        .reconcile(&mysql(), &desired, 300)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Diverged { expected: 1, found: 0, .. }));
}

#[tokio::test]
async fn trusting_verification_republishes_server_state() {
    let zone = Arc::new(ZoneExchange::new());
    zone.ignore_updates(true);

    let desired = set_of(&[srv(10, 10, 3306, "mysql1.example.org.", 300)]);
    let outcome = Reconciler::new(zone)
        .reconcile(&mysql(), &desired, 300)
        .await
        .unwrap();

    assert!(outcome.updated());
    assert!(outcome.current.is_empty());
}

#[tokio::test]
async fn lookup_of_missing_name_is_query_failed() {
    let zone = Arc::new(ZoneExchange::new());

    let err = Reconciler::new(zone.clone())
        .lookup("ldap", "tcp", ZONE)
        .await
        .unwrap_err();

    match err {
        Error::QueryFailed { owner, reason } => {
            assert_eq!(owner, "_ldap._tcp.example.org.");
            assert!(reason.contains(&ResponseCode::NXDomain.to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(zone.query_count(), 1);
}
