//! Contract Test: Reconciliation Cycle
//!
//! Drives full Read → Diff → Update → Verify cycles against an in-memory
//! authoritative zone.
//!
//! Constraints verified:
//! - Only the records that differ are removed or inserted
//! - A matching server receives no update message at all
//! - Removals precede insertions on the wire
//! - The cycle reports what the server holds afterwards

mod common;

use common::*;
use hickory_proto::rr::DNSClass;
use srvset_core::reconciler::ReconcilePhase;
use srvset_core::{RecordSet, Reconciler, SetName};
use std::sync::Arc;

#[tokio::test]
async fn adding_a_record_leaves_existing_records_alone() {
    let zone = Arc::new(ZoneExchange::new());
    let name = SetName::new("sip", "tcp", "google.com.").unwrap();
    zone.seed(&name.owner_name(), vec![srv(10, 10, 10, "test1.google.com.", 3600)]);

    let reconciler = Reconciler::new(zone.clone());
    let desired = set_of(&[
        srv(10, 10, 10, "test1.google.com.", 3600),
        srv(20, 10, 10, "test2.google.com.", 3600),
    ]);

    let outcome = reconciler.reconcile(&name, &desired, 3600).await.unwrap();

    let message = outcome.message.expect("an update is needed");
    assert!(message.removals().is_empty());
    assert_eq!(message.insertions().len(), 1);
    assert_eq!(message.insertions()[0].record.target, "test2.google.com.");

    assert_eq!(outcome.current.records.len(), 2);
    assert!(outcome.current.records.equals(&desired));
}

#[tokio::test]
async fn replacing_every_record_removes_then_inserts() {
    let zone = Arc::new(ZoneExchange::new());
    let name = mysql();
    zone.seed(
        &name.owner_name(),
        vec![
            srv(10, 10, 3306, "mysql1.example.org.", 300),
            srv(20, 10, 3306, "mysql2.example.org.", 300),
        ],
    );

    let desired = set_of(&[
        srv(10, 10, 3306, "mysql2.example.org.", 300),
        srv(10, 10, 3306, "mysql.example.org.", 300),
    ]);
    let outcome = Reconciler::new(zone.clone())
        .reconcile(&name, &desired, 300)
        .await
        .unwrap();

    assert!(outcome.updated());
    assert_eq!(zone.update_count(), 1);

    // On the wire: two NONE-class removals, then two IN-class insertions
    let update = &zone.updates()[0];
    let classes: Vec<DNSClass> = update.name_servers().iter().map(|rr| rr.dns_class()).collect();
    assert_eq!(classes, vec![DNSClass::NONE, DNSClass::NONE, DNSClass::IN, DNSClass::IN]);
    assert!(update.name_servers()[..2].iter().all(|rr| rr.ttl() == 0));
    assert!(update.name_servers()[2..].iter().all(|rr| rr.ttl() == 300));

    assert_eq!(
        sorted(zone.records(&name.owner_name())),
        sorted(desired.to_vec())
    );
}

#[tokio::test]
async fn deleting_removes_the_whole_rrset() {
    let zone = Arc::new(ZoneExchange::new());
    let name = SetName::new("http", "tcp", ZONE).unwrap();
    zone.seed(&name.owner_name(), vec![srv(10, 10, 10, "test.example.org.", 300)]);

    let outcome = Reconciler::new(zone.clone()).delete(&name).await.unwrap();

    let message = outcome.message.expect("records must be removed");
    assert_eq!(message.removals().len(), 1);
    assert!(message.insertions().is_empty());
    assert!(outcome.current.is_empty());
    assert!(zone.records(&name.owner_name()).is_empty());
}

#[tokio::test]
async fn read_uses_minimum_ttl_as_canonical_ttl() {
    let zone = Arc::new(ZoneExchange::new());
    let name = mysql();
    zone.seed(
        &name.owner_name(),
        vec![
            srv(10, 10, 3306, "a.example.org.", 300),
            srv(20, 10, 3306, "b.example.org.", 3600),
            srv(30, 10, 3306, "c.example.org.", 300),
        ],
    );

    let observed = Reconciler::new(zone).read(&name).await.unwrap();
    assert_eq!(observed.ttl, Some(300));
    assert_eq!(observed.records.len(), 3);
}

#[tokio::test]
async fn matching_server_gets_no_update() {
    let zone = Arc::new(ZoneExchange::new());
    let name = mysql();
    let records = vec![
        srv(10, 10, 3306, "mysql1.example.org.", 300),
        srv(20, 10, 3306, "mysql2.example.org.", 300),
    ];
    zone.seed(&name.owner_name(), records.clone());

    let outcome = Reconciler::new(zone.clone())
        .reconcile(&name, &set_of(&records), 300)
        .await
        .unwrap();

    assert!(!outcome.updated());
    assert!(!outcome.phases.contains(&ReconcilePhase::Updating));
    assert_eq!(zone.update_count(), 0);
    // Read plus verify
    assert_eq!(zone.query_count(), 2);
}

#[tokio::test]
async fn ttl_difference_alone_does_not_churn_records() {
    let zone = Arc::new(ZoneExchange::new());
    let name = mysql();
    zone.seed(&name.owner_name(), vec![srv(10, 10, 3306, "mysql1.example.org.", 60)]);

    let desired = set_of(&[srv(10, 10, 3306, "mysql1.example.org.", 3600)]);
    let outcome = Reconciler::new(zone.clone())
        .reconcile(&name, &desired, 3600)
        .await
        .unwrap();

    assert!(!outcome.updated());
    assert_eq!(outcome.current.ttl, Some(60));
}

#[tokio::test]
async fn creating_on_an_empty_owner_inserts_everything() {
    let zone = Arc::new(ZoneExchange::new());
    let name = mysql();

    let desired = set_of(&[
        srv(10, 10, 3306, "mysql1.example.org.", 600),
        srv(20, 10, 3306, "mysql2.example.org.", 600),
    ]);
    let outcome = Reconciler::new(zone.clone())
        .reconcile(&name, &desired, 600)
        .await
        .unwrap();

    assert!(outcome.observed.is_empty());
    assert_eq!(
        outcome.phases,
        vec![
            ReconcilePhase::Reading,
            ReconcilePhase::Diffing,
            ReconcilePhase::Updating,
            ReconcilePhase::Verifying,
            ReconcilePhase::Idle,
        ]
    );
    assert_eq!(outcome.current.ttl, Some(600));
    assert_eq!(outcome.id(), "_mysql._tcp.example.org.");
}

#[tokio::test]
async fn answer_order_does_not_change_the_observed_set() {
    let zone = Arc::new(ZoneExchange::new());
    let name = mysql();
    let records = vec![
        srv(10, 10, 3306, "mysql1.example.org.", 300),
        srv(20, 10, 3306, "mysql2.example.org.", 300),
        srv(30, 10, 3306, "mysql3.example.org.", 300),
    ];
    zone.seed(&name.owner_name(), records.clone());

    let reconciler = Reconciler::new(zone.clone());
    let forward = reconciler.read(&name).await.unwrap();
    zone.reverse_answers(true);
    let reversed = reconciler.read(&name).await.unwrap();

    assert_eq!(forward.records, reversed.records);

    // And a reconcile against the reversed answers is still a no-op
    let outcome = reconciler.reconcile(&name, &set_of(&records), 300).await.unwrap();
    assert!(!outcome.updated());
}

#[tokio::test]
async fn cycles_for_different_owners_run_concurrently() {
    let zone = Arc::new(ZoneExchange::new());
    let reconciler = Reconciler::new(zone.clone());

    let sip = SetName::new("sip", "udp", ZONE).unwrap();
    let xmpp = SetName::new("xmpp-client", "tcp", ZONE).unwrap();
    let sip_desired = set_of(&[srv(0, 5, 5060, "sip.example.org.", 300)]);
    let xmpp_desired = set_of(&[srv(5, 0, 5222, "xmpp.example.org.", 300)]);

    let (a, b) = tokio::join!(
        reconciler.reconcile(&sip, &sip_desired, 300),
        reconciler.reconcile(&xmpp, &xmpp_desired, 300)
    );

    assert!(a.unwrap().current.records.equals(&sip_desired));
    assert!(b.unwrap().current.records.equals(&xmpp_desired));
    assert_eq!(zone.update_count(), 2);
}

#[tokio::test]
async fn empty_desired_on_empty_owner_is_a_noop() {
    let zone = Arc::new(ZoneExchange::new());
    let outcome = Reconciler::new(zone.clone())
        .reconcile(&mysql(), &RecordSet::new(), 300)
        .await
        .unwrap();

    assert!(!outcome.updated());
    assert!(outcome.current.is_empty());
    assert_eq!(zone.update_count(), 0);
}

#[tokio::test]
async fn records_behind_an_alias_are_not_owned() {
    let zone = Arc::new(ZoneExchange::new());
    let name = SetName::new("sip", "udp", ZONE).unwrap();
    let backend = "_sip._udp.backend.example.org.";
    zone.alias(&name.owner_name(), backend);
    zone.seed(backend, vec![srv(10, 5, 5060, "a.example.org.", 300)]);

    let reconciler = Reconciler::new(zone.clone());
    let observed = reconciler.read(&name).await.unwrap();
    assert!(observed.is_empty());
    assert_eq!(observed.ttl, None);

    let desired = set_of(&[srv(20, 5, 5060, "b.example.org.", 300)]);
    let outcome = reconciler.reconcile(&name, &desired, 300).await.unwrap();

    let message = outcome.message.expect("the owner holds nothing yet");
    assert!(message.removals().is_empty());
    assert_eq!(message.insertions().len(), 1);

    // The alias target is left untouched and never reported as this set
    assert_eq!(zone.records(backend), vec![srv(10, 5, 5060, "a.example.org.", 300)]);
    assert!(outcome.current.records.iter().all(|r| r.target != "a.example.org."));
    assert_eq!(
        zone.records(&name.owner_name()),
        vec![srv(20, 5, 5060, "b.example.org.", 300)]
    );
}

#[tokio::test]
async fn lookup_follows_an_alias_to_its_target() {
    let zone = Arc::new(ZoneExchange::new());
    let backend = "_sip._udp.backend.example.org.";
    zone.alias("_sip._udp.example.org.", backend);
    zone.seed(
        backend,
        vec![
            srv(20, 5, 5060, "b.example.org.", 300),
            srv(10, 5, 5060, "a.example.org.", 300),
        ],
    );

    let result = Reconciler::new(zone.clone())
        .lookup("_sip", "_udp", "example.org")
        .await
        .unwrap();

    assert_eq!(result.name, backend);
    let targets: Vec<_> = result.records.iter().map(|r| r.target.as_str()).collect();
    assert_eq!(targets, vec!["a.example.org.", "b.example.org."]);
    assert_eq!(zone.update_count(), 0);
}
