//! Per-object locks: reentrancy, timeouts, and their effect on requests.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_snmp_agent::object::ManagedObject;
use async_snmp_agent::pdu::Pdu;
use async_snmp_agent::registry::{AlwaysLock, Registry};
use async_snmp_agent::request::TransactionId;
use async_snmp_agent::transport::RequestEvent;
use async_snmp_agent::varbind::VarBind;
use async_snmp_agent::{ErrorStatus, Oid, Value, Version};
use common::*;

fn recording(registry: &Registry, oid: Oid, log: &CallLog) -> Arc<dyn ManagedObject> {
    let object: Arc<dyn ManagedObject> =
        Arc::new(RecordingObject::new(oid, Value::Integer(0), log));
    registry.register(Arc::clone(&object), None).unwrap();
    object
}

fn set(request_id: i32, oid: Oid, value: i32) -> Pdu {
    Pdu::set_request(request_id, vec![VarBind::new(oid, Value::Integer(value))])
}

#[tokio::test]
async fn lock_is_reentrant_for_its_owner() {
    let registry = Registry::new();
    let object = recording(&registry, test_table().child(1), &call_log());
    let owner = TransactionId::next();
    let other = TransactionId::next();

    assert!(registry.try_lock(owner, &object));
    assert!(registry.try_lock(owner, &object));
    assert!(!registry.try_lock(other, &object));
    assert!(!registry.unlock(other, &object));

    assert!(registry.unlock(owner, &object));
    assert!(registry.is_locked(&object));
    assert!(registry.unlock(owner, &object));
    assert!(!registry.is_locked(&object));
}

#[tokio::test]
async fn lock_wait_gives_up_after_timeout() {
    let registry = Registry::new();
    let object = recording(&registry, test_table().child(1), &call_log());
    let holder = TransactionId::next();
    assert!(registry.try_lock(holder, &object));

    let started = Instant::now();
    let acquired = registry
        .lock(TransactionId::next(), &object, Duration::from_millis(50))
        .await;

    assert!(!acquired);
    assert!(started.elapsed() >= Duration::from_millis(50));
    let id = registry.iterate()[0].id();
    assert_eq!(registry.lock_table().holder(id), Some(holder));
}

#[tokio::test]
async fn release_locks_drops_every_acquisition() {
    let registry = Registry::new();
    let log = call_log();
    let a = recording(&registry, test_table().child(1), &log);
    let b = recording(&registry, test_table().child(2), &log);
    let owner = TransactionId::next();

    assert!(registry.try_lock(owner, &a));
    assert!(registry.try_lock(owner, &a));
    assert!(registry.try_lock(owner, &b));

    assert_eq!(registry.release_locks(owner), 2);
    assert!(!registry.is_locked(&a));
    assert!(!registry.is_locked(&b));
}

#[tokio::test]
async fn set_waits_for_lock_released_in_time() {
    let log = call_log();
    let registry = Arc::new(Registry::new());
    let object = recording(&registry, test_table().child(1), &log);
    let holder = TransactionId::next();
    assert!(registry.try_lock(holder, &object));

    let releaser = {
        let registry = Arc::clone(&registry);
        let object = Arc::clone(&object);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            registry.unlock(holder, &object);
        })
    };

    let mut harness =
        Harness::with(Arc::clone(&registry), |b| b.lock_timeout(Duration::from_secs(2)));
    let response = harness.v2c(set(1, test_table().child(1), 5)).await.unwrap();
    releaser.await.unwrap();

    assert_eq!(response.error_status(), ErrorStatus::NoError);
    assert_eq!(
        calls_for(&log, &test_table().child(1)),
        vec!["prepare", "commit", "cleanup"]
    );
    assert!(!registry.is_locked(&object));
}

#[tokio::test]
async fn set_blocked_by_lock_is_parked_and_resumed() {
    let log = call_log();
    let registry = Arc::new(Registry::new());
    let object = recording(&registry, test_table().child(1), &log);
    let holder = TransactionId::next();
    assert!(registry.try_lock(holder, &object));

    let mut harness =
        Harness::with(Arc::clone(&registry), |b| b.lock_timeout(Duration::from_millis(50)));
    assert!(harness.v2c(set(2, test_table().child(1), 5)).await.is_none());
    assert_eq!(harness.processor.pending_requests(), 1);
    assert!(calls_for(&log, &test_table().child(1)).is_empty());

    registry.unlock(holder, &object);
    assert_eq!(harness.processor.reprocess_pending().await.unwrap(), 1);

    let (_, response) = harness.responses.try_recv().unwrap();
    assert_eq!(response.pdu.error_status(), ErrorStatus::NoError);
    assert_eq!(harness.processor.pending_requests(), 0);
    assert!(!registry.is_locked(&object));
}

#[tokio::test]
async fn reads_ignore_write_locks_by_default() {
    let log = call_log();
    let registry = Arc::new(Registry::new());
    let object = recording(&registry, test_table().child(1), &log);
    assert!(registry.try_lock(TransactionId::next(), &object));

    let mut harness = Harness::with(registry, |b| b.lock_timeout(Duration::from_millis(50)));
    let response = harness
        .v2c(Pdu::get_request(3, &[test_table().child(1)]))
        .await
        .unwrap();

    assert_eq!(response.varbinds[0].value, Value::Integer(0));
}

#[tokio::test]
async fn always_lock_defers_reads_on_locked_objects() {
    let log = call_log();
    let registry = Arc::new(Registry::new().with_lock_strategy(AlwaysLock));
    let object = recording(&registry, test_table().child(1), &log);
    let holder = TransactionId::next();
    assert!(registry.try_lock(holder, &object));

    let mut harness =
        Harness::with(Arc::clone(&registry), |b| b.lock_timeout(Duration::from_millis(20)));
    assert!(
        harness
            .v2c(Pdu::get_request(4, &[test_table().child(1)]))
            .await
            .is_none()
    );

    registry.unlock(holder, &object);
    harness.processor.reprocess_pending().await.unwrap();
    let (_, response) = harness.responses.try_recv().unwrap();
    assert_eq!(response.pdu.varbinds[0].value, Value::Integer(0));
    // The read released its own lock.
    assert!(!registry.is_locked(&object));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_sets_on_one_object_both_succeed() {
    let log = call_log();
    let registry = Arc::new(Registry::new());
    let object = recording(&registry, test_table().child(1), &log);
    let mut harness =
        Harness::with(Arc::clone(&registry), |b| b.lock_timeout(Duration::from_secs(2)));

    let first = harness.processor.clone();
    let second = harness.processor.clone();
    let event = |request_id, value| {
        RequestEvent::community(
            Version::V2c,
            "public",
            peer(),
            set(request_id, test_table().child(1), value),
        )
    };
    let (a, b) = futures::join!(
        first.process_pdu(event(5, 1)),
        second.process_pdu(event(6, 2)),
    );
    a.unwrap();
    b.unwrap();

    for _ in 0..2 {
        let (_, response) = harness.responses.try_recv().unwrap();
        assert_eq!(response.pdu.error_status(), ErrorStatus::NoError);
    }
    // Each transaction ran its phases without interleaving with the other.
    let names: Vec<_> = calls_for(&log, &test_table().child(1));
    assert_eq!(
        names,
        vec!["prepare", "commit", "cleanup", "prepare", "commit", "cleanup"]
    );
    assert!(!registry.is_locked(&object));
}
