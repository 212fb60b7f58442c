//! SET two-phase commit: atomicity, rollback and cleanup.

mod common;

use std::sync::Arc;

use async_snmp_agent::Error;
use async_snmp_agent::pdu::Pdu;
use async_snmp_agent::registry::Registry;
use async_snmp_agent::transport::RequestEvent;
use async_snmp_agent::varbind::VarBind;
use async_snmp_agent::{ErrorStatus, Oid, Value, Version};
use common::*;

fn instances() -> [Oid; 3] {
    [test_table().child(1), test_table().child(2), test_table().child(3)]
}

struct Setup {
    harness: Harness,
    objects: Vec<Arc<RecordingObject>>,
    log: CallLog,
}

/// Three recording objects; the one at `broken` is shaped by `configure`.
fn setup<F>(broken: Option<usize>, configure: F) -> Setup
where
    F: Fn(RecordingObject) -> RecordingObject,
{
    let log = call_log();
    let registry = Registry::new();
    let mut objects = Vec::new();
    for (i, oid) in instances().into_iter().enumerate() {
        let mut object = RecordingObject::new(oid, Value::Integer(0), &log);
        if broken == Some(i) {
            object = configure(object);
        }
        let object = Arc::new(object);
        registry.register(object.clone(), None).unwrap();
        objects.push(object);
    }
    Setup {
        harness: Harness::new(Arc::new(registry)),
        objects,
        log,
    }
}

fn set_all(request_id: i32, value: i32) -> Pdu {
    Pdu::set_request(
        request_id,
        instances()
            .into_iter()
            .map(|oid| VarBind::new(oid, Value::Integer(value)))
            .collect(),
    )
}

#[tokio::test]
async fn all_prepared_before_any_commit() {
    let mut s = setup(None, |o| o);

    let response = s.harness.v2c(set_all(1, 7)).await.unwrap();

    assert_eq!(response.error_status(), ErrorStatus::NoError);
    for object in &s.objects {
        assert_eq!(object.value(), Value::Integer(7));
    }
    let names: Vec<_> = s.log.lock().iter().map(|(name, _)| *name).collect();
    assert_eq!(
        names,
        vec![
            "prepare", "prepare", "prepare", "commit", "commit", "commit", "cleanup", "cleanup",
            "cleanup"
        ]
    );
    assert!(s.harness.registry.lock_table().is_empty());
}

#[tokio::test]
async fn prepare_rejection_leaves_everything_untouched() {
    let mut s = setup(Some(1), |o| o.rejecting(ErrorStatus::WrongValue));

    let response = s.harness.v2c(set_all(2, 7)).await.unwrap();

    assert_eq!(response.error_status(), ErrorStatus::WrongValue);
    assert_eq!(response.error_index, 2);
    for object in &s.objects {
        assert_eq!(object.value(), Value::Integer(0));
    }
    let [first, second, third] = instances();
    assert_eq!(calls_for(&s.log, &first), vec!["prepare", "undo", "cleanup"]);
    assert_eq!(calls_for(&s.log, &second), vec!["prepare", "cleanup"]);
    assert!(calls_for(&s.log, &third).is_empty());
    assert!(s.harness.registry.lock_table().is_empty());
}

#[tokio::test]
async fn commit_failure_rolls_back_committed_values() {
    let mut s = setup(Some(2), RecordingObject::failing_commit);

    let response = s.harness.v2c(set_all(3, 9)).await.unwrap();

    assert_eq!(response.error_status(), ErrorStatus::CommitFailed);
    assert_eq!(response.error_index, 3);
    for object in &s.objects {
        assert_eq!(object.value(), Value::Integer(0));
    }
    let [first, _, third] = instances();
    assert_eq!(calls_for(&s.log, &first), vec!["prepare", "commit", "undo", "cleanup"]);
    assert_eq!(calls_for(&s.log, &third), vec!["prepare", "commit", "undo", "cleanup"]);
    assert!(s.harness.registry.lock_table().is_empty());
}

#[tokio::test]
async fn commit_fault_is_forwarded_when_configured() {
    let log = call_log();
    let registry = Arc::new(Registry::new());
    registry
        .register(
            Arc::new(
                RecordingObject::new(test_table().child(1), Value::Integer(0), &log)
                    .failing_commit(),
            ),
            None,
        )
        .unwrap();
    let mut harness = Harness::with(registry, |b| b.forward_instrumentation_errors(true));

    let pdu = Pdu::set_request(4, vec![VarBind::new(test_table().child(1), Value::Integer(1))]);
    let result = harness
        .processor
        .process_pdu(RequestEvent::community(Version::V2c, "public", peer(), pdu))
        .await;

    match result {
        Err(Error::Instrumentation { oid, .. }) => assert_eq!(oid, test_table().child(1)),
        other => panic!("expected instrumentation error, got {other:?}"),
    }
    // Rollback and cleanup still ran; no response is sent.
    assert_eq!(
        calls_for(&log, &test_table().child(1)),
        vec!["prepare", "commit", "undo", "cleanup"]
    );
    assert!(harness.responses.try_recv().is_err());
    assert!(harness.registry.lock_table().is_empty());
    assert_eq!(harness.processor.pending_requests(), 0);
}

#[tokio::test]
async fn unknown_instance_is_no_creation() {
    let mut harness = Harness::new(agent_registry());

    let pdu = Pdu::set_request(5, vec![VarBind::new(nonexistent_oid(), Value::Integer(1))]);
    let response = harness.v2c(pdu).await.unwrap();

    assert_eq!(response.error_status(), ErrorStatus::NoCreation);
    assert_eq!(response.error_index, 1);
}

#[tokio::test]
async fn scalar_checks_map_to_error_statuses() {
    let mut harness = Harness::new(agent_registry());

    let pdu = Pdu::set_request(6, vec![VarBind::new(sys_descr(), Value::from("new"))]);
    let response = harness.v2c(pdu).await.unwrap();
    assert_eq!(response.error_status(), ErrorStatus::NotWritable);

    let pdu = Pdu::set_request(7, vec![VarBind::new(sys_name(), Value::Integer(5))]);
    let response = harness.v2c(pdu).await.unwrap();
    assert_eq!(response.error_status(), ErrorStatus::WrongType);

    let pdu = Pdu::set_request(8, vec![VarBind::new(sys_name(), Value::from("core-2"))]);
    let response = harness.v2c(pdu).await.unwrap();
    assert_eq!(response.error_status(), ErrorStatus::NoError);
    assert_eq!(response.varbinds[0].value, Value::from("core-2"));

    let response = harness.v2c(Pdu::get_request(9, &[sys_name()])).await.unwrap();
    assert_eq!(response.varbinds[0].value, Value::from("core-2"));
}

#[tokio::test]
async fn v1_set_error_statuses_are_mapped() {
    let mut harness = Harness::new(agent_registry());

    let pdu = Pdu::set_request(10, vec![VarBind::new(sys_descr(), Value::from("new"))]);
    let response = harness.v1(pdu).await.unwrap();
    assert_eq!(response.error_status(), ErrorStatus::NoSuchName);
    assert_eq!(response.error_index, 1);

    let pdu = Pdu::set_request(11, vec![VarBind::new(sys_name(), Value::Integer(5))]);
    let response = harness.v1(pdu).await.unwrap();
    assert_eq!(response.error_status(), ErrorStatus::BadValue);

    let pdu = Pdu::set_request(12, vec![VarBind::new(nonexistent_oid(), Value::Integer(1))]);
    let response = harness.v1(pdu).await.unwrap();
    assert_eq!(response.error_status(), ErrorStatus::NoSuchName);
}
