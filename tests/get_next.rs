//! GET and GETNEXT through the command processor.

mod common;

use std::sync::Arc;

use async_snmp_agent::object::Scalar;
use async_snmp_agent::pdu::Pdu;
use async_snmp_agent::registry::Registry;
use async_snmp_agent::{ErrorStatus, Scope, Value, oid};
use common::*;

#[tokio::test]
async fn get_from_empty_registry_is_no_such_object() {
    let mut harness = Harness::new(Arc::new(Registry::new()));

    let response = harness.v2c(Pdu::get_request(1, &[sys_descr()])).await.unwrap();

    assert_eq!(response.error_status(), ErrorStatus::NoError);
    assert_eq!(response.varbinds[0].oid, sys_descr());
    assert_eq!(response.varbinds[0].value, Value::NoSuchObject);
    assert!(harness.registry.lock_table().is_empty());
    assert_eq!(harness.processor.pending_requests(), 0);
}

#[tokio::test]
async fn get_mixed_hits_and_misses() {
    let mut harness = Harness::new(agent_registry());

    let response = harness
        .v2c(Pdu::get_request(2, &[sys_descr(), nonexistent_oid(), sys_name()]))
        .await
        .unwrap();

    assert_eq!(response.varbinds[0].value, Value::from("test agent"));
    assert_eq!(response.varbinds[1].value, Value::NoSuchObject);
    assert_eq!(response.varbinds[2].value, Value::from("edge-1"));
}

#[tokio::test]
async fn get_wrong_instance_is_no_such_instance() {
    let mut harness = Harness::new(agent_registry());

    let response = harness
        .v2c(Pdu::get_request(3, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 1)]))
        .await
        .unwrap();

    assert_eq!(response.varbinds[0].value, Value::NoSuchInstance);
}

#[tokio::test]
async fn get_fault_only_affects_its_varbind() {
    let log = call_log();
    let registry = Registry::new();
    registry
        .register(
            Arc::new(RecordingObject::new(sys_descr(), Value::from("a"), &log).failing_get()),
            None,
        )
        .unwrap();
    registry
        .register(Arc::new(RecordingObject::new(sys_name(), Value::from("b"), &log)), None)
        .unwrap();
    let mut harness = Harness::new(Arc::new(registry));

    let response = harness
        .v2c(Pdu::get_request(4, &[sys_descr(), sys_name()]))
        .await
        .unwrap();

    assert_eq!(response.error_status(), ErrorStatus::GenErr);
    assert_eq!(response.error_index, 1);
    assert_eq!(response.varbinds[1].value, Value::from("b"));
}

#[tokio::test]
async fn get_next_exact_scope_scenario() {
    let registry = Registry::new();
    let instance = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
    let log = call_log();
    registry
        .register(
            Arc::new(RecordingObject::new(instance.clone(), Value::from("router"), &log)),
            None,
        )
        .unwrap();
    assert_eq!(
        registry.iterate()[0].scope.lower_bound(),
        Scope::point(instance.clone()).lower_bound()
    );
    let mut harness = Harness::new(Arc::new(registry));

    let response = harness
        .v2c(Pdu::get_next_request(5, &[oid!(1, 3, 6, 1, 2, 1, 1, 1)]))
        .await
        .unwrap();
    assert_eq!(response.varbinds[0].oid, instance);
    assert_eq!(response.varbinds[0].value, Value::from("router"));

    let response = harness
        .v2c(Pdu::get_next_request(6, &[instance.clone()]))
        .await
        .unwrap();
    assert_eq!(response.varbinds[0].oid, instance);
    assert_eq!(response.varbinds[0].value, Value::EndOfMibView);
}

#[tokio::test]
async fn get_next_walks_the_whole_registry() {
    let mut harness = Harness::new(agent_registry());

    let mut current = oid!(1, 3);
    let mut walked = Vec::new();
    for request_id in 1.. {
        let response = harness
            .v2c(Pdu::get_next_request(request_id, &[current.clone()]))
            .await
            .unwrap();
        let vb = &response.varbinds[0];
        if vb.value == Value::EndOfMibView {
            break;
        }
        assert!(vb.oid > current, "walk must advance");
        walked.push(vb.oid.clone());
        current = vb.oid.clone();
    }

    // five system scalars, four ifDescr, four ifInOctets
    assert_eq!(walked.len(), 13);
    assert_eq!(walked[0], sys_descr());
    assert_eq!(walked[5], if_descr().child(1));
    assert_eq!(walked[12], if_in_octets().child(4));
}

#[tokio::test]
async fn get_next_crosses_object_boundaries() {
    let mut harness = Harness::new(agent_registry());

    let response = harness
        .v2c(Pdu::get_next_request(7, &[sys_descr(), if_descr().child(4)]))
        .await
        .unwrap();

    assert_eq!(response.varbinds[0].oid, sys_uptime());
    assert_eq!(response.varbinds[1].oid, if_in_octets().child(1));
    assert_eq!(response.varbinds[1].value, Value::Counter32(1000));
}

#[tokio::test]
async fn v1_get_missing_maps_to_no_such_name() {
    let mut harness = Harness::new(agent_registry());

    let response = harness
        .v1(Pdu::get_request(8, &[sys_descr(), nonexistent_oid()]))
        .await
        .unwrap();

    assert_eq!(response.error_status(), ErrorStatus::NoSuchName);
    assert_eq!(response.error_index, 2);
    assert_eq!(response.varbinds[1].value, Value::Null);
}

#[tokio::test]
async fn v1_get_next_past_the_end_is_no_such_name() {
    let mut harness = Harness::new(agent_registry());

    let response = harness
        .v1(Pdu::get_next_request(9, &[oid!(1, 3, 6, 1, 9)]))
        .await
        .unwrap();

    assert_eq!(response.error_status(), ErrorStatus::NoSuchName);
    assert_eq!(response.error_index, 1);
}

#[tokio::test]
async fn v1_get_next_never_returns_counter64() {
    let registry = Registry::new();
    registry
        .register(
            Arc::new(Scalar::read_only(
                oid!(1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 6, 0),
                Value::Counter64(u64::MAX),
            )),
            None,
        )
        .unwrap();
    registry
        .register(
            Arc::new(Scalar::read_only(
                oid!(1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 7, 0),
                Value::Counter32(9),
            )),
            None,
        )
        .unwrap();
    let mut harness = Harness::new(Arc::new(registry));

    let response = harness
        .v1(Pdu::get_next_request(10, &[oid!(1, 3, 6, 1, 2, 1, 31)]))
        .await
        .unwrap();
    assert_eq!(response.varbinds[0].oid, oid!(1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 7, 0));
    assert_eq!(response.varbinds[0].value, Value::Counter32(9));

    let response = harness
        .v2c(Pdu::get_next_request(11, &[oid!(1, 3, 6, 1, 2, 1, 31)]))
        .await
        .unwrap();
    assert_eq!(response.varbinds[0].value, Value::Counter64(u64::MAX));
}
