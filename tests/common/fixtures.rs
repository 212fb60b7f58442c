//! Common test fixtures and constants.

use std::sync::Arc;

use async_snmp_agent::object::{Scalar, SubtreeObject};
use async_snmp_agent::registry::Registry;
use async_snmp_agent::{Oid, Value, oid};

// =============================================================================
// Standard system MIB OIDs (1.3.6.1.2.1.1.*)
// =============================================================================

pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}
pub fn sys_object_id() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 2, 0)
}
pub fn sys_uptime() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
}
pub fn sys_contact() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 4, 0)
}
pub fn sys_name() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)
}
pub fn sys_location() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 6, 0)
}

// =============================================================================
// Subtree roots
// =============================================================================

/// System subtree root: 1.3.6.1.2.1.1
pub fn system_subtree() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1)
}

/// ifDescr column: 1.3.6.1.2.1.2.2.1.2
pub fn if_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2)
}

/// ifInOctets column: 1.3.6.1.2.1.2.2.1.10
pub fn if_in_octets() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 10)
}

/// Writable test table root under a private enterprise: 1.3.6.1.4.1.99999.1
pub fn test_table() -> Oid {
    oid!(1, 3, 6, 1, 4, 1, 99999, 1)
}

/// Nonexistent OID for testing noSuchObject
pub fn nonexistent_oid() -> Oid {
    oid!(1, 3, 6, 1, 99, 99, 99, 0)
}

// =============================================================================
// Populated registries
// =============================================================================

/// sysDescr, sysUpTime (read-only), sysContact, sysName, sysLocation
/// (read-write).
pub fn system_objects(registry: &Registry) {
    registry
        .register(Arc::new(Scalar::read_only(sys_descr(), Value::from("test agent"))), None)
        .unwrap();
    registry
        .register(Arc::new(Scalar::read_only(sys_uptime(), Value::TimeTicks(12345))), None)
        .unwrap();
    registry
        .register(Arc::new(Scalar::read_write(sys_contact(), Value::from("ops@example.net"))), None)
        .unwrap();
    registry
        .register(Arc::new(Scalar::read_write(sys_name(), Value::from("edge-1"))), None)
        .unwrap();
    registry
        .register(Arc::new(Scalar::read_write(sys_location(), Value::from("rack 4"))), None)
        .unwrap();
}

/// ifDescr and ifInOctets for `count` interfaces.
pub fn interface_columns(registry: &Registry, count: u32) {
    let descr = SubtreeObject::new(if_descr());
    let octets = SubtreeObject::new(if_in_octets());
    for index in 1..=count {
        descr.insert(if_descr().child(index), Value::from(format!("eth{}", index - 1)));
        octets.insert(if_in_octets().child(index), Value::Counter32(index * 1000));
    }
    registry.register(Arc::new(descr), None).unwrap();
    registry.register(Arc::new(octets), None).unwrap();
}

/// A registry with the system scalars and four interfaces.
pub fn agent_registry() -> Arc<Registry> {
    let registry = Registry::new();
    system_objects(&registry);
    interface_columns(&registry, 4);
    Arc::new(registry)
}
