//! Table-like managed objects serving many instances under one root.

use std::fmt;

use parking_lot::RwLock;

use super::{BoxFuture, ManagedObject, ObjectResult, OidTable};
use crate::error::ErrorStatus;
use crate::oid::Oid;
use crate::request::{RequestContext, SubRequest};
use crate::scope::Scope;
use crate::value::Value;

/// Instances under a common root OID, e.g. the columns of a table.
///
/// Registered under `Scope::subtree(root)`. Writable subtrees accept SET
/// for existing instances with a value of the same syntax; with creation
/// enabled they also accept new instances under the root.
///
/// COMMIT records the previous value for UNDO, or `Null` when the instance
/// was created, so that UNDO removes it again.
pub struct SubtreeObject {
    root: Oid,
    instances: RwLock<OidTable<Value>>,
    writable: bool,
    creatable: bool,
}

impl SubtreeObject {
    pub fn new(root: Oid) -> Self {
        Self {
            root,
            instances: RwLock::new(OidTable::new()),
            writable: false,
            creatable: false,
        }
    }

    /// Accept SET for existing instances.
    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    /// Accept SET for new instances too.
    pub fn creatable(mut self) -> Self {
        self.writable = true;
        self.creatable = true;
        self
    }

    /// Add an instance. `oid` must lie under the root.
    pub fn with(self, oid: Oid, value: Value) -> Self {
        self.insert(oid, value);
        self
    }

    pub fn root(&self) -> &Oid {
        &self.root
    }

    /// Insert or replace an instance. Instances outside the root are ignored.
    pub fn insert(&self, oid: Oid, value: Value) -> Option<Value> {
        if !oid.starts_with(&self.root) || oid == self.root {
            tracing::debug!(
                target: "async_snmp_agent::registry",
                { %oid, root = %self.root },
                "instance outside subtree ignored"
            );
            return None;
        }
        self.instances.write().insert(oid, value)
    }

    pub fn remove(&self, oid: &Oid) -> Option<Value> {
        self.instances.write().remove(oid)
    }

    pub fn get_value(&self, oid: &Oid) -> Option<Value> {
        self.instances.read().get(oid).cloned()
    }

    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}

impl fmt::Debug for SubtreeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubtreeObject")
            .field("root", &self.root)
            .field("instances", &self.len())
            .field("writable", &self.writable)
            .field("creatable", &self.creatable)
            .finish()
    }
}

impl ManagedObject for SubtreeObject {
    fn scope(&self) -> Scope {
        Scope::subtree(self.root.clone())
    }

    fn find(&self, range: &Scope) -> Option<Oid> {
        self.instances.read().first_in(range).map(|(oid, _)| oid.clone())
    }

    fn get<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        sub: &'a mut SubRequest,
    ) -> BoxFuture<'a, ObjectResult> {
        Box::pin(async move {
            let value = self.get_value(sub.oid()).unwrap_or(Value::NoSuchInstance);
            sub.set_value(value);
            Ok(())
        })
    }

    fn next<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        sub: &'a mut SubRequest,
    ) -> BoxFuture<'a, ObjectResult<bool>> {
        Box::pin(async move {
            let found = self
                .instances
                .read()
                .first_in(sub.scope())
                .map(|(oid, value)| (oid.clone(), value.clone()));
            match found {
                Some((oid, value)) => {
                    sub.set_varbind(oid, value);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn prepare<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        sub: &'a mut SubRequest,
    ) -> BoxFuture<'a, ObjectResult> {
        Box::pin(async move {
            if !self.writable {
                sub.set_error(ErrorStatus::NotWritable);
                return Ok(());
            }
            if matches!(sub.value(), Value::Null) || sub.value().is_exception() {
                sub.set_error(ErrorStatus::WrongType);
                return Ok(());
            }
            match self.get_value(sub.oid()) {
                Some(current) if !current.same_syntax(sub.value()) => {
                    sub.set_error(ErrorStatus::WrongType);
                }
                Some(_) => {}
                None if !self.creatable => sub.set_error(ErrorStatus::NoCreation),
                None if sub.oid() == &self.root => sub.set_error(ErrorStatus::InconsistentName),
                None => {}
            }
            Ok(())
        })
    }

    fn commit<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        sub: &'a mut SubRequest,
    ) -> BoxFuture<'a, ObjectResult> {
        Box::pin(async move {
            let previous = self.insert(sub.oid().clone(), sub.value().clone());
            sub.set_undo_value(previous.unwrap_or(Value::Null));
            Ok(())
        })
    }

    fn undo<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        sub: &'a mut SubRequest,
    ) -> BoxFuture<'a, ObjectResult> {
        Box::pin(async move {
            match sub.take_undo_value() {
                Some(Value::Null) => {
                    self.remove(sub.oid());
                }
                Some(previous) => {
                    self.insert(sub.oid().clone(), previous);
                }
                None => {}
            }
            Ok(())
        })
    }
}
