//! Managed objects that record and misbehave on demand.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_snmp_agent::object::{BoxFuture, ManagedObject, ObjectError, ObjectResult};
use async_snmp_agent::request::{RequestContext, SubRequest};
use async_snmp_agent::{ErrorStatus, Oid, Scope, Value};
use parking_lot::Mutex;

/// Callback name and OID, in call order.
pub type CallLog = Arc<Mutex<Vec<(&'static str, Oid)>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Callback names recorded for `oid`.
pub fn calls_for(log: &CallLog, oid: &Oid) -> Vec<&'static str> {
    log.lock()
        .iter()
        .filter(|(_, called)| called == oid)
        .map(|(name, _)| *name)
        .collect()
}

/// A writable single instance registered at its exact OID, recording every
/// callback.
pub struct RecordingObject {
    instance: Oid,
    value: Mutex<Value>,
    log: CallLog,
    reject: Option<ErrorStatus>,
    commit_fault: bool,
    get_fault: bool,
}

impl RecordingObject {
    pub fn new(instance: Oid, value: Value, log: &CallLog) -> Self {
        Self {
            instance,
            value: Mutex::new(value),
            log: Arc::clone(log),
            reject: None,
            commit_fault: false,
            get_fault: false,
        }
    }

    /// Fail PREPARE with `status`.
    pub fn rejecting(mut self, status: ErrorStatus) -> Self {
        self.reject = Some(status);
        self
    }

    /// Raise an instrumentation fault in COMMIT.
    pub fn failing_commit(mut self) -> Self {
        self.commit_fault = true;
        self
    }

    /// Raise an instrumentation fault in GET.
    pub fn failing_get(mut self) -> Self {
        self.get_fault = true;
        self
    }

    pub fn value(&self) -> Value {
        self.value.lock().clone()
    }

    fn record(&self, name: &'static str) {
        self.log.lock().push((name, self.instance.clone()));
    }
}

impl ManagedObject for RecordingObject {
    fn scope(&self) -> Scope {
        Scope::point(self.instance.clone())
    }

    fn find(&self, range: &Scope) -> Option<Oid> {
        range.contains(&self.instance).then(|| self.instance.clone())
    }

    fn get<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        sub: &'a mut SubRequest,
    ) -> BoxFuture<'a, ObjectResult> {
        Box::pin(async move {
            self.record("get");
            if self.get_fault {
                return Err(ObjectError::new("sensor offline"));
            }
            sub.set_value(self.value());
            Ok(())
        })
    }

    fn next<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        sub: &'a mut SubRequest,
    ) -> BoxFuture<'a, ObjectResult<bool>> {
        Box::pin(async move {
            self.record("next");
            if !sub.scope().contains(&self.instance) {
                return Ok(false);
            }
            sub.set_varbind(self.instance.clone(), self.value());
            Ok(true)
        })
    }

    fn prepare<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        sub: &'a mut SubRequest,
    ) -> BoxFuture<'a, ObjectResult> {
        Box::pin(async move {
            self.record("prepare");
            if let Some(status) = self.reject {
                sub.set_error(status);
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
            self.record("commit");
            if self.commit_fault {
                return Err(ObjectError::new("storage unavailable"));
            }
            let previous = std::mem::replace(&mut *self.value.lock(), sub.value().clone());
            sub.set_undo_value(previous);
            Ok(())
        })
    }

    fn undo<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        sub: &'a mut SubRequest,
    ) -> BoxFuture<'a, ObjectResult> {
        Box::pin(async move {
            self.record("undo");
            if let Some(previous) = sub.take_undo_value() {
                *self.value.lock() = previous;
            }
            Ok(())
        })
    }

    fn cleanup<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _sub: &'a mut SubRequest,
    ) -> BoxFuture<'a, ObjectResult> {
        Box::pin(async move {
            self.record("cleanup");
            Ok(())
        })
    }
}

/// A read-only instance that defers its first `deferrals` GETs.
pub struct DeferringObject {
    instance: Oid,
    value: Value,
    remaining: AtomicUsize,
}

impl DeferringObject {
    pub fn new(instance: Oid, value: Value, deferrals: usize) -> Self {
        Self {
            instance,
            value,
            remaining: AtomicUsize::new(deferrals),
        }
    }
}

impl ManagedObject for DeferringObject {
    fn scope(&self) -> Scope {
        Scope::point(self.instance.clone())
    }

    fn find(&self, range: &Scope) -> Option<Oid> {
        range.contains(&self.instance).then(|| self.instance.clone())
    }

    fn get<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        sub: &'a mut SubRequest,
    ) -> BoxFuture<'a, ObjectResult> {
        Box::pin(async move {
            let pending = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if pending {
                sub.defer();
            } else {
                sub.set_value(self.value.clone());
            }
            Ok(())
        })
    }

    fn next<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        sub: &'a mut SubRequest,
    ) -> BoxFuture<'a, ObjectResult<bool>> {
        Box::pin(async move {
            if !sub.scope().contains(&self.instance) {
                return Ok(false);
            }
            sub.set_varbind(self.instance.clone(), self.value.clone());
            Ok(true)
        })
    }
}
