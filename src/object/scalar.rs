//! Scalar managed objects.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{BoxFuture, ManagedObject, ObjectResult};
use crate::error::ErrorStatus;
use crate::oid::Oid;
use crate::request::{RequestContext, SubRequest};
use crate::scope::Scope;
use crate::value::Value;

/// Checks a new value during PREPARE. Return the status to reject it with.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), ErrorStatus> + Send + Sync>;

/// A single-instance object such as `sysDescr.0`.
///
/// The object is registered under the subtree of its object identifier
/// (the instance OID without its trailing `.0`), so a GET for any other
/// instance of the same object answers `noSuchInstance` rather than
/// `noSuchObject`.
///
/// A writable scalar accepts SET values of the same syntax as its current
/// value, optionally checked by a [`Validator`]. COMMIT records the old
/// value for UNDO.
pub struct Scalar {
    instance: Oid,
    scope: Scope,
    value: RwLock<Value>,
    writable: bool,
    validator: Option<Validator>,
}

impl Scalar {
    fn build(instance: Oid, value: Value, writable: bool) -> Self {
        let object = instance.parent().unwrap_or_else(|| instance.clone());
        Self {
            scope: Scope::subtree(object),
            instance,
            value: RwLock::new(value),
            writable,
            validator: None,
        }
    }

    /// A scalar that rejects SET with `notWritable`.
    pub fn read_only(instance: Oid, value: Value) -> Self {
        Self::build(instance, value, false)
    }

    pub fn read_write(instance: Oid, value: Value) -> Self {
        Self::build(instance, value, true)
    }

    /// Check SET values with `validator` after the syntax check.
    pub fn with_validator(
        mut self,
        validator: impl Fn(&Value) -> Result<(), ErrorStatus> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn instance(&self) -> &Oid {
        &self.instance
    }

    pub fn value(&self) -> Value {
        self.value.read().clone()
    }

    /// Replace the value outside of a SET, e.g. from a polling task.
    pub fn set(&self, value: Value) {
        *self.value.write() = value;
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scalar")
            .field("instance", &self.instance)
            .field("value", &*self.value.read())
            .field("writable", &self.writable)
            .finish()
    }
}

impl ManagedObject for Scalar {
    fn scope(&self) -> Scope {
        self.scope.clone()
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
            if sub.oid() == &self.instance {
                sub.set_value(self.value());
            } else {
                sub.set_value(Value::NoSuchInstance);
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
            if !self.writable {
                sub.set_error(ErrorStatus::NotWritable);
            } else if sub.oid() != &self.instance {
                sub.set_error(ErrorStatus::NoCreation);
            } else if !sub.value().same_syntax(&self.value.read()) {
                sub.set_error(ErrorStatus::WrongType);
            } else if let Some(Err(status)) =
                self.validator.as_ref().map(|check| check(sub.value()))
            {
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
            let previous = std::mem::replace(&mut *self.value.write(), sub.value().clone());
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
            if let Some(previous) = sub.take_undo_value() {
                self.set(previous);
            }
            Ok(())
        })
    }
}
