//! Managed objects: the instrumentation the registry routes requests to.
//!
//! A [`ManagedObject`] owns a range of the OID space (its [`Scope`]) and
//! serves the sub-requests that fall into it. The read path
//! ([`get`](ManagedObject::get), [`next`](ManagedObject::next)) is required;
//! the write path (the two-phase commit callbacks) defaults to a read-only
//! object that rejects every SET with `notWritable`.
//!
//! Two building blocks cover most agents:
//!
//! - [`Scalar`]: a single instance (`<object>.0`), read-only or read-write.
//! - [`SubtreeObject`]: a sorted table of instances under one root, backed by
//!   [`OidTable`].

mod oid_table;
mod scalar;
mod subtree;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use oid_table::OidTable;
pub use scalar::{Scalar, Validator};
pub use subtree::SubtreeObject;

use crate::error::ErrorStatus;
use crate::oid::Oid;
use crate::request::{RequestContext, SubRequest};
use crate::scope::Scope;

/// Type alias for boxed async return type (dyn-compatible).
///
/// Object methods return `BoxFuture` so objects can be stored as
/// `Arc<dyn ManagedObject>` in the registry.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A fault raised by instrumentation while serving a sub-request.
///
/// The processor records the fault on the affected sub-request only. Without
/// a status hint it becomes the phase's generic error: `genErr` for reads and
/// PREPARE, `commitFailed` for COMMIT, `undoFailed` for UNDO.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ObjectError {
    status: Option<ErrorStatus>,
    message: Box<str>,
}

impl ObjectError {
    /// A fault without a specific status.
    pub fn new(message: impl Into<Box<str>>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// A fault that should be reported with `status`.
    pub fn with_status(status: ErrorStatus, message: impl Into<Box<str>>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// The status hint, if any.
    pub fn status(&self) -> Option<ErrorStatus> {
        self.status
    }

    /// Status to report, falling back to `default` without a hint.
    pub fn status_or(&self, default: ErrorStatus) -> ErrorStatus {
        match self.status {
            Some(status) if status.is_error() => status,
            _ => default,
        }
    }
}

/// Result type returned by managed-object callbacks.
pub type ObjectResult<T = ()> = Result<T, ObjectError>;

/// Identity of a registered object: the address of its `Arc` allocation.
///
/// Two clones of the same `Arc` share an identity; two equal-looking objects
/// in separate allocations do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Identity of `object`.
    pub fn of(object: &Arc<dyn ManagedObject>) -> Self {
        Self(Arc::as_ptr(object) as *const () as usize)
    }
}

/// Instrumentation for a range of the OID space.
///
/// # Sub-request protocol
///
/// The processor marks a sub-request complete when a callback returns `Ok`,
/// unless the callback called [`SubRequest::defer`]; a deferred sub-request
/// is driven again by
/// [`CommandProcessor::reprocess_pending`](crate::processor::CommandProcessor::reprocess_pending).
/// Protocol errors (`wrongType`, `noCreation`, ...) are reported with
/// [`SubRequest::set_error`] and `Ok(())`. Returning `Err` is reserved for
/// instrumentation faults.
///
/// # GETNEXT
///
/// [`next`](ManagedObject::next) receives a sub-request whose
/// [`scope`](SubRequest::scope) is the range still to be searched. Write the
/// first instance within that range into the sub-request and return
/// `Ok(true)`, or return `Ok(false)` to let the processor move past this
/// object's scope to the next registered object.
///
/// # SET two-phase commit
///
/// 1. [`prepare`](ManagedObject::prepare) validates the new value without
///    making it visible. Called for every varbind before any commit.
/// 2. [`commit`](ManagedObject::commit) applies the value and records the
///    previous one with [`SubRequest::set_undo_value`].
/// 3. [`undo`](ManagedObject::undo) restores the recorded value. It runs for
///    every sub-request that completed PREPARE when a sibling fails.
/// 4. [`cleanup`](ManagedObject::cleanup) always runs last and discards any
///    per-request state.
///
/// # Example
///
/// ```rust
/// use async_snmp_agent::object::{BoxFuture, ManagedObject, ObjectResult};
/// use async_snmp_agent::request::{RequestContext, SubRequest};
/// use async_snmp_agent::{Oid, Scope, Value, oid};
///
/// struct Uptime;
///
/// impl ManagedObject for Uptime {
///     fn scope(&self) -> Scope {
///         Scope::subtree(oid!(1, 3, 6, 1, 2, 1, 1, 3))
///     }
///
///     fn find(&self, range: &Scope) -> Option<Oid> {
///         let instance = oid!(1, 3, 6, 1, 2, 1, 1, 3, 0);
///         range.contains(&instance).then_some(instance)
///     }
///
///     fn get<'a>(
///         &'a self,
///         _ctx: &'a RequestContext,
///         sub: &'a mut SubRequest,
///     ) -> BoxFuture<'a, ObjectResult> {
///         Box::pin(async move {
///             sub.set_value(Value::TimeTicks(4200));
///             Ok(())
///         })
///     }
///
///     fn next<'a>(
///         &'a self,
///         _ctx: &'a RequestContext,
///         sub: &'a mut SubRequest,
///     ) -> BoxFuture<'a, ObjectResult<bool>> {
///         Box::pin(async move {
///             let instance = oid!(1, 3, 6, 1, 2, 1, 1, 3, 0);
///             if !sub.scope().contains(&instance) {
///                 return Ok(false);
///             }
///             sub.set_varbind(instance, Value::TimeTicks(4200));
///             Ok(true)
///         })
///     }
/// }
/// ```
pub trait ManagedObject: Send + Sync + 'static {
    /// The range of OIDs this object answers for.
    ///
    /// Read once, when the object is registered.
    fn scope(&self) -> Scope;

    /// First instance OID within `range`, or `None` if this object has none.
    ///
    /// The registry uses this to authorize GETNEXT candidates before handing
    /// them the sub-request.
    fn find(&self, range: &Scope) -> Option<Oid>;

    /// Serve a GET for the sub-request's OID.
    ///
    /// Set the value, or `noSuchInstance` if the instance does not exist.
    fn get<'a>(&'a self, ctx: &'a RequestContext, sub: &'a mut SubRequest)
    -> BoxFuture<'a, ObjectResult>;

    /// Serve a GETNEXT within the sub-request's scope.
    fn next<'a>(
        &'a self,
        ctx: &'a RequestContext,
        sub: &'a mut SubRequest,
    ) -> BoxFuture<'a, ObjectResult<bool>>;

    /// Validate a SET value (phase 1). Must not make the value visible.
    ///
    /// The default rejects the write with `notWritable`.
    fn prepare<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        sub: &'a mut SubRequest,
    ) -> BoxFuture<'a, ObjectResult> {
        Box::pin(async move {
            sub.set_error(ErrorStatus::NotWritable);
            Ok(())
        })
    }

    /// Apply a prepared SET value (phase 2).
    fn commit<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _sub: &'a mut SubRequest,
    ) -> BoxFuture<'a, ObjectResult> {
        Box::pin(async { Ok(()) })
    }

    /// Roll back a prepared or committed SET value.
    fn undo<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _sub: &'a mut SubRequest,
    ) -> BoxFuture<'a, ObjectResult> {
        Box::pin(async { Ok(()) })
    }

    /// Release per-request state after a SET, whatever its outcome.
    fn cleanup<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _sub: &'a mut SubRequest,
    ) -> BoxFuture<'a, ObjectResult> {
        Box::pin(async { Ok(()) })
    }
}
