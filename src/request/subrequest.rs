//! One variable binding's unit of work.

use std::fmt;
use std::sync::Arc;

use crate::error::ErrorStatus;
use crate::object::ManagedObject;
use crate::oid::Oid;
use crate::scope::Scope;
use crate::value::Value;
use crate::varbind::VarBind;

/// Error status and completion flag for the current phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestStatus {
    /// Error reported for this sub-request, `noError` if none.
    pub error_status: ErrorStatus,
    /// Whether the current phase is done for this sub-request.
    pub phase_complete: bool,
}

/// The work for one variable binding of a request.
///
/// The varbind is rewritten in place as processing proceeds: reads replace
/// the value (and for GETNEXT the OID), SET leaves the requested value in
/// place. The response is built from the varbinds in index order.
pub struct SubRequest {
    index: usize,
    varbind: VarBind,
    scope: Scope,
    status: RequestStatus,
    target: Option<Arc<dyn ManagedObject>>,
    undo_value: Option<Value>,
    prepared: bool,
    deferred: bool,
}

impl SubRequest {
    pub(crate) fn new(index: usize, varbind: VarBind, scope: Scope) -> Self {
        Self {
            index,
            varbind,
            scope,
            status: RequestStatus::default(),
            target: None,
            undo_value: None,
            prepared: false,
            deferred: false,
        }
    }

    /// Zero-based position in the request (and in the response).
    pub fn index(&self) -> usize {
        self.index
    }

    /// OID currently bound to this sub-request.
    pub fn oid(&self) -> &Oid {
        &self.varbind.oid
    }

    /// Value currently bound: the requested value for SET, the result for reads.
    pub fn value(&self) -> &Value {
        &self.varbind.value
    }

    pub fn varbind(&self) -> &VarBind {
        &self.varbind
    }

    /// Range the sub-request addresses: a single point for GET and SET, the
    /// remaining search range for GETNEXT and GETBULK.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub(crate) fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    /// Replace the value, keeping the OID.
    pub fn set_value(&mut self, value: Value) {
        self.varbind.value = value;
    }

    /// Replace OID and value, as a GETNEXT result does.
    pub fn set_varbind(&mut self, oid: Oid, value: Value) {
        self.varbind = VarBind::new(oid, value);
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn error_status(&self) -> ErrorStatus {
        self.status.error_status
    }

    pub fn has_error(&self) -> bool {
        self.status.error_status.is_error()
    }

    /// Report a protocol error for this sub-request. The first error sticks.
    pub fn set_error(&mut self, status: ErrorStatus) {
        if !self.has_error() {
            self.status.error_status = status;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status.phase_complete
    }

    /// Mark the current phase done.
    pub fn complete(&mut self) {
        self.status.phase_complete = true;
        self.deferred = false;
    }

    /// Ask to be driven again later instead of being completed when the
    /// current callback returns.
    pub fn defer(&mut self) {
        self.deferred = true;
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Previous value recorded by COMMIT for UNDO.
    pub fn undo_value(&self) -> Option<&Value> {
        self.undo_value.as_ref()
    }

    pub fn set_undo_value(&mut self, value: Value) {
        self.undo_value = Some(value);
    }

    pub fn take_undo_value(&mut self) -> Option<Value> {
        self.undo_value.take()
    }

    /// Object resolved for this sub-request, if any.
    pub fn target(&self) -> Option<&Arc<dyn ManagedObject>> {
        self.target.as_ref()
    }

    pub(crate) fn set_target(&mut self, object: Arc<dyn ManagedObject>) {
        self.target = Some(object);
    }

    pub(crate) fn take_target(&mut self) -> Option<Arc<dyn ManagedObject>> {
        self.target.take()
    }

    /// Whether PREPARE completed without error.
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub(crate) fn mark_prepared(&mut self) {
        self.prepared = true;
    }

    pub(crate) fn reset_phase(&mut self) {
        self.status.phase_complete = false;
        self.deferred = false;
    }

    pub(crate) fn clear_deferred(&mut self) {
        self.deferred = false;
    }

    /// A sub-request for the next repetition row of a GETBULK, continuing the
    /// search after this one's OID. An exception result carries over
    /// unchanged and completed.
    pub(crate) fn next_repetition(&self, index: usize) -> Self {
        let oid = self.varbind.oid.clone();
        let scope = Scope::after(oid.clone()).with_context(self.scope.context().cloned());
        let mut next = Self::new(index, VarBind::null(oid), scope);
        if self.varbind.value.is_exception() {
            next.varbind.value = self.varbind.value.clone();
            next.complete();
        }
        next
    }
}

impl fmt::Debug for SubRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubRequest")
            .field("index", &self.index)
            .field("varbind", &self.varbind)
            .field("scope", &self.scope)
            .field("status", &self.status)
            .field("has_target", &self.target.is_some())
            .field("prepared", &self.prepared)
            .finish()
    }
}
