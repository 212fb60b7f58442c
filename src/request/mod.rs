//! Requests and their decomposition into sub-requests.
//!
//! A [`Request`] is created for each confirmed PDU the processor accepts.
//! It owns one [`SubRequest`] per variable binding, in order, and for
//! GETBULK grows additional sub-requests row by row through a
//! [`RepetitionCursor`].
//!
//! GET, GETNEXT, and GETBULK run a single [`Phase::Process`]. SET runs the
//! two-phase commit state machine:
//!
//! ```text
//! Init -> Prepare -> Commit -> Cleanup
//! Init -> Prepare -> Undo -> Cleanup        (PREPARE failed after some succeeded)
//! Init -> Prepare -> Cleanup                (PREPARE failed before any succeeded)
//! Init -> Prepare -> Commit -> Undo -> Cleanup
//! ```

mod bulk;
mod context;
mod list;
mod subrequest;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;

pub use bulk::RepetitionCursor;
pub use context::RequestContext;
pub use list::RequestList;
pub use subrequest::{RequestStatus, SubRequest};

use crate::error::ErrorStatus;
use crate::pdu::{Pdu, PduType};
use crate::scope::Scope;
use crate::varbind::{VarBind, varbind_list_size};

/// Identity shared by a request, its sub-requests, and the locks they hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Allocate a process-wide unique transaction ID.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Processing phase of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Created, not yet processed.
    Init,
    /// Single pass of GET, GETNEXT, or GETBULK.
    Process,
    /// SET: validate every value.
    Prepare,
    /// SET: apply every value.
    Commit,
    /// SET: roll back prepared values.
    Undo,
    /// SET: release per-request state. Always the last SET phase.
    Cleanup,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::Process => "process",
            Phase::Prepare => "prepare",
            Phase::Commit => "commit",
            Phase::Undo => "undo",
            Phase::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// GETBULK parameters after correction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct BulkShape {
    pub(crate) non_repeaters: usize,
    pub(crate) max_repetitions: usize,
    pub(crate) repeaters: usize,
}

impl BulkShape {
    /// Clamp negative values to zero and non-repeaters to the varbind count.
    fn corrected(pdu: &Pdu) -> Self {
        let len = pdu.varbinds.len();
        let non_repeaters = usize::try_from(pdu.non_repeaters()).unwrap_or(0).min(len);
        let max_repetitions = usize::try_from(pdu.max_repetitions()).unwrap_or(0);
        Self {
            non_repeaters,
            max_repetitions,
            repeaters: len - non_repeaters,
        }
    }

    /// Upper bound on the number of sub-requests.
    pub(crate) fn capacity(&self) -> usize {
        self.non_repeaters + self.max_repetitions.saturating_mul(self.repeaters)
    }
}

/// A request being processed.
pub struct Request {
    context: Arc<RequestContext>,
    pdu: Pdu,
    subrequests: Vec<SubRequest>,
    phase: Phase,
    error_status: ErrorStatus,
    bulk: Option<BulkShape>,
    bulk_done: bool,
    max_response_size: usize,
    reprocess_count: u32,
    created_at: Instant,
}

impl Request {
    /// Decompose `pdu` into sub-requests.
    ///
    /// GETNEXT and GETBULK sub-requests search the open range after their
    /// OID; GET and SET sub-requests address their OID exactly. All scopes
    /// carry the request's context name.
    pub fn new(context: RequestContext, pdu: Pdu, max_response_size: usize) -> Self {
        let context_name = Some(context.context_name.clone());
        let bulk = (pdu.pdu_type == PduType::GetBulkRequest).then(|| BulkShape::corrected(&pdu));
        let searching = matches!(pdu.pdu_type, PduType::GetNextRequest | PduType::GetBulkRequest);

        let count = match bulk {
            Some(shape) if shape.max_repetitions == 0 => shape.non_repeaters,
            _ => pdu.varbinds.len(),
        };
        let subrequests = pdu
            .varbinds
            .iter()
            .take(count)
            .enumerate()
            .map(|(index, vb)| {
                let scope = if searching {
                    Scope::after(vb.oid.clone())
                } else {
                    Scope::point(vb.oid.clone())
                };
                SubRequest::new(index, vb.clone(), scope.with_context(context_name.clone()))
            })
            .collect();

        Self {
            context: Arc::new(context),
            pdu,
            subrequests,
            phase: Phase::Init,
            error_status: ErrorStatus::NoError,
            bulk,
            bulk_done: false,
            max_response_size,
            reprocess_count: 0,
            created_at: Instant::now(),
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Shared handle to the context, for passing to objects while the
    /// sub-requests are borrowed mutably.
    pub fn context_handle(&self) -> Arc<RequestContext> {
        Arc::clone(&self.context)
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.context.transaction_id
    }

    /// Context name the request addresses.
    pub fn context_name(&self) -> &Bytes {
        &self.context.context_name
    }

    /// The PDU the request was created from.
    pub fn pdu(&self) -> &Pdu {
        &self.pdu
    }

    pub fn pdu_type(&self) -> PduType {
        self.pdu.pdu_type
    }

    pub fn subrequests(&self) -> &[SubRequest] {
        &self.subrequests
    }

    pub fn subrequests_mut(&mut self) -> &mut [SubRequest] {
        &mut self.subrequests
    }

    pub fn len(&self) -> usize {
        self.subrequests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subrequests.is_empty()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// SET requests run the two-phase commit.
    pub fn is_two_phase(&self) -> bool {
        self.pdu.pdu_type == PduType::SetRequest
    }

    /// Advance to the next phase and reset per-sub-request completion.
    ///
    /// Returns `None` once the final phase has been reached.
    pub fn next_phase(&mut self) -> Option<Phase> {
        let next = match self.phase {
            Phase::Init if self.is_two_phase() => Phase::Prepare,
            Phase::Init => Phase::Process,
            Phase::Prepare if self.has_error() => {
                if self.subrequests.iter().any(SubRequest::is_prepared) {
                    Phase::Undo
                } else {
                    Phase::Cleanup
                }
            }
            Phase::Prepare => Phase::Commit,
            Phase::Commit if self.has_error() => Phase::Undo,
            Phase::Commit | Phase::Undo => Phase::Cleanup,
            Phase::Process | Phase::Cleanup => return None,
        };
        self.phase = next;
        for sub in &mut self.subrequests {
            sub.reset_phase();
        }
        Some(next)
    }

    /// Whether every sub-request finished the current phase.
    ///
    /// A request-level error completes any phase. A GETBULK is complete only
    /// once its repetitions are exhausted.
    pub fn is_phase_complete(&self) -> bool {
        if self.error_status.is_error() {
            return true;
        }
        let subs_done = self.subrequests.iter().all(SubRequest::is_complete);
        subs_done && (self.bulk.is_none() || self.bulk_done)
    }

    /// Whether the request has gone through its final phase.
    pub fn is_complete(&self) -> bool {
        let final_phase = if self.is_two_phase() {
            Phase::Cleanup
        } else {
            Phase::Process
        };
        self.phase == final_phase && self.is_phase_complete()
    }

    pub fn has_error(&self) -> bool {
        self.error_status.is_error() || self.subrequests.iter().any(SubRequest::has_error)
    }

    /// Request-level status if set, else that of the first failed sub-request.
    pub fn error_status(&self) -> ErrorStatus {
        if self.error_status.is_error() {
            return self.error_status;
        }
        self.subrequests
            .iter()
            .map(SubRequest::error_status)
            .find(ErrorStatus::is_error)
            .unwrap_or_default()
    }

    /// One-based index of the first failed sub-request, 0 if none.
    pub fn error_index(&self) -> usize {
        self.subrequests
            .iter()
            .position(SubRequest::has_error)
            .map_or(0, |i| i + 1)
    }

    /// Fail the whole request before any sub-request runs.
    ///
    /// The status lands on the first sub-request, or on the request itself
    /// when there are none.
    pub fn fail(&mut self, status: ErrorStatus) {
        match self.subrequests.first_mut() {
            Some(first) => first.set_error(status),
            None => self.error_status = status,
        }
        for sub in &mut self.subrequests {
            sub.complete();
        }
        self.bulk_done = true;
    }

    /// Reset deferred flags before driving the current phase again.
    pub fn reset_processed(&mut self) {
        for sub in &mut self.subrequests {
            sub.clear_deferred();
        }
        self.reprocess_count += 1;
    }

    /// How many times the request has been driven again.
    pub fn reprocess_count(&self) -> u32 {
        self.reprocess_count
    }

    pub fn max_response_size(&self) -> usize {
        self.max_response_size
    }

    pub fn set_max_response_size(&mut self, max: usize) {
        self.max_response_size = max;
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Encoded size of the response built from the current varbinds.
    pub fn response_size(&self) -> usize {
        let list = varbind_list_size(self.subrequests.iter().map(SubRequest::varbind));
        let header = self.response_header();
        crate::ber::tlv_len(header.encoded_content_len(list))
    }

    /// Build the response PDU: one varbind per sub-request, error status and
    /// index from the first failure.
    pub fn to_response(&self) -> Pdu {
        let mut response = self.response_header();
        response.varbinds = self
            .subrequests
            .iter()
            .map(|sub| sub.varbind().clone())
            .collect::<Vec<VarBind>>();
        response
    }

    fn response_header(&self) -> Pdu {
        let mut response = self.pdu.to_response();
        let status = self.error_status();
        if status.is_error() {
            response.error_status = status.as_i32();
            response.error_index = i32::try_from(self.error_index()).unwrap_or(i32::MAX);
        }
        response
    }

    /// Drop sub-requests from `len` onwards.
    pub fn truncate(&mut self, len: usize) {
        self.subrequests.truncate(len);
    }

    pub(crate) fn bulk_shape(&self) -> Option<BulkShape> {
        self.bulk
    }

    pub(crate) fn finish_bulk(&mut self) {
        self.bulk_done = true;
    }

    pub(crate) fn push_subrequest(&mut self, sub: SubRequest) {
        self.subrequests.push(sub);
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("transaction_id", &self.context.transaction_id)
            .field("request_id", &self.pdu.request_id)
            .field("pdu_type", &self.pdu.pdu_type)
            .field("phase", &self.phase)
            .field("subrequests", &self.subrequests.len())
            .field("reprocess_count", &self.reprocess_count)
            .finish()
    }
}
