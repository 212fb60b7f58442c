//! SET: the two-phase commit driver.

use std::sync::Arc;

use crate::error::{Error, ErrorStatus, Result};
use crate::object::{BoxFuture, ManagedObject};
use crate::pdu::PduType;
use crate::registry::{LockStatus, Registry};
use crate::request::{Phase, Request};

use super::{ProcessingPolicy, RequestHandler};

/// Serves SET requests.
///
/// Runs PREPARE for every varbind before any COMMIT. A PREPARE failure stops
/// further PREPARE calls and rolls back what was prepared; a COMMIT failure
/// rolls back everything prepared. CLEANUP always runs and releases each
/// target's lock.
///
/// A phase that cannot finish in one pass (a deferred sub-request or a lock
/// that timed out) leaves the request parked in that phase; the next pass
/// resumes it instead of advancing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetHandler;

impl RequestHandler for SetHandler {
    fn is_supported(&self, pdu_type: PduType) -> bool {
        pdu_type == PduType::SetRequest
    }

    fn process<'a>(
        &'a self,
        request: &'a mut Request,
        registry: &'a Registry,
        policy: &'a ProcessingPolicy,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut fault = None;
            loop {
                if request.phase() == Phase::Init || request.is_phase_complete() {
                    let Some(phase) = request.next_phase() else {
                        break;
                    };
                    tracing::debug!(
                        target: "async_snmp_agent::set",
                        { transaction_id = %request.transaction_id(), phase = %phase },
                        "entering phase"
                    );
                }
                let phase = request.phase();
                match phase {
                    Phase::Prepare => prepare(request, registry, policy, &mut fault).await,
                    Phase::Commit => commit(request, registry, policy, &mut fault).await,
                    Phase::Undo => undo(request, registry, policy, &mut fault).await,
                    Phase::Cleanup => cleanup(request, registry, policy, &mut fault).await,
                    Phase::Init | Phase::Process => break,
                }
                if !request.is_phase_complete() {
                    tracing::debug!(
                        target: "async_snmp_agent::set",
                        { transaction_id = %request.transaction_id(), phase = %phase },
                        "phase incomplete, waiting"
                    );
                    break;
                }
                if phase == Phase::Cleanup {
                    break;
                }
            }
            match fault {
                Some(error) => Err(error),
                None => Ok(()),
            }
        })
    }
}

/// Complete every sub-request still open in the current phase.
fn complete_remaining(request: &mut Request) {
    for sub in request.subrequests_mut() {
        if !sub.is_complete() {
            sub.complete();
        }
    }
}

/// The target recorded for sub-request `index`, or a fresh lookup of its
/// scope when there is none.
async fn resolve_target(
    request: &Request,
    index: usize,
    registry: &Registry,
    policy: &ProcessingPolicy,
) -> Option<Arc<dyn ManagedObject>> {
    let sub = &request.subrequests()[index];
    if let Some(target) = sub.target() {
        return Some(Arc::clone(target));
    }
    let query = policy.query(request, sub.scope().clone(), true);
    registry.lookup(&query, None).await.map(|found| found.object)
}

async fn prepare(
    request: &mut Request,
    registry: &Registry,
    policy: &ProcessingPolicy,
    fault: &mut Option<Error>,
) {
    let ctx = request.context_handle();
    let mut lock = policy.lock_request(request);

    for i in 0..request.len() {
        if request.has_error() {
            break;
        }
        if request.subrequests()[i].is_complete() {
            continue;
        }
        let query = policy.query(request, request.subrequests()[i].scope().clone(), true);
        let found = registry.lookup(&query, Some(&mut lock)).await;
        let sub = &mut request.subrequests_mut()[i];

        let Some(found) = found else {
            if lock.status == LockStatus::LockTimedOut {
                tracing::warn!(
                    target: "async_snmp_agent::lock",
                    { transaction_id = %ctx.transaction_id, oid = %sub.oid() },
                    "lock timed out, retrying later"
                );
                sub.defer();
                return;
            }
            let status = if query.is_access_allowed(sub.oid()) {
                ErrorStatus::NoCreation
            } else {
                ErrorStatus::NoAccess
            };
            tracing::debug!(
                target: "async_snmp_agent::set",
                { transaction_id = %ctx.transaction_id, oid = %sub.oid(), status = %status },
                "no writable object"
            );
            sub.set_error(status);
            sub.complete();
            break;
        };

        sub.set_target(Arc::clone(&found.object));
        match found.object.prepare(&ctx, sub).await {
            Ok(()) if sub.is_deferred() => return,
            Ok(()) => {
                if !sub.has_error() {
                    sub.mark_prepared();
                }
                sub.complete();
            }
            Err(e) => {
                if let Some(error) =
                    policy.record_fault(sub, ErrorStatus::GenErr, e, Phase::Prepare)
                {
                    fault.get_or_insert(error);
                }
            }
        }
    }

    if request.has_error() {
        complete_remaining(request);
    }
}

async fn commit(
    request: &mut Request,
    registry: &Registry,
    policy: &ProcessingPolicy,
    fault: &mut Option<Error>,
) {
    let ctx = request.context_handle();

    for i in 0..request.len() {
        if request.has_error() {
            break;
        }
        if request.subrequests()[i].is_complete() {
            continue;
        }
        let target = resolve_target(request, i, registry, policy).await;
        let sub = &mut request.subrequests_mut()[i];
        let Some(target) = target else {
            tracing::warn!(
                target: "async_snmp_agent::set",
                { transaction_id = %ctx.transaction_id, oid = %sub.oid() },
                "target vanished before commit"
            );
            sub.set_error(ErrorStatus::CommitFailed);
            sub.complete();
            break;
        };
        match target.commit(&ctx, sub).await {
            Ok(()) if sub.is_deferred() => return,
            Ok(()) => sub.complete(),
            Err(e) => {
                if let Some(error) =
                    policy.record_fault(sub, ErrorStatus::CommitFailed, e, Phase::Commit)
                {
                    fault.get_or_insert(error);
                }
            }
        }
    }

    if request.has_error() {
        complete_remaining(request);
    }
}

async fn undo(
    request: &mut Request,
    registry: &Registry,
    policy: &ProcessingPolicy,
    fault: &mut Option<Error>,
) {
    let ctx = request.context_handle();

    for i in 0..request.len() {
        let sub = &request.subrequests()[i];
        if sub.is_complete() {
            continue;
        }
        if !sub.is_prepared() {
            request.subrequests_mut()[i].complete();
            continue;
        }
        let target = resolve_target(request, i, registry, policy).await;
        let sub = &mut request.subrequests_mut()[i];
        let Some(target) = target else {
            tracing::warn!(
                target: "async_snmp_agent::set",
                { transaction_id = %ctx.transaction_id, oid = %sub.oid() },
                "target vanished before undo"
            );
            sub.set_error(ErrorStatus::UndoFailed);
            sub.complete();
            continue;
        };
        match target.undo(&ctx, sub).await {
            Ok(()) if sub.is_deferred() => return,
            Ok(()) => sub.complete(),
            Err(e) => {
                if let Some(error) =
                    policy.record_fault(sub, ErrorStatus::UndoFailed, e, Phase::Undo)
                {
                    fault.get_or_insert(error);
                }
            }
        }
    }
}

async fn cleanup(
    request: &mut Request,
    registry: &Registry,
    policy: &ProcessingPolicy,
    fault: &mut Option<Error>,
) {
    let ctx = request.context_handle();

    for sub in request.subrequests_mut() {
        if sub.is_complete() {
            continue;
        }
        let Some(target) = sub.take_target() else {
            sub.complete();
            continue;
        };
        registry.unlock(ctx.transaction_id, &target);
        if let Err(e) = target.cleanup(&ctx, sub).await {
            tracing::error!(
                target: "async_snmp_agent::set",
                { transaction_id = %ctx.transaction_id, oid = %sub.oid(), error = %e },
                "cleanup failed"
            );
            if policy.forward_instrumentation_errors && fault.is_none() {
                *fault = Some(Error::Instrumentation {
                    oid: sub.oid().clone(),
                    source: e,
                });
            }
        }
        sub.complete();
    }
}
