//! GETNEXT, and the per-sub-request search GETBULK shares.

use crate::error::{ErrorStatus, Result};
use crate::object::BoxFuture;
use crate::pdu::PduType;
use crate::registry::{LockStatus, Registry};
use crate::request::{Phase, Request};
use crate::value::Value;
use crate::version::Version;

use super::{ProcessingPolicy, RequestHandler, enter_process_phase};

/// Serves GETNEXT requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetNextHandler;

impl RequestHandler for GetNextHandler {
    fn is_supported(&self, pdu_type: PduType) -> bool {
        pdu_type == PduType::GetNextRequest
    }

    fn process<'a>(
        &'a self,
        request: &'a mut Request,
        registry: &'a Registry,
        policy: &'a ProcessingPolicy,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            enter_process_phase(request);
            for i in 0..request.len() {
                if !request.subrequests()[i].is_complete() {
                    next_subrequest(request, i, registry, policy).await?;
                }
            }
            Ok(())
        })
    }
}

/// Find the successor for sub-request `index`.
///
/// Walks the registry from the sub-request's scope. An object that has no
/// instance left in the scope is subtracted from it and the walk goes on.
/// SNMPv1 cannot carry Counter64, so such a value moves the scope past its
/// OID and the walk goes on as well. Running out of objects yields
/// `endOfMibView`.
pub(crate) async fn next_subrequest(
    request: &mut Request,
    index: usize,
    registry: &Registry,
    policy: &ProcessingPolicy,
) -> Result<()> {
    let ctx = request.context_handle();
    let v1 = ctx.version == Version::V1;
    let mut lock = policy.lock_request(request);

    loop {
        let query = policy.query(request, request.subrequests()[index].scope().clone(), false);
        let found = registry.lookup(&query, Some(&mut lock)).await;
        let sub = &mut request.subrequests_mut()[index];

        let Some(found) = found else {
            if lock.status == LockStatus::LockTimedOut {
                tracing::warn!(
                    target: "async_snmp_agent::lock",
                    { transaction_id = %ctx.transaction_id, scope = %sub.scope() },
                    "lock timed out, retrying later"
                );
                sub.defer();
                return Ok(());
            }
            tracing::debug!(
                target: "async_snmp_agent::processor",
                { transaction_id = %ctx.transaction_id, oid = %sub.oid() },
                "end of MIB view"
            );
            sub.set_value(Value::EndOfMibView);
            sub.complete();
            return Ok(());
        };
        tracing::trace!(
            target: "async_snmp_agent::processor",
            { transaction_id = %ctx.transaction_id, scope = %found.scope },
            "next candidate"
        );

        let result = found.object.next(&ctx, sub).await;
        if lock.is_locked() {
            registry.unlock(lock.owner, &found.object);
        }
        match result {
            Ok(true) if v1 && matches!(sub.value(), Value::Counter64(_)) => {
                let skipped = sub.oid().clone();
                sub.set_value(Value::Null);
                sub.scope_mut().exclude_through(skipped);
            }
            Ok(true) => {
                if !sub.is_deferred() {
                    sub.complete();
                }
                return Ok(());
            }
            Ok(false) => {
                sub.set_value(Value::Null);
                if !sub.scope_mut().subtract(&found.scope) {
                    sub.set_value(Value::EndOfMibView);
                    sub.complete();
                    return Ok(());
                }
            }
            Err(e) => return policy.fault(sub, ErrorStatus::GenErr, e, Phase::Process),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::object::{Scalar, SubtreeObject};
    use crate::oid;
    use crate::pdu::Pdu;
    use crate::request::tests::{context_for, request};

    fn policy() -> ProcessingPolicy {
        ProcessingPolicy::new(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_next_into_exact_scalar() {
        let registry = Registry::new();
        registry
            .register(
                Arc::new(Scalar::read_only(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("router"))),
                None,
            )
            .unwrap();

        let mut req = request(Pdu::get_next_request(
            1,
            &[oid!(1, 3, 6, 1, 2, 1, 1, 1), oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)],
        ));
        GetNextHandler.process(&mut req, &registry, &policy()).await.unwrap();

        assert!(req.is_complete());
        assert_eq!(req.subrequests()[0].oid(), &oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
        assert_eq!(req.subrequests()[0].value(), &Value::from("router"));
        assert_eq!(req.subrequests()[1].value(), &Value::EndOfMibView);
    }

    #[tokio::test]
    async fn test_next_skips_empty_object() {
        let registry = Registry::new();
        registry
            .register(Arc::new(SubtreeObject::new(oid!(1, 3, 6, 1, 2, 1, 2))), None)
            .unwrap();
        let table = SubtreeObject::new(oid!(1, 3, 6, 1, 2, 1, 4));
        table.insert(oid!(1, 3, 6, 1, 2, 1, 4, 1, 0), Value::Integer(2));
        registry.register(Arc::new(table), None).unwrap();

        let mut req = request(Pdu::get_next_request(1, &[oid!(1, 3, 6, 1, 2, 1, 2)]));
        GetNextHandler.process(&mut req, &registry, &policy()).await.unwrap();
        assert_eq!(req.subrequests()[0].oid(), &oid!(1, 3, 6, 1, 2, 1, 4, 1, 0));
        assert_eq!(req.subrequests()[0].value(), &Value::Integer(2));
    }

    #[tokio::test]
    async fn test_v1_skips_counter64() {
        let registry = Registry::new();
        let table = SubtreeObject::new(oid!(1, 3, 6, 1, 2, 1, 31));
        table.insert(oid!(1, 3, 6, 1, 2, 1, 31, 1, 0), Value::Counter64(7));
        table.insert(oid!(1, 3, 6, 1, 2, 1, 31, 2, 0), Value::Counter32(8));
        registry.register(Arc::new(table), None).unwrap();

        let pdu = Pdu::get_next_request(1, &[oid!(1, 3, 6, 1, 2, 1, 31)]);
        let mut ctx = context_for(&pdu);
        ctx.version = Version::V1;
        let mut req = Request::new(ctx, pdu, 65535);
        GetNextHandler.process(&mut req, &registry, &policy()).await.unwrap();
        assert_eq!(req.subrequests()[0].oid(), &oid!(1, 3, 6, 1, 2, 1, 31, 2, 0));
        assert_eq!(req.subrequests()[0].value(), &Value::Counter32(8));

        let pdu = Pdu::get_next_request(2, &[oid!(1, 3, 6, 1, 2, 1, 31)]);
        let mut req = request(pdu);
        GetNextHandler.process(&mut req, &registry, &policy()).await.unwrap();
        assert_eq!(req.subrequests()[0].value(), &Value::Counter64(7));
    }
}
