//! GET.

use crate::error::{ErrorStatus, Result};
use crate::object::BoxFuture;
use crate::pdu::PduType;
use crate::registry::{LockStatus, Registry};
use crate::request::{Phase, Request};
use crate::value::Value;
use crate::version::Version;

use super::{ProcessingPolicy, RequestHandler, enter_process_phase};

/// Serves GET requests: one exact-point lookup per varbind.
///
/// A missing (or unauthorized) object yields `noSuchObject`. A lock that
/// times out leaves the sub-request for a later pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetHandler;

impl RequestHandler for GetHandler {
    fn is_supported(&self, pdu_type: PduType) -> bool {
        pdu_type == PduType::GetRequest
    }

    fn process<'a>(
        &'a self,
        request: &'a mut Request,
        registry: &'a Registry,
        policy: &'a ProcessingPolicy,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            enter_process_phase(request);
            let ctx = request.context_handle();
            let v1 = ctx.version == Version::V1;
            let mut lock = policy.lock_request(request);

            for i in 0..request.len() {
                if request.subrequests()[i].is_complete() {
                    continue;
                }
                let query = policy.query(request, request.subrequests()[i].scope().clone(), false);
                let found = registry.lookup(&query, Some(&mut lock)).await;
                let sub = &mut request.subrequests_mut()[i];
                tracing::trace!(
                    target: "async_snmp_agent::processor",
                    {
                        transaction_id = %ctx.transaction_id,
                        oid = %sub.oid(),
                        found = found.is_some()
                    },
                    "get lookup"
                );

                let Some(found) = found else {
                    if lock.status == LockStatus::LockTimedOut {
                        tracing::warn!(
                            target: "async_snmp_agent::lock",
                            { transaction_id = %ctx.transaction_id, oid = %sub.oid() },
                            "lock timed out, retrying later"
                        );
                        sub.defer();
                    } else {
                        sub.set_value(Value::NoSuchObject);
                        sub.complete();
                    }
                    continue;
                };

                let result = found.object.get(&ctx, sub).await;
                if lock.is_locked() {
                    registry.unlock(lock.owner, &found.object);
                }
                match result {
                    Ok(()) => {
                        if v1 && matches!(sub.value(), Value::Counter64(_)) {
                            sub.set_value(Value::NoSuchInstance);
                        }
                        if !sub.is_deferred() {
                            sub.complete();
                        }
                    }
                    Err(e) => policy.fault(sub, ErrorStatus::GenErr, e, Phase::Process)?,
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::object::Scalar;
    use crate::oid;
    use crate::pdu::Pdu;
    use crate::request::tests::request;

    fn registry() -> Registry {
        let registry = Registry::new();
        registry
            .register(
                Arc::new(Scalar::read_only(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("router"))),
                None,
            )
            .unwrap();
        registry
            .register(
                Arc::new(Scalar::read_only(
                    oid!(1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 6, 1),
                    Value::Counter64(1 << 40),
                )),
                None,
            )
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_get_values_and_missing() {
        let registry = registry();
        let policy = ProcessingPolicy::new(Duration::from_secs(1));
        let mut req = request(Pdu::get_request(
            1,
            &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), oid!(1, 3, 6, 1, 2, 1, 1, 2, 0)],
        ));
        GetHandler.process(&mut req, &registry, &policy).await.unwrap();

        assert!(req.is_complete());
        assert_eq!(req.subrequests()[0].value(), &Value::from("router"));
        assert_eq!(req.subrequests()[1].value(), &Value::NoSuchObject);
        assert!(registry.lock_table().is_empty());
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let registry = Registry::new();
        let policy = ProcessingPolicy::new(Duration::from_secs(1));
        let mut req = request(Pdu::get_request(1, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]));
        GetHandler.process(&mut req, &registry, &policy).await.unwrap();
        assert!(req.is_complete());
        assert_eq!(req.subrequests()[0].value(), &Value::NoSuchObject);
    }

    #[tokio::test]
    async fn test_counter64_hidden_from_v1() {
        let registry = registry();
        let policy = ProcessingPolicy::new(Duration::from_secs(1));
        let pdu = Pdu::get_request(1, &[oid!(1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 6, 1)]);
        let mut ctx = crate::request::tests::context_for(&pdu);
        ctx.version = Version::V1;
        let mut req = Request::new(ctx, pdu, 65535);
        GetHandler.process(&mut req, &registry, &policy).await.unwrap();
        assert_eq!(req.subrequests()[0].value(), &Value::NoSuchInstance);
    }
}
