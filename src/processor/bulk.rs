//! GETBULK.

use crate::error::Result;
use crate::object::BoxFuture;
use crate::pdu::PduType;
use crate::registry::Registry;
use crate::request::{RepetitionCursor, Request};

use super::next::next_subrequest;
use super::{ProcessingPolicy, RequestHandler, enter_process_phase};

/// Serves GETBULK requests.
///
/// Non-repeaters are answered like GETNEXT. Repeaters are expanded row by
/// row through a [`RepetitionCursor`]; a row that would push the response
/// past the size limit is dropped whole and ends the expansion.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetBulkHandler;

impl RequestHandler for GetBulkHandler {
    fn is_supported(&self, pdu_type: PduType) -> bool {
        pdu_type == PduType::GetBulkRequest
    }

    fn process<'a>(
        &'a self,
        request: &'a mut Request,
        registry: &'a Registry,
        policy: &'a ProcessingPolicy,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            enter_process_phase(request);
            let non_repeaters = request
                .bulk_shape()
                .map_or(0, |shape| shape.non_repeaters)
                .min(request.len());

            for i in 0..non_repeaters {
                if !request.subrequests()[i].is_complete() {
                    next_subrequest(request, i, registry, policy).await?;
                }
            }

            let mut cursor = RepetitionCursor::new(request);
            while let Some(i) = cursor.next_index(request) {
                if request.subrequests()[i].is_complete() {
                    continue;
                }
                next_subrequest(request, i, registry, policy).await?;
                if !request.subrequests()[i].is_complete() {
                    // The next row starts from this OID; wait for it.
                    return Ok(());
                }
                if request.response_size() > request.max_response_size() {
                    let kept = RepetitionCursor::truncate_row(request, i);
                    tracing::debug!(
                        target: "async_snmp_agent::bulk",
                        {
                            transaction_id = %request.transaction_id(),
                            kept,
                            max_size = request.max_response_size()
                        },
                        "response size limit reached, row dropped"
                    );
                    break;
                }
            }
            tracing::trace!(
                target: "async_snmp_agent::bulk",
                { transaction_id = %request.transaction_id(), varbinds = request.len() },
                "bulk expansion finished"
            );
            request.finish_bulk();
            Ok(())
        })
    }
}
