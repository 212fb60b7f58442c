//! Response shaping: SNMPv1 mapping, size limit, and counter reports.

use crate::counters::Counter;
use crate::error::ErrorStatus;
use crate::pdu::{Pdu, PduType};
use crate::value::Value;
use crate::varbind::VarBind;

/// Rewrite a response for an SNMPv1 manager (RFC 3584 Section 4.4).
///
/// The error status collapses onto the v1 code set. If any varbind carries
/// an exception, the first one becomes `noSuchName` at its index and its
/// value is replaced with NULL.
pub(crate) fn map_to_v1(pdu: &mut Pdu) {
    pdu.error_status = pdu.error_status().to_v1().as_i32();
    if let Some(index) = pdu.varbinds.iter().position(|vb| vb.value.is_exception()) {
        pdu.error_status = ErrorStatus::NoSuchName.as_i32();
        pdu.error_index = i32::try_from(index + 1).unwrap_or(i32::MAX);
        pdu.varbinds[index].value = Value::Null;
    }
}

/// Make `pdu` fit in `max_size` encoded octets, or give up.
///
/// GETBULK responses lose trailing varbinds until they fit. Any other
/// response loses all of them and reports `tooBig`. Reports are never
/// altered. Returns `None` when the result still does not fit.
pub(crate) fn fit_to_size(mut pdu: Pdu, bulk: bool, max_size: usize) -> Option<Pdu> {
    if pdu.encoded_len() > max_size && pdu.pdu_type != PduType::Report {
        if bulk {
            while pdu.encoded_len() > max_size && pdu.varbinds.pop().is_some() {}
        } else {
            pdu.varbinds.clear();
            pdu.error_status = ErrorStatus::TooBig.as_i32();
            pdu.error_index = 0;
        }
    }
    (pdu.encoded_len() <= max_size).then_some(pdu)
}

/// Report carrying `counter` at `value`, answering `request`.
pub(crate) fn counter_report(request: &Pdu, counter: Counter, value: u32) -> Pdu {
    Pdu {
        pdu_type: PduType::Report,
        request_id: request.request_id,
        error_status: 0,
        error_index: 0,
        varbinds: vec![VarBind::new(counter.oid(), Value::Counter32(value))],
    }
}
