//! SNMP Protocol Data Units (PDUs).
//!
//! The processor receives PDUs already decoded by the transport layer and
//! hands response PDUs back to it. Only the shape and the encoded size are
//! modelled here; the wire codec lives outside this crate.

use crate::ber;
use crate::error::ErrorStatus;
use crate::oid::Oid;
use crate::varbind::{VarBind, varbind_list_size};

/// PDU type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PduType {
    GetRequest = 0xA0,
    GetNextRequest = 0xA1,
    Response = 0xA2,
    SetRequest = 0xA3,
    TrapV1 = 0xA4,
    GetBulkRequest = 0xA5,
    InformRequest = 0xA6,
    TrapV2 = 0xA7,
    Report = 0xA8,
}

impl PduType {
    /// Create from tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0xA0 => Some(Self::GetRequest),
            0xA1 => Some(Self::GetNextRequest),
            0xA2 => Some(Self::Response),
            0xA3 => Some(Self::SetRequest),
            0xA4 => Some(Self::TrapV1),
            0xA5 => Some(Self::GetBulkRequest),
            0xA6 => Some(Self::InformRequest),
            0xA7 => Some(Self::TrapV2),
            0xA8 => Some(Self::Report),
            _ => None,
        }
    }

    /// Get the tag byte.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// PDUs of the confirmed class expect a response (RFC 3411 Section 2.8).
    pub fn is_confirmed(self) -> bool {
        matches!(
            self,
            Self::GetRequest
                | Self::GetNextRequest
                | Self::GetBulkRequest
                | Self::SetRequest
                | Self::InformRequest
        )
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GetRequest => write!(f, "GetRequest"),
            Self::GetNextRequest => write!(f, "GetNextRequest"),
            Self::Response => write!(f, "Response"),
            Self::SetRequest => write!(f, "SetRequest"),
            Self::TrapV1 => write!(f, "TrapV1"),
            Self::GetBulkRequest => write!(f, "GetBulkRequest"),
            Self::InformRequest => write!(f, "InformRequest"),
            Self::TrapV2 => write!(f, "TrapV2"),
            Self::Report => write!(f, "Report"),
        }
    }
}

/// Generic PDU structure for request/response operations.
///
/// For GETBULK the `error_status` and `error_index` slots carry
/// non-repeaters and max-repetitions, as on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    /// PDU type
    pub pdu_type: PduType,
    /// Request ID for correlation
    pub request_id: i32,
    /// Error status (or non-repeaters for GETBULK)
    pub error_status: i32,
    /// Error index (or max-repetitions for GETBULK)
    pub error_index: i32,
    /// Variable bindings
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    /// Create a GET request PDU.
    pub fn get_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::request(PduType::GetRequest, request_id, oids)
    }

    /// Create a GETNEXT request PDU.
    pub fn get_next_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::request(PduType::GetNextRequest, request_id, oids)
    }

    /// Create a SET request PDU.
    pub fn set_request(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::SetRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// Create a GETBULK request PDU.
    pub fn get_bulk(
        request_id: i32,
        non_repeaters: i32,
        max_repetitions: i32,
        oids: &[Oid],
    ) -> Self {
        Self {
            pdu_type: PduType::GetBulkRequest,
            request_id,
            error_status: non_repeaters,
            error_index: max_repetitions,
            varbinds: oids.iter().map(|oid| VarBind::null(oid.clone())).collect(),
        }
    }

    fn request(pdu_type: PduType, request_id: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().map(|oid| VarBind::null(oid.clone())).collect(),
        }
    }

    /// Non-repeaters of a GETBULK request.
    pub fn non_repeaters(&self) -> i32 {
        self.error_status
    }

    /// Max-repetitions of a GETBULK request.
    pub fn max_repetitions(&self) -> i32 {
        self.error_index
    }

    /// Error status as an [`ErrorStatus`].
    pub fn error_status(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    /// Build an empty response skeleton carrying this PDU's request ID.
    pub fn to_response(&self) -> Pdu {
        Pdu {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: 0,
            error_index: 0,
            varbinds: Vec::new(),
        }
    }

    /// Echo this PDU as a response with the given error status.
    ///
    /// The error index is left at zero.
    pub fn to_error_response(&self, status: ErrorStatus) -> Pdu {
        Pdu {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: status.as_i32(),
            error_index: 0,
            varbinds: self.varbinds.clone(),
        }
    }

    /// Exact encoded length of this PDU (tag, length, and content).
    pub fn encoded_len(&self) -> usize {
        ber::tlv_len(self.encoded_content_len(varbind_list_size(&self.varbinds)))
    }

    /// Encoded length for a PDU with these header values and a varbind list of
    /// `varbind_list_len` encoded octets.
    pub(crate) fn encoded_content_len(&self, varbind_list_len: usize) -> usize {
        ber::tlv_len(ber::integer_len(self.request_id))
            + ber::tlv_len(ber::integer_len(self.error_status))
            + ber::tlv_len(ber::integer_len(self.error_index))
            + varbind_list_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::value::Value;

    #[test]
    fn test_pdu_type_tags() {
        for tag in 0xA0..=0xA8u8 {
            let pdu_type = PduType::from_tag(tag).unwrap();
            assert_eq!(pdu_type.tag(), tag);
        }
        assert_eq!(PduType::from_tag(0x30), None);
    }

    #[test]
    fn test_confirmed_class() {
        assert!(PduType::GetRequest.is_confirmed());
        assert!(PduType::GetBulkRequest.is_confirmed());
        assert!(PduType::SetRequest.is_confirmed());
        assert!(!PduType::Response.is_confirmed());
        assert!(!PduType::TrapV2.is_confirmed());
        assert!(!PduType::Report.is_confirmed());
    }

    #[test]
    fn test_bulk_fields() {
        let pdu = Pdu::get_bulk(7, 1, 10, &[oid!(1, 3, 6, 1)]);
        assert_eq!(pdu.non_repeaters(), 1);
        assert_eq!(pdu.max_repetitions(), 10);
        assert_eq!(pdu.varbinds[0].value, Value::Null);
    }

    #[test]
    fn test_encoded_len() {
        // request-id (3) + status (3) + index (3) + varbind list (2 + 10) = 21
        let pdu = Pdu {
            pdu_type: PduType::Response,
            request_id: 1,
            error_status: 0,
            error_index: 0,
            varbinds: vec![VarBind::new(oid!(1, 3, 6, 1), Value::Integer(42))],
        };
        assert_eq!(pdu.encoded_len(), 2 + 21);
    }

    #[test]
    fn test_error_response_echoes_varbinds() {
        let pdu = Pdu::get_request(99, &[oid!(1, 3, 6, 1), oid!(1, 3, 6, 2)]);
        let response = pdu.to_error_response(ErrorStatus::GenErr);
        assert_eq!(response.pdu_type, PduType::Response);
        assert_eq!(response.request_id, 99);
        assert_eq!(response.error_status(), ErrorStatus::GenErr);
        assert_eq!(response.varbinds, pdu.varbinds);
    }
}
