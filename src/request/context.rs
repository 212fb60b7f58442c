//! Request context passed to managed objects.

use std::net::SocketAddr;

use bytes::Bytes;

use crate::message::{SecurityLevel, SecurityModel};
use crate::pdu::PduType;
use crate::version::Version;

use super::TransactionId;

/// Who sent a request, under which security parameters, and in which context.
///
/// For community-based versions the security name and context come from the
/// coexistence table, not from the message itself.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Source address of the request.
    pub peer: SocketAddr,
    /// SNMP version.
    pub version: Version,
    /// Security model that processed the message.
    pub security_model: SecurityModel,
    /// Security name (community-derived or USM user name).
    pub security_name: Bytes,
    /// Security level (noAuthNoPriv for v1/v2c).
    pub security_level: SecurityLevel,
    /// Context engine ID the request addresses.
    pub context_engine_id: Bytes,
    /// Context name, empty for the default context.
    pub context_name: Bytes,
    /// Request ID from the PDU.
    pub request_id: i32,
    /// PDU type.
    pub pdu_type: PduType,
    /// Transaction that owns any object locks taken for this request.
    pub transaction_id: TransactionId,
    /// View granted for this request, when access control is configured.
    pub view_name: Option<Bytes>,
}
