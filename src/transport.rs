//! Boundary to the transport and message-processing layers.
//!
//! The processor never touches sockets. Inbound requests arrive as a
//! [`RequestEvent`] (already decoded and authenticated), and responses leave
//! through a [`ResponseSender`] together with the [`StateReference`] the
//! transport attached to the request.

use std::io;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::message::{SecurityLevel, SecurityModel};
use crate::object::BoxFuture;
use crate::pdu::Pdu;
use crate::version::Version;

/// Opaque handle routing a response back to where the request came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateReference {
    /// Where the request came from.
    pub peer: SocketAddr,
    /// Message ID (v3) or request ID (v1/v2c) the transport correlates on.
    pub message_id: i32,
    /// Transport-specific handle, e.g. a connection index.
    pub handle: u64,
}

impl StateReference {
    pub fn new(peer: SocketAddr, message_id: i32) -> Self {
        Self {
            peer,
            message_id,
            handle: 0,
        }
    }
}

/// A decoded, authenticated request handed to the processor.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub version: Version,
    pub security_model: SecurityModel,
    /// User name (v3) or community string (v1/v2c).
    pub security_name: Bytes,
    pub security_level: SecurityLevel,
    /// Context engine ID of the scoped PDU. Empty for v1/v2c.
    pub context_engine_id: Bytes,
    /// Context name of the scoped PDU. Empty for v1/v2c.
    pub context_name: Bytes,
    /// Largest response the requester accepts, in encoded PDU octets.
    pub max_size_response_pdu: usize,
    pub pdu: Pdu,
    pub state_reference: StateReference,
}

impl RequestEvent {
    /// A community-based request from `peer`.
    pub fn community(
        version: Version,
        community: impl Into<Bytes>,
        peer: SocketAddr,
        pdu: Pdu,
    ) -> Self {
        Self {
            version,
            security_model: version.default_security_model(),
            security_name: community.into(),
            security_level: SecurityLevel::NoAuthNoPriv,
            context_engine_id: Bytes::new(),
            context_name: Bytes::new(),
            max_size_response_pdu: 65535,
            state_reference: StateReference::new(peer, pdu.request_id),
            pdu,
        }
    }

    /// An SNMPv3 request for `context_name` at `context_engine_id`.
    pub fn v3(
        user: impl Into<Bytes>,
        security_level: SecurityLevel,
        context_engine_id: impl Into<Bytes>,
        context_name: impl Into<Bytes>,
        peer: SocketAddr,
        pdu: Pdu,
    ) -> Self {
        Self {
            version: Version::V3,
            security_model: SecurityModel::Usm,
            security_name: user.into(),
            security_level,
            context_engine_id: context_engine_id.into(),
            context_name: context_name.into(),
            max_size_response_pdu: 65535,
            state_reference: StateReference::new(peer, pdu.request_id),
            pdu,
        }
    }

    pub fn with_max_size(mut self, max: usize) -> Self {
        self.max_size_response_pdu = max;
        self
    }

    pub fn peer(&self) -> SocketAddr {
        self.state_reference.peer
    }
}

/// A response ready for encoding by the message-processing layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingResponse {
    pub version: Version,
    pub security_model: SecurityModel,
    pub security_name: Bytes,
    pub security_level: SecurityLevel,
    pub context_engine_id: Bytes,
    pub context_name: Bytes,
    pub max_size_response_pdu: usize,
    pub pdu: Pdu,
}

impl OutgoingResponse {
    /// Response envelope mirroring `event`'s security parameters.
    pub fn reply_to(event: &RequestEvent, pdu: Pdu) -> Self {
        Self {
            version: event.version,
            security_model: event.security_model,
            security_name: event.security_name.clone(),
            security_level: event.security_level,
            context_engine_id: event.context_engine_id.clone(),
            context_name: event.context_name.clone(),
            max_size_response_pdu: event.max_size_response_pdu,
            pdu,
        }
    }
}

/// Hands responses to the transport layer.
pub trait ResponseSender: Send + Sync + 'static {
    fn send_response<'a>(
        &'a self,
        state: &'a StateReference,
        response: OutgoingResponse,
    ) -> BoxFuture<'a, io::Result<()>>;
}

/// Sender forwarding responses into a tokio channel.
///
/// The receiving end is typically the task that owns the socket.
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<(StateReference, OutgoingResponse)>,
}

impl ChannelSender {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StateReference, OutgoingResponse)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ResponseSender for ChannelSender {
    fn send_response<'a>(
        &'a self,
        state: &'a StateReference,
        response: OutgoingResponse,
    ) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            self.tx
                .send((state.clone(), response))
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response channel closed"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[tokio::test]
    async fn test_channel_sender() {
        let (sender, mut rx) = ChannelSender::new();
        let peer: SocketAddr = "192.0.2.1:40000".parse().unwrap();
        let event = RequestEvent::community(
            Version::V2c,
            "public",
            peer,
            Pdu::get_request(7, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]),
        );
        let response = OutgoingResponse::reply_to(&event, event.pdu.to_response());
        sender.send_response(&event.state_reference, response).await.unwrap();

        let (state, received) = rx.recv().await.unwrap();
        assert_eq!(state.peer, peer);
        assert_eq!(state.message_id, 7);
        assert_eq!(received.security_name, Bytes::from_static(b"public"));
    }

    #[tokio::test]
    async fn test_channel_sender_closed() {
        let (sender, rx) = ChannelSender::new();
        drop(rx);
        let peer: SocketAddr = "192.0.2.1:40000".parse().unwrap();
        let event = RequestEvent::community(Version::V1, "public", peer, Pdu::get_request(1, &[]));
        let response = OutgoingResponse::reply_to(&event, event.pdu.to_response());
        let err = sender.send_response(&event.state_reference, response).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
