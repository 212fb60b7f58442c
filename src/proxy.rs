//! Forwarding of requests addressed to other SNMP engines.
//!
//! A request whose context engine ID is not one of the processor's own is
//! handed to a [`ProxyForwarder`] registered for that engine and the
//! request's [`ProxyType`]. The processor sends whatever response the
//! forwarder returns; a request nobody forwards is counted as a proxy drop.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::coexistence::CoexistenceInfo;
use crate::object::BoxFuture;
use crate::pdu::{Pdu, PduType};
use crate::transport::RequestEvent;

/// Class of request a forwarder handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProxyType {
    /// Fallback for every class.
    All,
    Read,
    Write,
    Notify,
}

impl ProxyType {
    /// Class of a PDU type; `None` for responses and reports.
    pub fn of(pdu_type: PduType) -> Option<Self> {
        match pdu_type {
            PduType::GetRequest | PduType::GetNextRequest | PduType::GetBulkRequest => {
                Some(Self::Read)
            }
            PduType::SetRequest => Some(Self::Write),
            PduType::TrapV1 | PduType::TrapV2 | PduType::InformRequest => Some(Self::Notify),
            PduType::Response | PduType::Report => None,
        }
    }
}

/// A request handed to a forwarder.
#[derive(Debug, Clone)]
pub struct ProxyForwardRequest {
    pub event: RequestEvent,
    /// The community mapping the request arrived under, for v1/v2c.
    pub coexistence: Option<CoexistenceInfo>,
    /// Context engine ID the request is addressed to.
    pub context_engine_id: Bytes,
    pub proxy_type: ProxyType,
}

/// Forwards requests to another engine.
pub trait ProxyForwarder: Send + Sync + 'static {
    /// Forward `request` and return the response to relay, or `None` if the
    /// request could not be forwarded or needs no response.
    fn forward<'a>(&'a self, request: &'a ProxyForwardRequest) -> BoxFuture<'a, Option<Pdu>>;
}

/// Forwarders keyed by context engine ID and proxy type.
#[derive(Default)]
pub struct ProxyMap {
    forwarders: Mutex<HashMap<(Bytes, ProxyType), Arc<dyn ProxyForwarder>>>,
}

impl ProxyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `forwarder`, returning the one it replaces.
    pub fn add(
        &self,
        forwarder: Arc<dyn ProxyForwarder>,
        context_engine_id: impl Into<Bytes>,
        proxy_type: ProxyType,
    ) -> Option<Arc<dyn ProxyForwarder>> {
        self.forwarders
            .lock()
            .insert((context_engine_id.into(), proxy_type), forwarder)
    }

    pub fn remove(
        &self,
        context_engine_id: &[u8],
        proxy_type: ProxyType,
    ) -> Option<Arc<dyn ProxyForwarder>> {
        self.forwarders
            .lock()
            .remove(&(Bytes::copy_from_slice(context_engine_id), proxy_type))
    }

    /// Forwarder for the exact type, else the one registered for
    /// [`ProxyType::All`].
    pub fn get(
        &self,
        context_engine_id: &[u8],
        proxy_type: ProxyType,
    ) -> Option<Arc<dyn ProxyForwarder>> {
        let engine = Bytes::copy_from_slice(context_engine_id);
        let forwarders = self.forwarders.lock();
        forwarders
            .get(&(engine.clone(), proxy_type))
            .or_else(|| forwarders.get(&(engine, ProxyType::All)))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.forwarders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.forwarders.lock().is_empty()
    }
}

impl fmt::Debug for ProxyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let forwarders = self.forwarders.lock();
        f.debug_struct("ProxyMap")
            .field("forwarders", &forwarders.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl ProxyForwarder for Echo {
        fn forward<'a>(&'a self, request: &'a ProxyForwardRequest) -> BoxFuture<'a, Option<Pdu>> {
            Box::pin(async move { Some(request.event.pdu.to_response()) })
        }
    }

    #[test]
    fn test_proxy_type_of() {
        assert_eq!(ProxyType::of(PduType::GetBulkRequest), Some(ProxyType::Read));
        assert_eq!(ProxyType::of(PduType::SetRequest), Some(ProxyType::Write));
        assert_eq!(ProxyType::of(PduType::InformRequest), Some(ProxyType::Notify));
        assert_eq!(ProxyType::of(PduType::Report), None);
    }

    #[test]
    fn test_exact_then_wildcard() {
        let map = ProxyMap::new();
        let reader: Arc<dyn ProxyForwarder> = Arc::new(Echo);
        let any: Arc<dyn ProxyForwarder> = Arc::new(Echo);
        map.add(Arc::clone(&reader), "remote", ProxyType::Read);
        map.add(Arc::clone(&any), "remote", ProxyType::All);

        let found = map.get(b"remote", ProxyType::Read).unwrap();
        assert!(Arc::ptr_eq(&found, &reader));
        let found = map.get(b"remote", ProxyType::Write).unwrap();
        assert!(Arc::ptr_eq(&found, &any));
        assert!(map.get(b"elsewhere", ProxyType::Read).is_none());

        assert!(map.remove(b"remote", ProxyType::All).is_some());
        assert!(map.get(b"remote", ProxyType::Write).is_none());
        assert_eq!(map.len(), 1);
    }
}
