//! Protocol counters the processor reports.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::oid::Oid;
use crate::oid;

/// A counter incremented by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// `snmpSilentDrops`: confirmed requests dropped because even an empty
    /// response would exceed the size limit.
    SilentDrops,
    /// `snmpProxyDrops`: requests for a foreign context that could not be
    /// forwarded.
    ProxyDrops,
    /// `snmpUnknownPDUHandlers`: requests whose PDU type has no handler.
    UnknownPduHandlers,
    /// `snmpInBadCommunityNames`: community-based requests with an unknown
    /// community or from a disallowed source.
    InBadCommunityNames,
}

impl Counter {
    pub const ALL: [Counter; 4] = [
        Counter::SilentDrops,
        Counter::ProxyDrops,
        Counter::UnknownPduHandlers,
        Counter::InBadCommunityNames,
    ];

    /// Instance OID of the counter.
    pub fn oid(self) -> Oid {
        match self {
            Counter::SilentDrops => oid!(1, 3, 6, 1, 2, 1, 11, 31, 0),
            Counter::ProxyDrops => oid!(1, 3, 6, 1, 2, 1, 11, 32, 0),
            Counter::UnknownPduHandlers => oid!(1, 3, 6, 1, 6, 3, 11, 2, 1, 3, 0),
            Counter::InBadCommunityNames => oid!(1, 3, 6, 1, 2, 1, 11, 4, 0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Counter::SilentDrops => "snmpSilentDrops",
            Counter::ProxyDrops => "snmpProxyDrops",
            Counter::UnknownPduHandlers => "snmpUnknownPDUHandlers",
            Counter::InBadCommunityNames => "snmpInBadCommunityNames",
        }
    }
}

impl std::fmt::Display for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives counter increments. Returns the counter's new value.
pub trait CounterListener: Send + Sync + 'static {
    fn increment(&self, counter: Counter) -> u32;
}

/// In-memory counters.
#[derive(Debug, Default)]
pub struct AgentCounters {
    silent_drops: AtomicU32,
    proxy_drops: AtomicU32,
    unknown_pdu_handlers: AtomicU32,
    in_bad_community_names: AtomicU32,
}

impl AgentCounters {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, counter: Counter) -> &AtomicU32 {
        match counter {
            Counter::SilentDrops => &self.silent_drops,
            Counter::ProxyDrops => &self.proxy_drops,
            Counter::UnknownPduHandlers => &self.unknown_pdu_handlers,
            Counter::InBadCommunityNames => &self.in_bad_community_names,
        }
    }

    /// Current value.
    pub fn get(&self, counter: Counter) -> u32 {
        self.slot(counter).load(Ordering::Relaxed)
    }
}

impl CounterListener for AgentCounters {
    fn increment(&self, counter: Counter) -> u32 {
        // Counter32 semantics: wraps at 2^32.
        self.slot(counter).fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}
