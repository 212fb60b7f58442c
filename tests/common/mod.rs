//! Shared test utilities for async-snmp-agent integration tests.

// Allow dead code and unused imports since not all test files use all utilities
#![allow(dead_code)]
#![allow(unused_imports)]

mod fixtures;
mod objects;

pub use fixtures::*;
pub use objects::*;

use std::net::SocketAddr;
use std::sync::Arc;

use async_snmp_agent::counters::AgentCounters;
use async_snmp_agent::pdu::Pdu;
use async_snmp_agent::processor::{CommandProcessor, CommandProcessorBuilder};
use async_snmp_agent::registry::Registry;
use async_snmp_agent::transport::{ChannelSender, OutgoingResponse, RequestEvent, StateReference};
use async_snmp_agent::{SecurityLevel, Version};
use tokio::sync::mpsc::UnboundedReceiver;

/// Install a tracing subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn peer() -> SocketAddr {
    "192.0.2.10:50161".parse().unwrap()
}

/// A processor running requests inline, with its responses and counters.
pub struct Harness {
    pub processor: CommandProcessor,
    pub registry: Arc<Registry>,
    pub counters: Arc<AgentCounters>,
    pub responses: UnboundedReceiver<(StateReference, OutgoingResponse)>,
}

impl Harness {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with(registry, |builder| builder)
    }

    /// Harness whose builder is further configured by `configure`.
    pub fn with<F>(registry: Arc<Registry>, configure: F) -> Self
    where
        F: FnOnce(CommandProcessorBuilder) -> CommandProcessorBuilder,
    {
        init_tracing();
        let counters = Arc::new(AgentCounters::new());
        let (sender, responses) = ChannelSender::new();
        let builder = CommandProcessor::builder()
            .registry(Arc::clone(&registry))
            .response_sender(Arc::new(sender))
            .counter_listener(counters.clone())
            .max_concurrent_requests(0);
        let processor = configure(builder).build().unwrap();
        Self {
            processor,
            registry,
            counters,
            responses,
        }
    }

    /// Process `event` and return the response it produced, if any.
    pub async fn send(&mut self, event: RequestEvent) -> Option<OutgoingResponse> {
        self.processor.process_pdu(event).await.unwrap();
        self.responses.try_recv().ok().map(|(_, response)| response)
    }

    /// Process `pdu` as an SNMPv2c request from `public`.
    pub async fn v2c(&mut self, pdu: Pdu) -> Option<Pdu> {
        self.send(RequestEvent::community(Version::V2c, "public", peer(), pdu))
            .await
            .map(|response| response.pdu)
    }

    /// Process `pdu` as an SNMPv1 request from `public`.
    pub async fn v1(&mut self, pdu: Pdu) -> Option<Pdu> {
        self.send(RequestEvent::community(Version::V1, "public", peer(), pdu))
            .await
            .map(|response| response.pdu)
    }

    /// Process `pdu` as an SNMPv3 request in the default context.
    pub async fn v3(&mut self, pdu: Pdu) -> Option<Pdu> {
        self.send(RequestEvent::v3("admin", SecurityLevel::AuthPriv, "", "", peer(), pdu))
            .await
            .map(|response| response.pdu)
    }
}
