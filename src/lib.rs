// The Error enum carries OIDs and scopes inline for diagnostics.
#![allow(clippy::result_large_err)]

//! # async-snmp-agent
//!
//! Async request-processing core for SNMP agents.
//!
//! The crate sits between an SNMP message-processing layer (which decodes,
//! authenticates, and encodes messages) and the instrumentation that owns
//! the managed data:
//!
//! - [`registry::Registry`]: managed objects keyed by OID range and context,
//!   with ordered lookup and reentrant per-object locks.
//! - [`processor::CommandProcessor`]: GET, GETNEXT, GETBULK, and the SET
//!   two-phase commit, with response size limits, request timeouts, and
//!   protocol counters.
//! - [`object`]: the [`ManagedObject`](object::ManagedObject) trait plus
//!   ready-made scalar and subtree objects.
//! - [`access`], [`coexistence`], [`proxy`]: view-based access control,
//!   community mapping for SNMPv1/v2c, and forwarding to other engines.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use async_snmp_agent::object::{Scalar, SubtreeObject};
//! use async_snmp_agent::pdu::Pdu;
//! use async_snmp_agent::processor::CommandProcessor;
//! use async_snmp_agent::registry::Registry;
//! use async_snmp_agent::transport::{ChannelSender, RequestEvent};
//! use async_snmp_agent::{Value, Version, oid};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> async_snmp_agent::Result<()> {
//! let registry = Arc::new(Registry::new());
//! registry.register(
//!     Arc::new(Scalar::read_only(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("edge router"))),
//!     None,
//! )?;
//! registry.register(
//!     Arc::new(
//!         SubtreeObject::new(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2))
//!             .with(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 1), Value::from("eth0"))
//!             .with(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 2), Value::from("eth1")),
//!     ),
//!     None,
//! )?;
//!
//! let (sender, mut responses) = ChannelSender::new();
//! let processor = CommandProcessor::builder()
//!     .registry(registry)
//!     .response_sender(Arc::new(sender))
//!     .max_concurrent_requests(0)
//!     .build()?;
//!
//! let pdu = Pdu::get_bulk(1, 0, 5, &[oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2)]);
//! let peer = "192.0.2.1:50000".parse().unwrap();
//! processor
//!     .process_pdu(RequestEvent::community(Version::V2c, "public", peer, pdu))
//!     .await?;
//!
//! let (_, response) = responses.recv().await.unwrap();
//! assert_eq!(response.pdu.varbinds[0].value, Value::from("eth0"));
//! assert_eq!(response.pdu.varbinds[1].value, Value::from("eth1"));
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod ber;
pub mod coexistence;
pub mod counters;
pub mod error;
pub mod message;
pub mod object;
pub mod oid;
pub mod pdu;
pub mod pool;
pub mod prelude;
pub mod processor;
pub mod proxy;
pub mod query;
pub mod registry;
pub mod request;
pub mod scope;
pub mod transport;
pub mod value;
pub mod varbind;
pub mod version;

// Re-exports for convenience
pub use error::{Error, ErrorStatus, OidErrorKind, Result};
pub use message::{SecurityLevel, SecurityModel};
pub use oid::Oid;
pub use pdu::{Pdu, PduType};
pub use scope::Scope;
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;
