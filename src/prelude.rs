//! Prelude module for convenient imports.
//!
//! # Usage
//!
//! ```rust,no_run
//! use async_snmp_agent::prelude::*;
//! ```
//!
//! This imports:
//! - Core types: [`Oid`], [`Scope`], [`Value`], [`VarBind`], [`Pdu`]
//! - The agent pieces: [`Registry`], [`CommandProcessor`], [`ManagedObject`]
//! - Error handling: [`Error`], [`ErrorStatus`], [`Result`]
//! - The [`oid!`] macro for compile-time OID construction

pub use crate::error::{Error, ErrorStatus, Result};
pub use crate::object::{BoxFuture, ManagedObject, ObjectError, ObjectResult, Scalar, SubtreeObject};
pub use crate::oid::Oid;
pub use crate::pdu::{Pdu, PduType};
pub use crate::processor::CommandProcessor;
pub use crate::registry::Registry;
pub use crate::request::{RequestContext, SubRequest};
pub use crate::scope::Scope;
pub use crate::transport::{RequestEvent, ResponseSender};
pub use crate::value::Value;
pub use crate::varbind::VarBind;
pub use crate::version::Version;

#[doc(no_inline)]
pub use crate::oid;
