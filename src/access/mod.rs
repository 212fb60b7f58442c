//! Access control seam.
//!
//! The processor resolves a view name once per request and then asks the
//! same [`AccessControl`] whether each candidate OID lies within that view.
//! [`VacmConfig`] is the bundled View-based Access Control Model
//! implementation; agents with their own policy store implement the trait
//! directly.

mod vacm;

use bytes::Bytes;

pub use vacm::{AccessEntry, AccessEntryBuilder, VacmBuilder, VacmConfig, View, ViewSubtree};

use crate::message::{SecurityLevel, SecurityModel};
use crate::oid::Oid;

/// The kind of access a request intends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ViewType {
    /// GET, GETNEXT, GETBULK
    Read,
    /// SET
    Write,
    /// Notification generation
    Notify,
}

/// Resolves views and authorizes OIDs against them.
pub trait AccessControl: Send + Sync + 'static {
    /// Name of the view granted to this principal for `view_type`, or `None`
    /// when no access is configured at all.
    fn view_name(
        &self,
        context_name: &[u8],
        security_name: &[u8],
        security_model: SecurityModel,
        security_level: SecurityLevel,
        view_type: ViewType,
    ) -> Option<Bytes>;

    /// Check whether `oid` is within `view_name`.
    fn is_access_allowed(&self, view_name: &[u8], oid: &Oid) -> bool;
}
