//! View-based Access Control Model (RFC 3415).
//!
//! Three tables decide whether a principal may touch an OID:
//!
//! 1. security-to-group: `(securityModel, securityName) -> groupName`
//! 2. access: `(groupName, context, securityModel, securityLevel) -> views`
//! 3. view tree family: `viewName -> subtrees`, each included or excluded,
//!    with an optional wildcard mask
//!
//! # Example
//!
//! ```rust
//! use async_snmp_agent::access::{AccessControl, VacmBuilder, ViewType};
//! use async_snmp_agent::message::{SecurityLevel, SecurityModel};
//! use async_snmp_agent::oid;
//!
//! let vacm = VacmBuilder::new()
//!     .group("public", SecurityModel::V2c, "readers")
//!     .group("private", SecurityModel::V2c, "writers")
//!     .access("readers", |a| a.read_view("system"))
//!     .access("writers", |a| a.read_view("all").write_view("all"))
//!     .view("system", |v| v.include(oid!(1, 3, 6, 1, 2, 1, 1)))
//!     .view("all", |v| v.include(oid!(1, 3, 6, 1)))
//!     .build();
//!
//! let view = vacm
//!     .view_name(b"", b"public", SecurityModel::V2c, SecurityLevel::NoAuthNoPriv, ViewType::Read)
//!     .unwrap();
//! assert!(vacm.is_access_allowed(&view, &oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)));
//! assert!(!vacm.is_access_allowed(&view, &oid!(1, 3, 6, 1, 2, 1, 2, 1, 0)));
//!
//! // "public" has no write view
//! assert!(vacm
//!     .view_name(b"", b"public", SecurityModel::V2c, SecurityLevel::NoAuthNoPriv, ViewType::Write)
//!     .is_none());
//! ```

use std::collections::HashMap;

use bytes::Bytes;

use super::{AccessControl, ViewType};
use crate::message::{SecurityLevel, SecurityModel};
use crate::oid::Oid;

/// How an access entry's context prefix is compared to the request context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ContextMatch {
    #[default]
    Exact,
    Prefix,
}

/// A named family of OID subtrees.
///
/// Membership follows RFC 3415 Section 5: among all subtrees matching an
/// OID, the longest one decides; between equally long subtrees the
/// lexicographically greater one wins.
///
/// ```rust
/// use async_snmp_agent::access::View;
/// use async_snmp_agent::oid;
///
/// let view = View::new()
///     .include(oid!(1, 3, 6, 1, 2, 1))
///     .exclude(oid!(1, 3, 6, 1, 2, 1, 25))
///     .include(oid!(1, 3, 6, 1, 2, 1, 25, 1));
///
/// assert!(view.contains(&oid!(1, 3, 6, 1, 2, 1, 1, 0)));
/// assert!(!view.contains(&oid!(1, 3, 6, 1, 2, 1, 25, 2, 0)));
/// assert!(view.contains(&oid!(1, 3, 6, 1, 2, 1, 25, 1, 1, 0)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct View {
    subtrees: Vec<ViewSubtree>,
}

impl View {
    /// An empty view. It contains nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Include every OID under `oid`.
    pub fn include(self, oid: Oid) -> Self {
        self.subtree(oid, Vec::new(), true)
    }

    /// Include OIDs matching `oid` under a wildcard mask.
    pub fn include_masked(self, oid: Oid, mask: Vec<u8>) -> Self {
        self.subtree(oid, mask, true)
    }

    /// Exclude every OID under `oid`.
    pub fn exclude(self, oid: Oid) -> Self {
        self.subtree(oid, Vec::new(), false)
    }

    /// Exclude OIDs matching `oid` under a wildcard mask.
    pub fn exclude_masked(self, oid: Oid, mask: Vec<u8>) -> Self {
        self.subtree(oid, mask, false)
    }

    fn subtree(mut self, oid: Oid, mask: Vec<u8>, included: bool) -> Self {
        self.subtrees.push(ViewSubtree {
            oid,
            mask,
            included,
        });
        self
    }

    /// Check whether `oid` is in the view.
    pub fn contains(&self, oid: &Oid) -> bool {
        self.subtrees
            .iter()
            .filter(|s| s.matches(oid))
            .max_by(|a, b| a.oid.len().cmp(&b.oid.len()).then_with(|| a.oid.cmp(&b.oid)))
            .is_some_and(|s| s.included)
    }
}

/// One entry of a view tree family.
#[derive(Debug, Clone)]
pub struct ViewSubtree {
    /// Subtree root.
    pub oid: Oid,
    /// Wildcard mask, one bit per arc, most significant bit first.
    ///
    /// A 1 bit requires the arc to match; a 0 bit accepts any value. Arcs
    /// beyond the mask must match.
    pub mask: Vec<u8>,
    /// Included (`true`) or excluded (`false`).
    pub included: bool,
}

impl ViewSubtree {
    /// Check whether `oid` falls under this subtree, honouring the mask.
    pub fn matches(&self, oid: &Oid) -> bool {
        let root = self.oid.arcs();
        let arcs = oid.arcs();
        if arcs.len() < root.len() {
            return false;
        }
        root.iter().zip(arcs).enumerate().all(|(i, (expected, actual))| {
            let significant = self
                .mask
                .get(i / 8)
                .map_or(true, |byte| (byte >> (7 - (i % 8))) & 1 == 1);
            !significant || expected == actual
        })
    }
}

/// A row of the access table.
#[derive(Debug, Clone)]
pub struct AccessEntry {
    /// Group the row applies to.
    pub group_name: Bytes,
    /// Context name, or prefix of it.
    pub context_prefix: Bytes,
    /// Security model, `Any` for every model.
    pub security_model: SecurityModel,
    /// Minimum security level.
    pub security_level: SecurityLevel,
    context_match: ContextMatch,
    /// View for GET/GETNEXT/GETBULK.
    pub read_view: Bytes,
    /// View for SET.
    pub write_view: Bytes,
    /// View for notifications.
    pub notify_view: Bytes,
}

impl AccessEntry {
    fn view(&self, view_type: ViewType) -> &Bytes {
        match view_type {
            ViewType::Read => &self.read_view,
            ViewType::Write => &self.write_view,
            ViewType::Notify => &self.notify_view,
        }
    }

    fn context_matches(&self, context: &[u8]) -> bool {
        match self.context_match {
            ContextMatch::Exact => self.context_prefix.as_ref() == context,
            ContextMatch::Prefix => context.starts_with(&self.context_prefix),
        }
    }
}

/// Builder for one access table row, used through [`VacmBuilder::access`].
pub struct AccessEntryBuilder {
    entry: AccessEntry,
}

impl AccessEntryBuilder {
    /// Start a row for `group_name`: any model, noAuthNoPriv, default context,
    /// no views.
    pub fn new(group_name: impl Into<Bytes>) -> Self {
        Self {
            entry: AccessEntry {
                group_name: group_name.into(),
                context_prefix: Bytes::new(),
                security_model: SecurityModel::Any,
                security_level: SecurityLevel::NoAuthNoPriv,
                context_match: ContextMatch::Exact,
                read_view: Bytes::new(),
                write_view: Bytes::new(),
                notify_view: Bytes::new(),
            },
        }
    }

    /// Context name (exact) or prefix (with [`context_match_prefix`](Self::context_match_prefix)).
    pub fn context_prefix(mut self, prefix: impl Into<Bytes>) -> Self {
        self.entry.context_prefix = prefix.into();
        self
    }

    /// Compare the context by prefix instead of exactly.
    pub fn context_match_prefix(mut self) -> Self {
        self.entry.context_match = ContextMatch::Prefix;
        self
    }

    /// Restrict the row to one security model.
    pub fn security_model(mut self, model: SecurityModel) -> Self {
        self.entry.security_model = model;
        self
    }

    /// Require at least `level`.
    pub fn security_level(mut self, level: SecurityLevel) -> Self {
        self.entry.security_level = level;
        self
    }

    pub fn read_view(mut self, view: impl Into<Bytes>) -> Self {
        self.entry.read_view = view.into();
        self
    }

    pub fn write_view(mut self, view: impl Into<Bytes>) -> Self {
        self.entry.write_view = view.into();
        self
    }

    pub fn notify_view(mut self, view: impl Into<Bytes>) -> Self {
        self.entry.notify_view = view.into();
        self
    }

    /// Finish the row.
    pub fn build(self) -> AccessEntry {
        self.entry
    }
}

/// The three VACM tables.
#[derive(Debug, Clone, Default)]
pub struct VacmConfig {
    groups: HashMap<(SecurityModel, Bytes), Bytes>,
    access: Vec<AccessEntry>,
    views: HashMap<Bytes, View>,
}

impl VacmConfig {
    /// Empty tables: every lookup fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `security_name` under `security_model` to `group_name`.
    pub fn add_group(
        &mut self,
        security_name: impl Into<Bytes>,
        security_model: SecurityModel,
        group_name: impl Into<Bytes>,
    ) {
        self.groups
            .insert((security_model, security_name.into()), group_name.into());
    }

    pub fn add_access(&mut self, entry: AccessEntry) {
        self.access.push(entry);
    }

    pub fn add_view(&mut self, name: impl Into<Bytes>, view: View) {
        self.views.insert(name.into(), view);
    }

    /// Group of a principal. A mapping for the exact model wins over one
    /// registered for `Any`.
    pub fn group(&self, model: SecurityModel, name: &[u8]) -> Option<&Bytes> {
        let name = Bytes::copy_from_slice(name);
        self.groups
            .get(&(model, name.clone()))
            .or_else(|| self.groups.get(&(SecurityModel::Any, name)))
    }

    /// Best access row for a request (RFC 3415 Section 4, vacmAccessTable).
    ///
    /// Preference: specific model over `Any`, exact context over prefix,
    /// longer prefix, then higher security level.
    pub fn access_entry(
        &self,
        group: &[u8],
        context: &[u8],
        model: SecurityModel,
        level: SecurityLevel,
    ) -> Option<&AccessEntry> {
        self.access
            .iter()
            .filter(|e| {
                e.group_name.as_ref() == group
                    && e.context_matches(context)
                    && (e.security_model == model || e.security_model == SecurityModel::Any)
                    && level >= e.security_level
            })
            .max_by_key(|e| {
                (
                    e.security_model == model,
                    e.context_match == ContextMatch::Exact,
                    e.context_prefix.len(),
                    e.security_level,
                )
            })
    }

    /// Look up a view by name.
    pub fn view(&self, name: &[u8]) -> Option<&View> {
        self.views.get(name)
    }
}

impl AccessControl for VacmConfig {
    fn view_name(
        &self,
        context_name: &[u8],
        security_name: &[u8],
        security_model: SecurityModel,
        security_level: SecurityLevel,
        view_type: ViewType,
    ) -> Option<Bytes> {
        let group = self.group(security_model, security_name)?;
        let entry = self.access_entry(group, context_name, security_model, security_level)?;
        let view = entry.view(view_type);
        if view.is_empty() {
            return None;
        }
        Some(view.clone())
    }

    fn is_access_allowed(&self, view_name: &[u8], oid: &Oid) -> bool {
        self.view(view_name).is_some_and(|view| view.contains(oid))
    }
}

/// Fluent construction of a [`VacmConfig`].
#[derive(Default)]
pub struct VacmBuilder {
    config: VacmConfig,
}

impl VacmBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a community or user name to a group.
    pub fn group(
        mut self,
        security_name: impl Into<Bytes>,
        security_model: SecurityModel,
        group_name: impl Into<Bytes>,
    ) -> Self {
        self.config.add_group(security_name, security_model, group_name);
        self
    }

    /// Add an access row for `group_name`.
    pub fn access<F>(mut self, group_name: impl Into<Bytes>, configure: F) -> Self
    where
        F: FnOnce(AccessEntryBuilder) -> AccessEntryBuilder,
    {
        let entry = configure(AccessEntryBuilder::new(group_name)).build();
        self.config.add_access(entry);
        self
    }

    /// Define a view.
    pub fn view<F>(mut self, name: impl Into<Bytes>, configure: F) -> Self
    where
        F: FnOnce(View) -> View,
    {
        self.config.add_view(name, configure(View::new()));
        self
    }

    pub fn build(self) -> VacmConfig {
        self.config
    }
}
