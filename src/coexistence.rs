//! Community-based coexistence (RFC 3584).
//!
//! SNMPv1 and SNMPv2c messages carry a community string instead of a scoped
//! PDU. A [`CoexistenceProvider`] maps the community to the security name,
//! context engine ID, and context name the request is processed under, and
//! decides whether the requesting address may use it.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;
use subtle::ConstantTimeEq;

/// What a community stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoexistenceInfo {
    /// Security name used for access control.
    pub security_name: Bytes,
    pub context_engine_id: Bytes,
    pub context_name: Bytes,
    /// Largest response the community's managers accept, in octets.
    pub max_message_size: Option<usize>,
    /// Tag selecting the source addresses allowed to use the community.
    /// `None` allows every source.
    pub transport_tag: Option<Bytes>,
}

impl CoexistenceInfo {
    /// A mapping onto `security_name` in the default context of `context_engine_id`.
    pub fn new(security_name: impl Into<Bytes>, context_engine_id: impl Into<Bytes>) -> Self {
        Self {
            security_name: security_name.into(),
            context_engine_id: context_engine_id.into(),
            context_name: Bytes::new(),
            max_message_size: None,
            transport_tag: None,
        }
    }

    pub fn context_name(mut self, context_name: impl Into<Bytes>) -> Self {
        self.context_name = context_name.into();
        self
    }

    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = Some(size);
        self
    }

    pub fn transport_tag(mut self, tag: impl Into<Bytes>) -> Self {
        self.transport_tag = Some(tag.into());
        self
    }
}

/// Resolves communities for community-based requests.
pub trait CoexistenceProvider: Send + Sync + 'static {
    /// Candidate mappings for `community`, in preference order.
    fn coexistence_info(&self, community: &[u8]) -> Vec<CoexistenceInfo>;

    /// Whether `peer` may use `info`.
    fn passes_filter(&self, peer: SocketAddr, info: &CoexistenceInfo) -> bool;
}

#[derive(Debug, Clone)]
struct CommunityEntry {
    community: Bytes,
    info: CoexistenceInfo,
}

/// Static community table.
///
/// ```rust
/// use async_snmp_agent::coexistence::{CoexistenceInfo, CoexistenceProvider, CommunityTable};
///
/// let table = CommunityTable::new()
///     .community("public", CoexistenceInfo::new("readers", "local"))
///     .community(
///         "private",
///         CoexistenceInfo::new("admins", "local").transport_tag("mgmt"),
///     )
///     .tag_addresses("mgmt", ["10.0.0.5".parse().unwrap()]);
///
/// let peer = "10.0.0.9:50000".parse().unwrap();
/// let admins = &table.coexistence_info(b"private")[0];
/// assert!(!table.passes_filter(peer, admins));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommunityTable {
    entries: Vec<CommunityEntry>,
    tags: HashMap<Bytes, Vec<IpAddr>>,
}

impl CommunityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `community` to `info`. A community may be mapped more than once.
    pub fn community(mut self, community: impl Into<Bytes>, info: CoexistenceInfo) -> Self {
        self.entries.push(CommunityEntry {
            community: community.into(),
            info,
        });
        self
    }

    /// Addresses allowed for entries tagged with `tag`.
    pub fn tag_addresses(
        mut self,
        tag: impl Into<Bytes>,
        addresses: impl IntoIterator<Item = IpAddr>,
    ) -> Self {
        self.tags.entry(tag.into()).or_default().extend(addresses);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CoexistenceProvider for CommunityTable {
    fn coexistence_info(&self, community: &[u8]) -> Vec<CoexistenceInfo> {
        // Compare against every entry so timing does not reveal which one matched.
        let mut found = Vec::new();
        for entry in &self.entries {
            let matches = entry.community.len() == community.len()
                && bool::from(entry.community.as_ref().ct_eq(community));
            if matches {
                found.push(entry.info.clone());
            }
        }
        found
    }

    fn passes_filter(&self, peer: SocketAddr, info: &CoexistenceInfo) -> bool {
        let Some(tag) = &info.transport_tag else {
            return true;
        };
        let allowed = self
            .tags
            .get(tag)
            .is_some_and(|addresses| addresses.contains(&peer.ip()));
        if !allowed {
            tracing::warn!(
                target: "async_snmp_agent::coexistence",
                { peer = %peer, tag = ?tag },
                "source address not allowed for community"
            );
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CommunityTable {
        CommunityTable::new()
            .community("public", CoexistenceInfo::new("readers", "engine").max_message_size(484))
            .community("public", CoexistenceInfo::new("readers", "engine").context_name("bridge1"))
            .community("private", CoexistenceInfo::new("admins", "engine").transport_tag("mgmt"))
            .tag_addresses("mgmt", ["192.0.2.10".parse().unwrap()])
    }

    #[test]
    fn test_lookup_by_community() {
        let table = table();
        let infos = table.coexistence_info(b"public");
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].max_message_size, Some(484));
        assert_eq!(infos[1].context_name, Bytes::from_static(b"bridge1"));
        assert!(table.coexistence_info(b"publi").is_empty());
        assert!(table.coexistence_info(b"secret").is_empty());
    }

    #[test]
    fn test_source_filter() {
        let table = table();
        let info = &table.coexistence_info(b"private")[0];
        assert!(table.passes_filter("192.0.2.10:1024".parse().unwrap(), info));
        assert!(!table.passes_filter("192.0.2.11:1024".parse().unwrap(), info));

        let untagged = &table.coexistence_info(b"public")[0];
        assert!(table.passes_filter("198.51.100.1:1024".parse().unwrap(), untagged));
    }

    #[test]
    fn test_unknown_tag_denies() {
        let info = CoexistenceInfo::new("admins", "engine").transport_tag("nowhere");
        let table = CommunityTable::new().community("private", info);
        let info = &table.coexistence_info(b"private")[0];
        assert!(!table.passes_filter("192.0.2.10:1024".parse().unwrap(), info));
    }
}
