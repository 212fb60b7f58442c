//! Sorted instance storage for managed objects.

use crate::oid::Oid;
use crate::scope::Scope;

/// Instances of a managed object kept in lexicographic OID order.
///
/// Backs [`SubtreeObject`](super::SubtreeObject) and is useful for custom
/// objects that serve many instances: [`first_in`](Self::first_in) answers
/// both the registry's `find` and the object's `next`.
///
/// ```rust
/// use async_snmp_agent::object::OidTable;
/// use async_snmp_agent::{Scope, Value, oid};
///
/// let mut table = OidTable::new();
/// table.insert(oid!(1, 3, 6, 1, 4, 1, 99999, 1, 0), Value::Integer(42));
/// table.insert(oid!(1, 3, 6, 1, 4, 1, 99999, 2, 0), Value::from("test"));
///
/// let range = Scope::after(oid!(1, 3, 6, 1, 4, 1, 99999, 1, 0));
/// let (next, _) = table.first_in(&range).unwrap();
/// assert_eq!(next, &oid!(1, 3, 6, 1, 4, 1, 99999, 2, 0));
/// ```
#[derive(Debug, Clone)]
pub struct OidTable<V> {
    entries: Vec<(Oid, V)>,
}

impl<V> OidTable<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    fn search(&self, oid: &Oid) -> Result<usize, usize> {
        self.entries.binary_search_by(|(o, _)| o.cmp(oid))
    }

    /// Insert or replace the value at `oid`. Returns the replaced value.
    pub fn insert(&mut self, oid: Oid, value: V) -> Option<V> {
        match self.search(&oid) {
            Ok(idx) => Some(std::mem::replace(&mut self.entries[idx].1, value)),
            Err(idx) => {
                self.entries.insert(idx, (oid, value));
                None
            }
        }
    }

    pub fn remove(&mut self, oid: &Oid) -> Option<V> {
        self.search(oid).ok().map(|idx| self.entries.remove(idx).1)
    }

    pub fn get(&self, oid: &Oid) -> Option<&V> {
        self.search(oid).ok().map(|idx| &self.entries[idx].1)
    }

    pub fn get_mut(&mut self, oid: &Oid) -> Option<&mut V> {
        self.search(oid).ok().map(|idx| &mut self.entries[idx].1)
    }

    pub fn contains(&self, oid: &Oid) -> bool {
        self.search(oid).is_ok()
    }

    /// First instance strictly after `oid`.
    pub fn get_next(&self, oid: &Oid) -> Option<(&Oid, &V)> {
        let idx = match self.search(oid) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        };
        self.entries.get(idx).map(|(o, v)| (o, v))
    }

    /// First instance within `range`, honoring both of its bounds.
    pub fn first_in(&self, range: &Scope) -> Option<(&Oid, &V)> {
        let lower = range.lower_bound();
        let idx = match self.search(lower) {
            Ok(idx) if range.is_lower_included() => idx,
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        };
        self.entries
            .get(idx)
            .filter(|(oid, _)| range.contains(oid))
            .map(|(o, v)| (o, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = (&Oid, &V)> {
        self.entries.iter().map(|(o, v)| (o, v))
    }
}

impl<V> Default for OidTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<(Oid, V)> for OidTable<V> {
    fn from_iter<I: IntoIterator<Item = (Oid, V)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (oid, value) in iter {
            table.insert(oid, value);
        }
        table
    }
}
