//! Priority ordering for registry snapshots.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::oid::Oid;
use crate::scope::Scope;

use super::registry_order;

/// Orders scopes by configured OID-prefix priorities.
///
/// A scope's priority is that of the longest configured prefix of its lower
/// bound. Prioritized scopes come before unprioritized ones, lower values
/// first; ties fall back to the registry order.
///
/// ```rust
/// use async_snmp_agent::registry::ScopePriority;
/// use async_snmp_agent::{Scope, oid};
///
/// let priority = ScopePriority::new()
///     .with(oid!(1, 3, 6, 1, 6, 3), 0)    // SNMP framework first
///     .with(oid!(1, 3, 6, 1, 2, 1), 10);
///
/// assert_eq!(priority.priority(&oid!(1, 3, 6, 1, 6, 3, 15, 1)), Some(0));
/// assert_eq!(priority.priority(&oid!(1, 3, 6, 1, 4, 1)), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScopePriority {
    priorities: BTreeMap<Oid, i32>,
}

impl ScopePriority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `priority` to every scope whose lower bound starts with `prefix`.
    pub fn with(mut self, prefix: Oid, priority: i32) -> Self {
        self.priorities.insert(prefix, priority);
        self
    }

    /// Priority of `oid`: the entry for its longest configured prefix.
    pub fn priority(&self, oid: &Oid) -> Option<i32> {
        // Every prefix of `oid` sorts at or before it, so walk backwards.
        self.priorities
            .range(..=oid.clone())
            .rev()
            .find(|(prefix, _)| oid.starts_with(prefix))
            .map(|(_, priority)| *priority)
    }

    /// Compare two scopes.
    pub fn compare(&self, a: &Scope, b: &Scope) -> Ordering {
        let pa = self.priority(a.lower_bound());
        let pb = self.priority(b.lower_bound());
        match (pa, pb) {
            (Some(x), Some(y)) if x != y => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            _ => registry_order(a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn test_longest_prefix_wins() {
        let priority = ScopePriority::new()
            .with(oid!(1, 3, 6, 1), 5)
            .with(oid!(1, 3, 6, 1, 2, 1, 2), 1);
        assert_eq!(priority.priority(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 1)), Some(1));
        assert_eq!(priority.priority(&oid!(1, 3, 6, 1, 2, 1, 1)), Some(5));
        assert_eq!(priority.priority(&oid!(1, 3, 6)), None);
    }

    #[test]
    fn test_compare() {
        let priority = ScopePriority::new().with(oid!(1, 3, 6, 1, 6), 0);
        let framework = Scope::subtree(oid!(1, 3, 6, 1, 6, 3, 1));
        let mib2 = Scope::subtree(oid!(1, 3, 6, 1, 2, 1, 1));
        let mib2_if = Scope::subtree(oid!(1, 3, 6, 1, 2, 1, 2));

        assert_eq!(priority.compare(&framework, &mib2), Ordering::Less);
        assert_eq!(priority.compare(&mib2, &framework), Ordering::Greater);
        assert_eq!(priority.compare(&mib2, &mib2_if), Ordering::Less);
    }

    #[test]
    fn test_sort_by_priority() {
        let priority = ScopePriority::new()
            .with(oid!(1, 3, 6, 1, 4), 2)
            .with(oid!(1, 3, 6, 1, 2), 1);
        let mut scopes = vec![
            Scope::point(oid!(1, 3, 6, 1, 1, 0)),
            Scope::point(oid!(1, 3, 6, 1, 4, 1, 0)),
            Scope::point(oid!(1, 3, 6, 1, 2, 1, 0)),
        ];
        scopes.sort_by(|a, b| priority.compare(a, b));
        let lowers: Vec<_> = scopes.iter().map(|s| s.lower_bound().clone()).collect();
        assert_eq!(
            lowers,
            vec![oid!(1, 3, 6, 1, 2, 1, 0), oid!(1, 3, 6, 1, 4, 1, 0), oid!(1, 3, 6, 1, 1, 0)]
        );
    }
}
