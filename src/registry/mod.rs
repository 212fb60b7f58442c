//! The managed-object registry.
//!
//! Entries map a [`Scope`] to a managed object and are kept sorted by
//! scope, upper bound first, so that a walk starting at any OID meets
//! candidates in ascending OID order. One walk serves both exact lookups
//! (GET, SET) and "first object after" lookups (GETNEXT, GETBULK).
//!
//! # Contexts
//!
//! An object registered without a context (or with the empty context) is
//! visible in every context. An object registered for a named context is
//! only visible to requests for that context. Within what a context can
//! see, scopes never overlap.
//!
//! # Locking
//!
//! Each registry owns a [`LockTable`]. A [`LockStrategy`] decides per
//! lookup whether the object found must be locked for the query's
//! transaction; the default locks only for write intent.

mod lock;
mod priority;

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

pub use lock::{AlwaysLock, LockRequest, LockStatus, LockStrategy, LockTable, WriteIntentLocking};
pub use priority::ScopePriority;

use crate::error::{Error, Result};
use crate::object::{ManagedObject, ObjectId};
use crate::oid::Oid;
use crate::query::Query;
use crate::request::TransactionId;
use crate::scope::Scope;

/// A registry entry: the scope captured at registration and the object.
#[derive(Clone)]
pub struct RegisteredObject {
    pub scope: Scope,
    pub object: Arc<dyn ManagedObject>,
}

impl RegisteredObject {
    pub fn id(&self) -> ObjectId {
        ObjectId::of(&self.object)
    }
}

impl std::fmt::Debug for RegisteredObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredObject")
            .field("scope", &self.scope)
            .field("id", &self.id())
            .finish()
    }
}

/// Selects registry entries for [`Registry::iterate_by`].
pub trait ObjectFilter {
    fn passes(&self, entry: &RegisteredObject) -> bool;
}

impl<F> ObjectFilter for F
where
    F: Fn(&RegisteredObject) -> bool,
{
    fn passes(&self, entry: &RegisteredObject) -> bool {
        self(entry)
    }
}

/// The order registry entries are kept in: upper bound (unbounded last),
/// excluded before included upper bound, then lower bound, included lower
/// bound first, then context.
pub fn registry_order(a: &Scope, b: &Scope) -> Ordering {
    let upper = match (a.upper_bound(), b.upper_bound()) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    upper
        .then_with(|| a.is_upper_included().cmp(&b.is_upper_included()))
        .then_with(|| a.lower_bound().cmp(b.lower_bound()))
        .then_with(|| b.is_lower_included().cmp(&a.is_lower_included()))
        .then_with(|| a.context().cmp(&b.context()))
}

#[derive(Clone, PartialEq, Eq)]
struct ScopeKey(Scope);

impl Ord for ScopeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        registry_order(&self.0, &other.0)
    }
}

impl PartialOrd for ScopeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl ScopeKey {
    /// Smallest key whose entry could reach `oid`: every entry sorting
    /// before it ends below `oid`.
    fn seek(oid: &Oid) -> Self {
        ScopeKey(Scope::new(Oid::empty(), true, Some(oid.clone()), false))
    }
}

#[derive(Default)]
struct Index {
    entries: BTreeMap<ScopeKey, Arc<dyn ManagedObject>>,
    identities: HashMap<(ObjectId, Option<Bytes>), ScopeKey>,
}

/// An ordered, context-aware store of managed objects.
pub struct Registry {
    index: Mutex<Index>,
    contexts: Mutex<BTreeSet<Bytes>>,
    locks: LockTable,
    lock_strategy: Option<Arc<dyn LockStrategy>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry that locks for write intent.
    pub fn new() -> Self {
        Self {
            index: Mutex::new(Index::default()),
            contexts: Mutex::new(BTreeSet::new()),
            locks: LockTable::new(),
            lock_strategy: Some(Arc::new(WriteIntentLocking)),
        }
    }

    /// Replace the lock strategy.
    pub fn with_lock_strategy(mut self, strategy: impl LockStrategy) -> Self {
        self.lock_strategy = Some(Arc::new(strategy));
        self
    }

    /// Never lock. Suitable for read-only or static content.
    pub fn without_locking(mut self) -> Self {
        self.lock_strategy = None;
        self
    }

    /// Register `object` under its scope, in `context` or in all contexts.
    ///
    /// Fails with [`Error::DuplicateRegistration`] if the scope overlaps an
    /// entry visible in the same context.
    pub fn register(&self, object: Arc<dyn ManagedObject>, context: Option<Bytes>) -> Result<()> {
        let context = context.filter(|c| !c.is_empty());
        let scope = object.scope().with_context(context.clone());
        let id = ObjectId::of(&object);

        let mut index = self.index.lock();
        let conflict = index
            .entries
            .range(ScopeKey::seek(scope.lower_bound())..)
            .map(|(key, _)| &key.0)
            .find(|existing| existing.overlaps(&scope))
            .cloned();
        if let Some(existing) = conflict {
            tracing::debug!(
                target: "async_snmp_agent::registry",
                { %scope, %existing },
                "duplicate registration"
            );
            return Err(Error::DuplicateRegistration { scope });
        }

        let key = ScopeKey(scope.clone());
        index.entries.insert(key.clone(), object);
        index.identities.insert((id, context), key);
        drop(index);

        tracing::debug!(
            target: "async_snmp_agent::registry",
            { %scope },
            "registered managed object"
        );
        Ok(())
    }

    /// Remove the registration of `object` in `context`.
    ///
    /// Returns the object if it was registered there.
    pub fn unregister(
        &self,
        object: &Arc<dyn ManagedObject>,
        context: Option<Bytes>,
    ) -> Option<Arc<dyn ManagedObject>> {
        let context = context.filter(|c| !c.is_empty());
        let id = ObjectId::of(object);

        let mut index = self.index.lock();
        let Some(key) = index.identities.remove(&(id, context.clone())) else {
            tracing::debug!(
                target: "async_snmp_agent::registry",
                { context = ?context },
                "object not registered in context"
            );
            return None;
        };
        let removed = index.entries.remove(&key);
        drop(index);

        tracing::debug!(
            target: "async_snmp_agent::registry",
            { scope = %key.0 },
            "unregistered managed object"
        );
        removed
    }

    /// Find the first object at or after the query's lower bound that
    /// overlaps its scope and matches it.
    ///
    /// With a `lock` request and a strategy that requires it, the object is
    /// locked for `lock.owner` before it is matched; a candidate that does
    /// not match is unlocked again. A candidate whose lock times out is
    /// skipped and the outcome reported as [`LockStatus::LockTimedOut`] if
    /// nothing else matches.
    pub async fn lookup(
        &self,
        query: &Query,
        mut lock: Option<&mut LockRequest>,
    ) -> Option<RegisteredObject> {
        if let Some(request) = lock.as_deref_mut() {
            request.status = LockStatus::NotRequired;
        }
        let needs_lock = self
            .lock_strategy
            .as_ref()
            .is_some_and(|strategy| strategy.is_lock_needed(query));
        let mut timed_out = false;
        let mut after: Option<ScopeKey> = None;

        loop {
            let candidate = {
                let index = self.index.lock();
                let lower = match &after {
                    Some(key) => Bound::Excluded(key.clone()),
                    None => Bound::Included(ScopeKey::seek(query.scope().lower_bound())),
                };
                index
                    .entries
                    .range((lower, Bound::Unbounded))
                    .find(|(key, _)| query.scope().overlaps(&key.0))
                    .map(|(key, object)| (key.clone(), Arc::clone(object)))
            };
            let Some((key, object)) = candidate else {
                break;
            };
            after = Some(key.clone());
            let found = RegisteredObject {
                scope: key.0,
                object,
            };
            tracing::trace!(
                target: "async_snmp_agent::registry",
                { scope = %found.scope, query = %query.scope() },
                "lookup candidate"
            );

            let mut locked = false;
            if let (true, Some(request)) = (needs_lock, lock.as_deref_mut()) {
                let id = found.id();
                if !self.locks.try_lock(request.owner, id)
                    && !self.locks.lock(request.owner, id, request.timeout).await
                {
                    timed_out = true;
                    continue;
                }
                locked = true;
                request.status = if timed_out {
                    LockStatus::LockedAfterTimeout
                } else {
                    LockStatus::Locked
                };
            }

            if query.matches(found.object.as_ref()) {
                return Some(found);
            }
            if locked {
                if let Some(request) = lock.as_deref_mut() {
                    self.locks.unlock(request.owner, found.id());
                    request.status = LockStatus::NotRequired;
                }
            }
        }

        if timed_out {
            if let Some(request) = lock {
                request.status = LockStatus::LockTimedOut;
            }
        }
        None
    }

    /// The object registered with lower bound `key` in `context`.
    ///
    /// `None` as context searches every context.
    pub fn get_managed_object(
        &self,
        key: &Oid,
        context: Option<&Bytes>,
    ) -> Option<Arc<dyn ManagedObject>> {
        let index = self.index.lock();
        index
            .entries
            .range(ScopeKey::seek(key)..)
            .find(|(entry, _)| {
                entry.0.lower_bound() == key && Scope::contexts_match(entry.0.context(), context)
            })
            .map(|(_, object)| Arc::clone(object))
    }

    /// Snapshot of all entries in registry order.
    pub fn iterate(&self) -> Vec<RegisteredObject> {
        let index = self.index.lock();
        index
            .entries
            .iter()
            .map(|(key, object)| RegisteredObject {
                scope: key.0.clone(),
                object: Arc::clone(object),
            })
            .collect()
    }

    /// Snapshot of the entries passing `filter`, sorted by `compare`.
    pub fn iterate_by<F>(
        &self,
        compare: F,
        filter: Option<&dyn ObjectFilter>,
    ) -> Vec<RegisteredObject>
    where
        F: FnMut(&Scope, &Scope) -> Ordering,
    {
        let mut compare = compare;
        let mut entries: Vec<_> = self
            .iterate()
            .into_iter()
            .filter(|entry| filter.is_none_or(|f| f.passes(entry)))
            .collect();
        entries.sort_by(|a, b| compare(&a.scope, &b.scope));
        entries
    }

    /// Contexts `object` is registered in; `None` stands for all contexts.
    pub fn registered_contexts(&self, object: &Arc<dyn ManagedObject>) -> Vec<Option<Bytes>> {
        let id = ObjectId::of(object);
        let index = self.index.lock();
        let mut contexts: Vec<_> = index
            .identities
            .keys()
            .filter(|(entry, _)| *entry == id)
            .map(|(_, context)| context.clone())
            .collect();
        contexts.sort();
        contexts
    }

    /// Registered scope of `object` per context.
    pub fn registered_scopes(
        &self,
        object: &Arc<dyn ManagedObject>,
    ) -> HashMap<Option<Bytes>, Scope> {
        let id = ObjectId::of(object);
        let index = self.index.lock();
        index
            .identities
            .iter()
            .filter(|((entry, _), _)| *entry == id)
            .map(|((_, context), key)| (context.clone(), key.0.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.index.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.lock().entries.is_empty()
    }

    /// Declare `context` as served by this registry.
    pub fn add_context(&self, context: impl Into<Bytes>) {
        self.contexts.lock().insert(context.into());
    }

    pub fn remove_context(&self, context: &[u8]) -> bool {
        self.contexts.lock().remove(context)
    }

    /// Named contexts served by this registry.
    pub fn contexts(&self) -> Vec<Bytes> {
        self.contexts.lock().iter().cloned().collect()
    }

    /// The default context is always supported; named contexts must have
    /// been added.
    pub fn is_context_supported(&self, context: &[u8]) -> bool {
        context.is_empty() || self.contexts.lock().contains(context)
    }

    /// Acquire `object` for `owner`, waiting up to `timeout` (zero waits
    /// indefinitely).
    pub async fn lock(
        &self,
        owner: TransactionId,
        object: &Arc<dyn ManagedObject>,
        timeout: Duration,
    ) -> bool {
        self.locks.lock(owner, ObjectId::of(object), timeout).await
    }

    pub fn try_lock(&self, owner: TransactionId, object: &Arc<dyn ManagedObject>) -> bool {
        self.locks.try_lock(owner, ObjectId::of(object))
    }

    pub fn unlock(&self, owner: TransactionId, object: &Arc<dyn ManagedObject>) -> bool {
        self.locks.unlock(owner, ObjectId::of(object))
    }

    pub fn is_locked(&self, object: &Arc<dyn ManagedObject>) -> bool {
        self.locks.is_locked(ObjectId::of(object))
    }

    /// Release everything `owner` holds. Used when a request expires.
    pub fn release_locks(&self, owner: TransactionId) -> usize {
        self.locks.release_all(owner)
    }

    /// The lock table, for inspection.
    pub fn lock_table(&self) -> &LockTable {
        &self.locks
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.len())
            .field("contexts", &self.contexts())
            .field("locked", &self.locks.len())
            .finish()
    }
}
