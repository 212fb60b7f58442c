//! Reentrant per-object advisory locks.
//!
//! Locks are keyed by object identity and owned by a transaction, not by a
//! task or thread: the same request may take the same object's lock any
//! number of times and must release it as often. Other transactions wait
//! until the count drops to zero, bounded by a timeout.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::object::ObjectId;
use crate::query::Query;
use crate::request::TransactionId;

#[derive(Debug)]
struct LockSlot {
    owner: TransactionId,
    count: u32,
    created_at: Instant,
}

/// Lock table of one registry.
#[derive(Debug, Default)]
pub struct LockTable {
    slots: Mutex<HashMap<ObjectId, LockSlot>>,
    released: Notify,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire `object` for `owner`, waiting up to `timeout` for another
    /// owner to release it. A zero timeout waits indefinitely.
    ///
    /// Returns whether the lock was acquired.
    pub async fn lock(&self, owner: TransactionId, object: ObjectId, timeout: Duration) -> bool {
        let deadline = (!timeout.is_zero()).then(|| tokio::time::Instant::now() + timeout);
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            // Register before checking, so a release between the check and
            // the wait is not missed.
            notified.as_mut().enable();

            if self.try_lock(owner, object) {
                return true;
            }

            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep_until(deadline) => {
                            if self.try_lock(owner, object) {
                                return true;
                            }
                            tracing::warn!(
                                target: "async_snmp_agent::lock",
                                { transaction_id = %owner, ?timeout },
                                "lock wait timed out"
                            );
                            return false;
                        }
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Acquire without waiting.
    pub fn try_lock(&self, owner: TransactionId, object: ObjectId) -> bool {
        let mut slots = self.slots.lock();
        match slots.get_mut(&object) {
            Some(slot) if slot.owner == owner => {
                slot.count += 1;
                true
            }
            Some(_) => false,
            None => {
                slots.insert(
                    object,
                    LockSlot {
                        owner,
                        count: 1,
                        created_at: Instant::now(),
                    },
                );
                true
            }
        }
    }

    /// Release one acquisition of `object` by `owner`.
    ///
    /// Returns `false`, changing nothing, if `owner` does not hold the lock.
    pub fn unlock(&self, owner: TransactionId, object: ObjectId) -> bool {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(&object) else {
            return false;
        };
        if slot.owner != owner {
            return false;
        }
        slot.count -= 1;
        if slot.count == 0 {
            let held = slot.created_at.elapsed();
            slots.remove(&object);
            drop(slots);
            tracing::trace!(
                target: "async_snmp_agent::lock",
                { transaction_id = %owner, ?held },
                "lock released"
            );
            self.released.notify_waiters();
        }
        true
    }

    pub fn is_locked(&self, object: ObjectId) -> bool {
        self.slots.lock().contains_key(&object)
    }

    /// Current owner of `object`'s lock.
    pub fn holder(&self, object: ObjectId) -> Option<TransactionId> {
        self.slots.lock().get(&object).map(|slot| slot.owner)
    }

    /// Release every lock `owner` holds, whatever the count.
    ///
    /// Returns how many objects were released.
    pub fn release_all(&self, owner: TransactionId) -> usize {
        let released = {
            let mut slots = self.slots.lock();
            let before = slots.len();
            slots.retain(|_, slot| slot.owner != owner);
            before - slots.len()
        };
        if released > 0 {
            tracing::debug!(
                target: "async_snmp_agent::lock",
                { transaction_id = %owner, released },
                "released all locks of transaction"
            );
            self.released.notify_waiters();
        }
        released
    }

    /// Number of locked objects.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

/// Outcome of the lock step of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockStatus {
    /// The strategy required no lock.
    #[default]
    NotRequired,
    /// Acquired without waiting.
    Locked,
    /// Acquired after waiting for another owner.
    LockedAfterTimeout,
    /// Not acquired within the timeout.
    LockTimedOut,
}

/// Lock parameters for a lookup, updated with the outcome.
#[derive(Debug, Clone)]
pub struct LockRequest {
    /// Transaction that will own the lock.
    pub owner: TransactionId,
    /// Maximum wait; zero waits indefinitely.
    pub timeout: Duration,
    /// What happened on the last lookup.
    pub status: LockStatus,
}

impl LockRequest {
    pub fn new(owner: TransactionId, timeout: Duration) -> Self {
        Self {
            owner,
            timeout,
            status: LockStatus::NotRequired,
        }
    }

    /// Whether the last lookup holds a lock the caller must release.
    pub fn is_locked(&self) -> bool {
        matches!(self.status, LockStatus::Locked | LockStatus::LockedAfterTimeout)
    }
}

/// Decides whether a lookup has to lock the object it finds.
pub trait LockStrategy: Send + Sync + 'static {
    fn is_lock_needed(&self, query: &Query) -> bool;
}

/// Lock only for queries that intend to write. The default strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteIntentLocking;

impl LockStrategy for WriteIntentLocking {
    fn is_lock_needed(&self, query: &Query) -> bool {
        query.is_write_intent()
    }
}

/// Lock on every lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysLock;

impl LockStrategy for AlwaysLock {
    fn is_lock_needed(&self, _query: &Query) -> bool {
        true
    }
}
