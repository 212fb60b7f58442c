//! Time-bounded tracking of requests in progress.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::TransactionId;

struct Entry<T> {
    deadline: Instant,
    parked: Option<T>,
}

/// Requests the processor has accepted but not yet answered.
///
/// Every request is tracked from arrival until its response is sent.
/// Requests left incomplete after a pass are parked here with their state
/// until they are driven again or expire.
pub struct RequestList<T> {
    timeout: Duration,
    entries: Mutex<HashMap<TransactionId, Entry<T>>>,
}

impl<T> RequestList<T> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// How long a request may stay in the list.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start tracking `id`; its deadline is now plus the timeout.
    pub fn track(&self, id: TransactionId) {
        let deadline = Instant::now() + self.timeout;
        self.entries.lock().insert(
            id,
            Entry {
                deadline,
                parked: None,
            },
        );
    }

    /// Park the state of a tracked request for a later pass.
    ///
    /// Returns the state back if `id` is no longer tracked (it expired).
    pub fn park(&self, id: TransactionId, state: T) -> Result<(), T> {
        match self.entries.lock().get_mut(&id) {
            Some(entry) => {
                entry.parked = Some(state);
                Ok(())
            }
            None => Err(state),
        }
    }

    /// Take every parked request, leaving them tracked.
    pub fn take_parked(&self) -> Vec<(TransactionId, T)> {
        let mut entries = self.entries.lock();
        let mut parked: Vec<_> = entries
            .iter_mut()
            .filter_map(|(id, entry)| entry.parked.take().map(|state| (*id, state)))
            .collect();
        parked.sort_by_key(|(id, _)| *id);
        parked
    }

    /// Stop tracking `id`. Returns whether it was tracked.
    pub fn remove(&self, id: TransactionId) -> bool {
        self.entries.lock().remove(&id).is_some()
    }

    pub fn contains(&self, id: TransactionId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove every request whose deadline has passed at `now`.
    ///
    /// Returns the expired transactions with any parked state, so the caller
    /// can release what they still hold.
    pub fn expire(&self, now: Instant) -> Vec<(TransactionId, Option<T>)> {
        let mut entries = self.entries.lock();
        let expired: Vec<TransactionId> = entries
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| entries.remove(&id).map(|entry| (id, entry.parked)))
            .collect()
    }
}
