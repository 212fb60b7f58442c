//! Processor configuration.

use std::time::Duration;

use bytes::Bytes;

/// Default deadline for a request from arrival to response (five minutes).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Default bound on a single lock wait.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of requests processed concurrently.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Tunables for a [`CommandProcessor`](super::CommandProcessor).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProcessorConfig {
    /// How long a request may stay in progress before it is expired.
    pub request_timeout: Duration,
    /// Maximum wait for an object lock; zero waits indefinitely.
    pub lock_timeout: Duration,
    /// Requests processed at once on the worker pool. Zero processes each
    /// request inline, in the caller of `process_pdu`.
    pub max_concurrent_requests: usize,
    /// Return instrumentation faults from `process_pdu` instead of answering
    /// with an error status.
    pub forward_instrumentation_errors: bool,
    /// Context engine IDs served locally. Requests for any other engine go
    /// to the proxy map. An empty list accepts every engine ID.
    pub own_context_engine_ids: Vec<Bytes>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            forward_instrumentation_errors: false,
            own_context_engine_ids: Vec::new(),
        }
    }
}

impl ProcessorConfig {
    /// Whether `engine_id` is served by this processor.
    ///
    /// An empty engine ID (community-based requests without coexistence
    /// mapping) is always local.
    pub fn is_own_engine(&self, engine_id: &[u8]) -> bool {
        engine_id.is_empty()
            || self.own_context_engine_ids.is_empty()
            || self.own_context_engine_ids.iter().any(|own| own.as_ref() == engine_id)
    }
}
