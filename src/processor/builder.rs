//! Fluent construction of a [`CommandProcessor`].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::access::AccessControl;
use crate::coexistence::CoexistenceProvider;
use crate::counters::{AgentCounters, CounterListener};
use crate::error::{Error, Result};
use crate::pool::{TokioWorkerPool, WorkerPool};
use crate::proxy::ProxyMap;
use crate::registry::Registry;
use crate::request::RequestList;
use crate::transport::ResponseSender;

use super::{
    CommandProcessor, GetBulkHandler, GetHandler, GetNextHandler, Inner, ProcessingPolicy,
    ProcessorConfig, RequestHandler, SetHandler,
};

/// Builder for [`CommandProcessor`].
///
/// A response sender and at least one registry are required. Everything
/// else has a default:
///
/// - Request timeout: 300 seconds
/// - Lock timeout: 5 seconds
/// - Max concurrent requests: 100, on a [`TokioWorkerPool`]
/// - No access control, coexistence, or proxy
/// - Counters kept in an [`AgentCounters`]
pub struct CommandProcessorBuilder {
    config: ProcessorConfig,
    registries: Vec<Arc<Registry>>,
    handlers: Vec<Arc<dyn RequestHandler>>,
    access: Option<Arc<dyn AccessControl>>,
    coexistence: Option<Arc<dyn CoexistenceProvider>>,
    proxy: Option<Arc<ProxyMap>>,
    counters: Option<Arc<dyn CounterListener>>,
    sender: Option<Arc<dyn ResponseSender>>,
    pool: Option<Arc<dyn WorkerPool>>,
    cancel: Option<CancellationToken>,
}

impl CommandProcessorBuilder {
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
            registries: Vec::new(),
            handlers: Vec::new(),
            access: None,
            coexistence: None,
            proxy: None,
            counters: None,
            sender: None,
            pool: None,
            cancel: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a registry. Registries are consulted in the order added; a
    /// request goes to the first one supporting its context.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registries.push(registry);
        self
    }

    /// Restrict every request to the view the access control grants it.
    pub fn access_control(mut self, access: Arc<dyn AccessControl>) -> Self {
        self.access = Some(access);
        self
    }

    /// Resolve v1/v2c communities through `provider`.
    pub fn coexistence(mut self, provider: Arc<dyn CoexistenceProvider>) -> Self {
        self.coexistence = Some(provider);
        self
    }

    /// Forward requests for foreign context engine IDs through `proxy`.
    pub fn proxy(mut self, proxy: Arc<ProxyMap>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn counter_listener(mut self, listener: Arc<dyn CounterListener>) -> Self {
        self.counters = Some(listener);
        self
    }

    pub fn response_sender(mut self, sender: Arc<dyn ResponseSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Run requests on `pool` instead of the default [`TokioWorkerPool`].
    pub fn worker_pool(mut self, pool: Arc<dyn WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Maximum wait for an object lock. Zero waits indefinitely.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    /// Zero processes requests inline in `process_pdu`.
    pub fn max_concurrent_requests(mut self, limit: usize) -> Self {
        self.config.max_concurrent_requests = limit;
        self
    }

    /// Add a context engine ID served locally.
    pub fn context_engine_id(mut self, engine_id: impl Into<Bytes>) -> Self {
        self.config.own_context_engine_ids.push(engine_id.into());
        self
    }

    pub fn forward_instrumentation_errors(mut self, forward: bool) -> Self {
        self.config.forward_instrumentation_errors = forward;
        self
    }

    /// Add a request handler. Added handlers take precedence over the
    /// built-in GET, GETNEXT, GETBULK, and SET handlers.
    pub fn handler(mut self, handler: Arc<dyn RequestHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Token stopping the expiry sweeper. A fresh one is created if unset.
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Result<CommandProcessor> {
        let sender = self
            .sender
            .ok_or_else(|| Error::config("a response sender is required"))?;
        if self.registries.is_empty() {
            return Err(Error::config("at least one registry is required"));
        }

        let mut handlers = self.handlers;
        handlers.push(Arc::new(GetHandler));
        handlers.push(Arc::new(GetNextHandler));
        handlers.push(Arc::new(GetBulkHandler));
        handlers.push(Arc::new(SetHandler));

        let pool = match (self.pool, self.config.max_concurrent_requests) {
            (Some(pool), _) => Some(pool),
            (None, 0) => None,
            (None, limit) => Some(Arc::new(TokioWorkerPool::new(limit)) as Arc<dyn WorkerPool>),
        };

        let mut policy = ProcessingPolicy::new(self.config.lock_timeout)
            .forward_instrumentation_errors(self.config.forward_instrumentation_errors);
        if let Some(access) = &self.access {
            policy = policy.access_control(Arc::clone(access));
        }

        let counters = self
            .counters
            .unwrap_or_else(|| Arc::new(AgentCounters::new()));

        tracing::debug!(
            target: "async_snmp_agent::processor",
            {
                registries = self.registries.len(),
                handlers = handlers.len(),
                pooled = pool.is_some()
            },
            "command processor built"
        );

        Ok(CommandProcessor {
            inner: Arc::new(Inner {
                requests: RequestList::new(self.config.request_timeout),
                config: self.config,
                registries: self.registries,
                handlers,
                access: self.access,
                coexistence: self.coexistence,
                proxy: self.proxy,
                counters,
                sender,
                pool,
                policy,
                cancel: self.cancel.unwrap_or_default(),
            }),
        })
    }
}

impl Default for CommandProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
