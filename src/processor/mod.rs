//! Command processor: dispatches inbound requests to the registry.
//!
//! [`CommandProcessor::process_pdu`] takes a decoded [`RequestEvent`] through
//! the whole responder pipeline:
//!
//! 1. Resolve the security name and context, from the scoped PDU (v3) or
//!    from the [`CoexistenceProvider`] (v1/v2c). Unknown communities and
//!    denied source addresses are dropped and counted.
//! 2. Requests for a context engine ID that is not one of ours go to the
//!    [`ProxyMap`]; without a proxy map they are dropped.
//! 3. Pick the [`RequestHandler`] for the PDU type. Unknown types are
//!    counted and answered with a report (v3) or `genErr` (v1/v2c).
//! 4. Resolve the access-control view, pick the registry serving the
//!    context, and run the handler inline or on the worker pool, bounded by
//!    the request timeout.
//! 5. Once complete, release the transaction's locks and send the response
//!    under the size limit. Incomplete requests are parked until
//!    [`CommandProcessor::reprocess_pending`] drives them again.

mod builder;
mod bulk;
mod config;
mod get;
mod next;
mod response;
mod set;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use builder::CommandProcessorBuilder;
pub use bulk::GetBulkHandler;
pub use config::{
    DEFAULT_LOCK_TIMEOUT, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_REQUEST_TIMEOUT, ProcessorConfig,
};
pub use get::GetHandler;
pub use next::GetNextHandler;
pub use set::SetHandler;

use crate::access::{AccessControl, ViewType};
use crate::coexistence::{CoexistenceInfo, CoexistenceProvider};
use crate::counters::{Counter, CounterListener};
use crate::error::{Error, ErrorStatus, Result};
use crate::object::{BoxFuture, ObjectError};
use crate::pdu::{Pdu, PduType};
use crate::pool::WorkerPool;
use crate::proxy::{ProxyForwardRequest, ProxyMap, ProxyType};
use crate::query::Query;
use crate::registry::{LockRequest, Registry};
use crate::request::{Phase, Request, RequestContext, RequestList, SubRequest, TransactionId};
use crate::scope::Scope;
use crate::transport::{OutgoingResponse, RequestEvent, ResponseSender};
use crate::version::Version;

/// Processes one class of request against a registry.
///
/// A handler drives the request's current phase as far as it can. Leaving
/// sub-requests incomplete (for example after [`SubRequest::defer`] or a
/// lock timeout) parks the request; the handler is called again for the same
/// phase by [`CommandProcessor::reprocess_pending`].
///
/// Returning `Err` is reserved for instrumentation faults forwarded under
/// [`ProcessorConfig::forward_instrumentation_errors`].
pub trait RequestHandler: Send + Sync + 'static {
    fn is_supported(&self, pdu_type: PduType) -> bool;

    fn process<'a>(
        &'a self,
        request: &'a mut Request,
        registry: &'a Registry,
        policy: &'a ProcessingPolicy,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Settings handlers apply to every lookup and instrumentation call.
#[derive(Clone)]
pub struct ProcessingPolicy {
    lock_timeout: Duration,
    forward_instrumentation_errors: bool,
    access: Option<Arc<dyn AccessControl>>,
}

impl ProcessingPolicy {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            lock_timeout,
            forward_instrumentation_errors: false,
            access: None,
        }
    }

    pub fn forward_instrumentation_errors(mut self, forward: bool) -> Self {
        self.forward_instrumentation_errors = forward;
        self
    }

    pub fn access_control(mut self, access: Arc<dyn AccessControl>) -> Self {
        self.access = Some(access);
        self
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Registry query for `scope` on behalf of `request`, restricted to the
    /// request's view when access control is configured.
    pub fn query(&self, request: &Request, scope: Scope, write_intent: bool) -> Query {
        let query = Query::new(scope, write_intent).with_owner(request.transaction_id());
        match (&self.access, &request.context().view_name) {
            (Some(access), Some(view)) => query.with_view(view.clone(), Arc::clone(access)),
            _ => query,
        }
    }

    /// Lock parameters for lookups on behalf of `request`.
    pub fn lock_request(&self, request: &Request) -> LockRequest {
        LockRequest::new(request.transaction_id(), self.lock_timeout)
    }

    /// Record an instrumentation fault on `sub` and complete it.
    ///
    /// Returns the error to forward when faults are forwarded.
    pub(crate) fn record_fault(
        &self,
        sub: &mut SubRequest,
        default: ErrorStatus,
        error: ObjectError,
        phase: Phase,
    ) -> Option<Error> {
        let status = error.status_or(default);
        tracing::error!(
            target: "async_snmp_agent::processor",
            { oid = %sub.oid(), phase = %phase, status = %status, error = %error },
            "managed object failed"
        );
        sub.set_error(status);
        sub.complete();
        self.forward_instrumentation_errors.then(|| Error::Instrumentation {
            oid: sub.oid().clone(),
            source: error,
        })
    }

    /// [`record_fault`](Self::record_fault), failing with the forwarded error.
    pub(crate) fn fault(
        &self,
        sub: &mut SubRequest,
        default: ErrorStatus,
        error: ObjectError,
        phase: Phase,
    ) -> Result<()> {
        match self.record_fault(sub, default, error, phase) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ProcessingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingPolicy")
            .field("lock_timeout", &self.lock_timeout)
            .field("forward_instrumentation_errors", &self.forward_instrumentation_errors)
            .field("access_control", &self.access.is_some())
            .finish()
    }
}

/// Move a single-pass request from `Init` into its processing phase.
pub(crate) fn enter_process_phase(request: &mut Request) {
    if request.phase() == Phase::Init {
        request.next_phase();
    }
}

/// A request waiting to be driven again.
struct Pending {
    request: Request,
    event: RequestEvent,
    registry: Arc<Registry>,
    handler: Arc<dyn RequestHandler>,
}

/// How a request's security context was resolved.
enum Admission {
    /// Use the event's own context (v3, or no coexistence provider).
    Direct,
    /// Use a community mapping.
    Mapped(CoexistenceInfo),
    /// Drop the request.
    Denied,
}

/// Inner state shared across processor clones.
pub(crate) struct Inner {
    pub(crate) config: ProcessorConfig,
    pub(crate) registries: Vec<Arc<Registry>>,
    pub(crate) handlers: Vec<Arc<dyn RequestHandler>>,
    pub(crate) access: Option<Arc<dyn AccessControl>>,
    pub(crate) coexistence: Option<Arc<dyn CoexistenceProvider>>,
    pub(crate) proxy: Option<Arc<ProxyMap>>,
    pub(crate) counters: Arc<dyn CounterListener>,
    pub(crate) sender: Arc<dyn ResponseSender>,
    pub(crate) pool: Option<Arc<dyn WorkerPool>>,
    pub(crate) policy: ProcessingPolicy,
    requests: RequestList<Pending>,
    pub(crate) cancel: CancellationToken,
}

/// Processes SNMP command requests against one or more registries.
///
/// Cheap to clone; clones share all state.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use async_snmp_agent::object::Scalar;
/// use async_snmp_agent::pdu::Pdu;
/// use async_snmp_agent::processor::CommandProcessor;
/// use async_snmp_agent::registry::Registry;
/// use async_snmp_agent::transport::{ChannelSender, RequestEvent};
/// use async_snmp_agent::{Value, Version, oid};
///
/// # async fn example() -> async_snmp_agent::Result<()> {
/// let registry = Arc::new(Registry::new());
/// registry.register(
///     Arc::new(Scalar::read_only(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("edge-1"))),
///     None,
/// )?;
///
/// let (sender, mut responses) = ChannelSender::new();
/// let processor = CommandProcessor::builder()
///     .registry(registry)
///     .response_sender(Arc::new(sender))
///     .max_concurrent_requests(0)
///     .build()?;
///
/// let pdu = Pdu::get_request(1, &[oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)]);
/// let peer = "192.0.2.1:50000".parse().unwrap();
/// processor
///     .process_pdu(RequestEvent::community(Version::V2c, "public", peer, pdu))
///     .await?;
///
/// let (_, response) = responses.recv().await.unwrap();
/// assert_eq!(response.pdu.varbinds[0].value, Value::from("edge-1"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CommandProcessor {
    pub(crate) inner: Arc<Inner>,
}

impl CommandProcessor {
    pub fn builder() -> CommandProcessorBuilder {
        CommandProcessorBuilder::new()
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.inner.config
    }

    pub fn registries(&self) -> &[Arc<Registry>] {
        &self.inner.registries
    }

    /// Requests accepted but not yet answered.
    pub fn pending_requests(&self) -> usize {
        self.inner.requests.len()
    }

    /// Token that stops the expiry sweeper.
    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Process an inbound request.
    ///
    /// Protocol problems are answered in-band or dropped and counted; they
    /// never surface here. Errors are limited to response send failures and
    /// forwarded instrumentation faults. With a worker pool the request runs
    /// in the background and this returns once it is submitted.
    pub async fn process_pdu(&self, mut event: RequestEvent) -> Result<()> {
        let pdu_type = event.pdu.pdu_type;
        if matches!(pdu_type, PduType::Response | PduType::Report) {
            tracing::debug!(
                target: "async_snmp_agent::processor",
                { peer = %event.peer(), pdu_type = %pdu_type },
                "ignoring non-request PDU"
            );
            return Ok(());
        }

        let info = match self.admit(&event) {
            Admission::Direct => None,
            Admission::Mapped(info) => Some(info),
            Admission::Denied => return Ok(()),
        };
        if let Some(max) = info.as_ref().and_then(|info| info.max_message_size) {
            event.max_size_response_pdu = event.max_size_response_pdu.min(max);
        }

        let engine_id = match &info {
            Some(info) => info.context_engine_id.clone(),
            None => event.context_engine_id.clone(),
        };
        if !self.inner.config.is_own_engine(&engine_id) {
            return self.forward(event, info, engine_id).await;
        }

        match &self.inner.pool {
            Some(pool) => {
                let this = self.clone();
                pool.execute(Box::pin(async move {
                    if let Err(e) = this.run(event, info).await {
                        tracing::debug!(
                            target: "async_snmp_agent::processor",
                            { error = %e },
                            "request finished with error"
                        );
                    }
                }));
                Ok(())
            }
            None => self.run(event, info).await,
        }
    }

    fn admit(&self, event: &RequestEvent) -> Admission {
        if !event.version.is_community_based() {
            return Admission::Direct;
        }
        let Some(provider) = &self.inner.coexistence else {
            return Admission::Direct;
        };
        let infos = provider.coexistence_info(&event.security_name);
        if infos.is_empty() {
            tracing::info!(
                target: "async_snmp_agent::coexistence",
                { peer = %event.peer() },
                "unknown community name"
            );
            self.inner.counters.increment(Counter::InBadCommunityNames);
            return Admission::Denied;
        }
        match infos.into_iter().find(|info| provider.passes_filter(event.peer(), info)) {
            Some(info) => Admission::Mapped(info),
            None => {
                tracing::warn!(
                    target: "async_snmp_agent::coexistence",
                    { peer = %event.peer() },
                    "access denied by source address filter"
                );
                self.inner.counters.increment(Counter::InBadCommunityNames);
                Admission::Denied
            }
        }
    }

    fn handler_for(&self, pdu_type: PduType) -> Option<Arc<dyn RequestHandler>> {
        self.inner
            .handlers
            .iter()
            .find(|handler| handler.is_supported(pdu_type))
            .cloned()
    }

    fn request_context(
        &self,
        event: &RequestEvent,
        info: Option<&CoexistenceInfo>,
    ) -> RequestContext {
        let (security_name, context_engine_id, context_name) = match info {
            Some(info) => (
                info.security_name.clone(),
                info.context_engine_id.clone(),
                info.context_name.clone(),
            ),
            None => (
                event.security_name.clone(),
                event.context_engine_id.clone(),
                event.context_name.clone(),
            ),
        };
        RequestContext {
            peer: event.peer(),
            version: event.version,
            security_model: event.security_model,
            security_name,
            security_level: event.security_level,
            context_engine_id,
            context_name,
            request_id: event.pdu.request_id,
            pdu_type: event.pdu.pdu_type,
            transaction_id: TransactionId::next(),
            view_name: None,
        }
    }

    async fn run(&self, event: RequestEvent, info: Option<CoexistenceInfo>) -> Result<()> {
        let pdu_type = event.pdu.pdu_type;
        let Some(handler) = self.handler_for(pdu_type) else {
            return self.unknown_pdu(&event).await;
        };

        let mut context = self.request_context(&event, info.as_ref());
        let denied = match &self.inner.access {
            Some(access) => {
                let view_type = if pdu_type == PduType::SetRequest {
                    ViewType::Write
                } else {
                    ViewType::Read
                };
                context.view_name = access.view_name(
                    &context.context_name,
                    &context.security_name,
                    context.security_model,
                    context.security_level,
                    view_type,
                );
                context.view_name.is_none()
            }
            None => false,
        };

        let mut request = Request::new(context, event.pdu.clone(), event.max_size_response_pdu);
        let tx = request.transaction_id();
        self.inner.requests.track(tx);
        tracing::debug!(
            target: "async_snmp_agent::processor",
            {
                request_id = event.pdu.request_id,
                transaction_id = %tx,
                pdu_type = %pdu_type,
                peer = %event.peer()
            },
            "processing request"
        );

        if denied {
            tracing::info!(
                target: "async_snmp_agent::processor",
                { request_id = event.pdu.request_id, context = ?request.context_name() },
                "no view for request, authorization error"
            );
            request.fail(ErrorStatus::AuthorizationError);
            return self.finish(&request, &event, None).await;
        }

        let registry = self
            .inner
            .registries
            .iter()
            .find(|registry| registry.is_context_supported(request.context_name()))
            .cloned();
        let Some(registry) = registry else {
            tracing::info!(
                target: "async_snmp_agent::processor",
                { request_id = event.pdu.request_id, context = ?request.context_name() },
                "no registry serves the context"
            );
            request.fail(ErrorStatus::GenErr);
            return self.finish(&request, &event, None).await;
        };

        self.drive(Pending {
            request,
            event,
            registry,
            handler,
        })
        .await
    }

    /// Run the handler once, bounded by what is left of the request timeout.
    async fn drive(&self, pending: Pending) -> Result<()> {
        let Pending {
            mut request,
            event,
            registry,
            handler,
        } = pending;
        let tx = request.transaction_id();
        let timeout = self.inner.config.request_timeout;
        let deadline = tokio::time::Instant::from_std(request.created_at() + timeout);

        let outcome = tokio::time::timeout_at(
            deadline,
            handler.process(&mut request, &registry, &self.inner.policy),
        )
        .await;

        match outcome {
            Err(_) => {
                tracing::warn!(
                    target: "async_snmp_agent::processor",
                    { request_id = event.pdu.request_id, transaction_id = %tx },
                    "request timed out, dropping"
                );
                registry.release_locks(tx);
                self.inner.requests.remove(tx);
                Ok(())
            }
            Ok(Err(e)) => {
                registry.release_locks(tx);
                self.inner.requests.remove(tx);
                Err(e)
            }
            Ok(Ok(())) if request.is_complete() => {
                self.finish(&request, &event, Some(&registry)).await
            }
            Ok(Ok(())) => {
                tracing::debug!(
                    target: "async_snmp_agent::processor",
                    {
                        request_id = event.pdu.request_id,
                        transaction_id = %tx,
                        phase = %request.phase()
                    },
                    "request incomplete, parked"
                );
                let parked = Pending {
                    request,
                    event,
                    registry,
                    handler,
                };
                if let Err(expired) = self.inner.requests.park(tx, parked) {
                    tracing::warn!(
                        target: "async_snmp_agent::processor",
                        { transaction_id = %tx },
                        "request expired while processing"
                    );
                    expired.registry.release_locks(tx);
                }
                Ok(())
            }
        }
    }

    /// Stop tracking `request`, release its locks, and answer it.
    async fn finish(
        &self,
        request: &Request,
        event: &RequestEvent,
        registry: Option<&Registry>,
    ) -> Result<()> {
        let tx = request.transaction_id();
        self.inner.requests.remove(tx);
        if let Some(registry) = registry {
            registry.release_locks(tx);
        }
        let mut pdu = request.to_response();
        if event.version == Version::V1 {
            response::map_to_v1(&mut pdu);
        }
        self.send(event, pdu, request.pdu_type() == PduType::GetBulkRequest)
            .await
    }

    /// Send `pdu` in reply to `event`, applying the size limit.
    async fn send(&self, event: &RequestEvent, pdu: Pdu, bulk: bool) -> Result<()> {
        let request_id = pdu.request_id;
        let Some(pdu) = response::fit_to_size(pdu, bulk, event.max_size_response_pdu) else {
            self.inner.counters.increment(Counter::SilentDrops);
            tracing::warn!(
                target: "async_snmp_agent::processor",
                { request_id, max_size = event.max_size_response_pdu },
                "response exceeds size limit, dropped"
            );
            return Ok(());
        };
        let response = OutgoingResponse::reply_to(event, pdu);
        if let Err(e) = self.inner.sender.send_response(&event.state_reference, response).await {
            tracing::error!(
                target: "async_snmp_agent::processor",
                { request_id, peer = %event.peer(), error = %e },
                "failed to send response"
            );
            return Err(Error::Send { source: e });
        }
        Ok(())
    }

    async fn unknown_pdu(&self, event: &RequestEvent) -> Result<()> {
        let value = self.inner.counters.increment(Counter::UnknownPduHandlers);
        tracing::info!(
            target: "async_snmp_agent::processor",
            { request_id = event.pdu.request_id, pdu_type = %event.pdu.pdu_type },
            "no handler for PDU type"
        );
        if !event.pdu.pdu_type.is_confirmed() {
            return Ok(());
        }
        let pdu = if event.version == Version::V3 {
            response::counter_report(&event.pdu, Counter::UnknownPduHandlers, value)
        } else {
            event.pdu.to_error_response(ErrorStatus::GenErr)
        };
        self.send(event, pdu, false).await
    }

    async fn forward(
        &self,
        event: RequestEvent,
        coexistence: Option<CoexistenceInfo>,
        context_engine_id: bytes::Bytes,
    ) -> Result<()> {
        let Some(proxy) = &self.inner.proxy else {
            self.inner.counters.increment(Counter::SilentDrops);
            tracing::debug!(
                target: "async_snmp_agent::proxy",
                { peer = %event.peer(), engine_id = ?context_engine_id },
                "foreign context engine ID without proxy, dropped"
            );
            return Ok(());
        };
        let pdu_type = event.pdu.pdu_type;
        let forwarder = ProxyType::of(pdu_type).and_then(|proxy_type| {
            proxy
                .get(&context_engine_id, proxy_type)
                .map(|f| (f, proxy_type))
        });
        let Some((forwarder, proxy_type)) = forwarder else {
            self.inner.counters.increment(Counter::ProxyDrops);
            tracing::debug!(
                target: "async_snmp_agent::proxy",
                { peer = %event.peer(), engine_id = ?context_engine_id, pdu_type = %pdu_type },
                "no forwarder, dropped"
            );
            return Ok(());
        };

        let request = ProxyForwardRequest {
            event,
            coexistence,
            context_engine_id,
            proxy_type,
        };
        match forwarder.forward(&request).await {
            Some(pdu) => self.send(&request.event, pdu, pdu_type == PduType::GetBulkRequest).await,
            None if proxy_type == ProxyType::Notify => Ok(()),
            None => {
                let value = self.inner.counters.increment(Counter::ProxyDrops);
                tracing::debug!(
                    target: "async_snmp_agent::proxy",
                    {
                        request_id = request.event.pdu.request_id,
                        engine_id = ?request.context_engine_id
                    },
                    "request not forwarded"
                );
                if request.event.version != Version::V3 {
                    return Ok(());
                }
                let report =
                    response::counter_report(&request.event.pdu, Counter::ProxyDrops, value);
                self.send(&request.event, report, false).await
            }
        }
    }

    /// Drive every parked request again.
    ///
    /// Returns how many requests were driven. Errors from individual
    /// requests do not stop the others; the first one is returned.
    pub async fn reprocess_pending(&self) -> Result<usize> {
        let parked = self.inner.requests.take_parked();
        let count = parked.len();
        let mut first_error = None;
        for (tx, mut pending) in parked {
            pending.request.reset_processed();
            tracing::debug!(
                target: "async_snmp_agent::processor",
                { transaction_id = %tx, reprocess_count = pending.request.reprocess_count() },
                "reprocessing request"
            );
            if let Err(e) = self.drive(pending).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(count),
        }
    }

    /// Drop every request past its deadline and release its locks.
    ///
    /// Returns the number of requests expired.
    pub fn expire_stale(&self) -> usize {
        let expired = self.inner.requests.expire(Instant::now());
        for (tx, parked) in &expired {
            tracing::warn!(
                target: "async_snmp_agent::processor",
                { transaction_id = %tx },
                "request expired"
            );
            match parked {
                Some(pending) => {
                    pending.registry.release_locks(*tx);
                }
                None => {
                    for registry in &self.inner.registries {
                        registry.release_locks(*tx);
                    }
                }
            }
        }
        expired.len()
    }

    /// Run [`expire_stale`](Self::expire_stale) every `period` until the
    /// cancellation token fires.
    pub fn spawn_expiry_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let this = self.clone();
        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!(
                            target: "async_snmp_agent::processor",
                            "expiry sweeper stopped"
                        );
                        break;
                    }
                    _ = ticker.tick() => {
                        this.expire_stale();
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for CommandProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandProcessor")
            .field("config", &self.inner.config)
            .field("registries", &self.inner.registries.len())
            .field("handlers", &self.inner.handlers.len())
            .field("pending_requests", &self.inner.requests.len())
            .finish()
    }
}
