use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::StreamExt;
use msgport_transport::{BoxInbound, BoxOutbound, Endpoint, TransportError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::{PortConfig, RequestOptions};
use crate::envelope::{Envelope, RemoteError, RequestId};
use crate::error::{PortError, Result};
use crate::handler::{
    notification_handler, request_handler, NotificationHandler, RequestHandler,
};
use crate::pending::{PendingEntry, PendingTable};

const NO_HANDLER: &str = "no request handler installed";
const HANDLER_PANICKED: &str = "request handler panicked";
const CANCELLED_BY_PEER: &str = "request cancelled by peer";
const UNDELIVERABLE: &str = "response could not be delivered";

/// Lifecycle state of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    /// Accepts requests and notifications, dispatches inbound messages.
    Open,
    /// Refuses new requests; outstanding ones may still settle.
    Closing,
    /// Terminal. Every pending request has been rejected and the transport
    /// released.
    Closed,
}

/// Request/response endpoint over one raw transport endpoint.
///
/// The port owns its transport. Inbound messages are dispatched by a task on
/// the tokio runtime that opened the port, in transport delivery order.
/// Request handlers run as separate tasks, so responses may complete out of
/// order. Dropping the port closes it.
pub struct AsyncPort {
    shared: Arc<Shared>,
}

/// Configures handlers before the port starts dispatching.
///
/// Installing handlers here rather than on the open port closes the window
/// in which an early request would find no handler.
#[derive(Default)]
pub struct PortBuilder {
    config: PortConfig,
    request_handler: Option<RequestHandler>,
    notification_handler: Option<NotificationHandler>,
}

impl PortBuilder {
    pub fn config(mut self, config: PortConfig) -> Self {
        self.config = config;
        self
    }

    pub fn on_request<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, RemoteError>> + Send + 'static,
    {
        self.request_handler = Some(request_handler(handler));
        self
    }

    pub fn on_notification<F>(mut self, handler: F) -> Self
    where
        F: Fn(Value) -> std::result::Result<(), RemoteError> + Send + Sync + 'static,
    {
        self.notification_handler = Some(notification_handler(handler));
        self
    }

    /// Take ownership of `endpoint` and start dispatching.
    ///
    /// Must be called from within a tokio runtime. On error the endpoint is
    /// dropped, which releases it.
    pub fn open<E: Endpoint>(self, endpoint: E) -> Result<AsyncPort> {
        let runtime = Handle::try_current().map_err(|_| PortError::NoRuntime)?;
        let transport = endpoint.transport_name();
        let (outbound, inbound) = endpoint.split()?;

        let shared = Arc::new(Shared {
            config: self.config,
            runtime: runtime.clone(),
            closed: CancellationToken::new(),
            inner: Mutex::new(Inner {
                state: PortState::Open,
                pending: PendingTable::new(),
                outbound: Some(outbound),
                request_handler: self.request_handler,
                notification_handler: self.notification_handler,
                inflight: HashMap::new(),
                grace_timer: None,
            }),
        });

        runtime.spawn(dispatch_loop(Arc::clone(&shared), inbound));
        debug!(port = %shared.config.name, transport, "port opened");

        Ok(AsyncPort { shared })
    }
}

impl AsyncPort {
    /// Open a port with default configuration and no handlers.
    pub fn new<E: Endpoint>(endpoint: E) -> Result<Self> {
        Self::builder().open(endpoint)
    }

    /// Open a port with explicit configuration.
    pub fn with_config<E: Endpoint>(endpoint: E, config: PortConfig) -> Result<Self> {
        Self::builder().config(config).open(endpoint)
    }

    pub fn builder() -> PortBuilder {
        PortBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    pub fn config(&self) -> &PortConfig {
        &self.shared.config
    }

    pub fn state(&self) -> PortState {
        self.shared.lock().state
    }

    pub fn is_closed(&self) -> bool {
        self.state() == PortState::Closed
    }

    /// Number of requests issued by this port still awaiting settlement.
    pub fn pending_count(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Send a request and return a future for its outcome.
    ///
    /// The request is on the wire when this returns. The port's default
    /// timeout applies.
    pub fn request(&self, payload: Value) -> PendingReply {
        self.request_with(payload, RequestOptions::default())
    }

    /// Send a request with per-call options.
    pub fn request_with(&self, payload: Value, options: RequestOptions) -> PendingReply {
        let timeout = options.resolve_timeout(&self.shared.config);
        self.shared.start_request(payload, timeout)
    }

    /// Typed request: serialize `request`, await the reply, deserialize it.
    pub async fn call<Req, Resp>(&self, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_value(request)?;
        let result = self.request(payload).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Send a one-way notification.
    pub fn post(&self, payload: Value) -> Result<()> {
        let inner = self.shared.lock();
        if inner.state != PortState::Open {
            return Err(PortError::Closed);
        }
        let outbound = inner.outbound.as_ref().ok_or(PortError::Closed)?;
        outbound.send(Envelope::Notification { payload }.encode()?)?;
        trace!(port = %self.shared.config.name, "notification sent");
        Ok(())
    }

    /// Install or replace the handler for inbound requests.
    pub fn on_request<F, Fut>(&self, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, RemoteError>> + Send + 'static,
    {
        let handler = request_handler(handler);
        let mut inner = self.shared.lock();
        if inner.state != PortState::Closed {
            inner.request_handler = Some(handler);
        }
    }

    /// Install or replace the handler for inbound notifications.
    ///
    /// Runs on the dispatcher, in delivery order. Errors and panics are
    /// logged and otherwise ignored.
    pub fn on_notification<F>(&self, handler: F)
    where
        F: Fn(Value) -> std::result::Result<(), RemoteError> + Send + Sync + 'static,
    {
        let handler = notification_handler(handler);
        let mut inner = self.shared.lock();
        if inner.state != PortState::Closed {
            inner.notification_handler = Some(handler);
        }
    }

    /// Close the port. Idempotent.
    ///
    /// Without a configured grace period every pending request is rejected
    /// with [`PortError::Closed`] immediately. With one, the port enters
    /// [`PortState::Closing`] until the pending table drains or the grace
    /// expires; calling `close` again while closing finishes at once.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Wait until the port reaches [`PortState::Closed`].
    pub async fn closed(&self) {
        self.shared.closed.cancelled().await;
    }
}

impl Drop for AsyncPort {
    fn drop(&mut self) {
        self.shared.finish_close();
    }
}

impl fmt::Debug for AsyncPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("AsyncPort")
            .field("name", &self.shared.config.name)
            .field("state", &inner.state)
            .field("pending", &inner.pending.len())
            .finish()
    }
}

/// Outcome of one request.
///
/// Resolves to the peer's result, or fails with [`PortError::Remote`],
/// [`PortError::Timeout`], [`PortError::Cancelled`] or [`PortError::Closed`].
/// Dropping an unsettled reply withdraws the request.
#[derive(Debug)]
#[must_use = "dropping a PendingReply withdraws the request"]
pub struct PendingReply {
    id: Option<RequestId>,
    rx: oneshot::Receiver<Result<Value>>,
    port: Weak<Shared>,
    done: bool,
}

impl PendingReply {
    fn failed(err: PortError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(err));
        Self {
            id: None,
            rx,
            port: Weak::new(),
            done: false,
        }
    }

    /// Correlation id, or `None` if the request never left the port.
    pub fn id(&self) -> Option<RequestId> {
        self.id
    }

    /// Withdraw the request. Returns `false` if it had already settled.
    pub fn cancel(&self) -> bool {
        self.cancel_handle().cancel()
    }

    /// Handle that can withdraw the request from elsewhere while this reply
    /// is being awaited.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            id: self.id,
            port: self.port.clone(),
        }
    }
}

impl Future for PendingReply {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = match Pin::new(&mut self.rx).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(outcome)) => outcome,
            Poll::Ready(Err(_)) => Err(PortError::Closed),
        };
        self.done = true;
        Poll::Ready(outcome)
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let (Some(id), Some(port)) = (self.id, self.port.upgrade()) {
            if port.cancel(id) {
                debug!(port = %port.config.name, id, "reply dropped before settlement");
            }
        }
    }
}

/// Cloneable handle that withdraws one request.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    id: Option<RequestId>,
    port: Weak<Shared>,
}

impl CancelHandle {
    /// Reject the request with [`PortError::Cancelled`] and tell the peer.
    ///
    /// Returns `false` if the request had already settled or the port is
    /// gone.
    pub fn cancel(&self) -> bool {
        match (self.id, self.port.upgrade()) {
            (Some(id), Some(port)) => port.cancel(id),
            _ => false,
        }
    }
}

struct Shared {
    config: PortConfig,
    runtime: Handle,
    /// Cancelled once the port reaches `Closed`; stops the dispatcher.
    closed: CancellationToken,
    inner: Mutex<Inner>,
}

struct Inner {
    state: PortState,
    pending: PendingTable,
    outbound: Option<BoxOutbound>,
    request_handler: Option<RequestHandler>,
    notification_handler: Option<NotificationHandler>,
    /// Handler tasks for inbound requests, keyed by the peer's id.
    inflight: HashMap<RequestId, AbortHandle>,
    grace_timer: Option<AbortHandle>,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("name", &self.config.name)
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_request(self: &Arc<Self>, payload: Value, timeout: Option<Duration>) -> PendingReply {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.lock();

        if inner.state != PortState::Open {
            return PendingReply::failed(PortError::Closed);
        }
        if inner.pending.len() >= self.config.max_pending {
            return PendingReply::failed(PortError::TooManyPending {
                limit: self.config.max_pending,
            });
        }

        let id = inner.pending.allocate_id();
        let message = match (Envelope::Request { id, payload }).encode() {
            Ok(message) => message,
            Err(err) => return PendingReply::failed(err.into()),
        };
        let sent = match inner.outbound.as_ref() {
            Some(outbound) => outbound.send(message),
            None => Err(TransportError::Closed),
        };
        if let Err(err) = sent {
            return PendingReply::failed(err.into());
        }

        // The timer cannot observe the table before the entry lands: it
        // needs this lock.
        let timer = timeout.map(|after| self.spawn_timer(id, after));
        inner.pending.insert(id, PendingEntry::new(tx, timer));
        drop(inner);

        trace!(port = %self.config.name, id, ?timeout, "request sent");
        PendingReply {
            id: Some(id),
            rx,
            port: Arc::downgrade(self),
            done: false,
        }
    }

    fn spawn_timer(self: &Arc<Self>, id: RequestId, after: Duration) -> AbortHandle {
        let port = Arc::downgrade(self);
        self.runtime
            .spawn(async move {
                tokio::time::sleep(after).await;
                if let Some(shared) = port.upgrade() {
                    shared.expire(id, after);
                }
            })
            .abort_handle()
    }

    fn expire(&self, id: RequestId, after: Duration) {
        let entry = self.lock().pending.remove(id);
        if let Some(mut entry) = entry {
            entry.disarm();
            debug!(
                port = %self.config.name,
                id,
                timeout_ms = after.as_millis() as u64,
                "request timed out"
            );
            entry.settle(Err(PortError::Timeout(after)));
            self.maybe_finish_closing();
        }
    }

    fn cancel(&self, id: RequestId) -> bool {
        let entry = self.lock().pending.remove(id);
        let Some(entry) = entry else {
            return false;
        };
        debug!(port = %self.config.name, id, "request cancelled");
        entry.settle(Err(PortError::Cancelled));
        if self.config.cancel_notice {
            self.send_internal(Envelope::cancel_notice(id));
        }
        self.maybe_finish_closing();
        true
    }

    /// Best-effort send for envelopes the port emits on its own behalf.
    fn send_internal(&self, envelope: Envelope) {
        let kind = envelope.kind();
        let message = match envelope.encode() {
            Ok(message) => message,
            Err(err) => {
                warn!(port = %self.config.name, kind, error = %err, "failed to encode envelope");
                return;
            }
        };
        let inner = self.lock();
        let Some(outbound) = inner.outbound.as_ref() else {
            trace!(port = %self.config.name, kind, "port closed; dropping outgoing envelope");
            return;
        };
        if let Err(err) = outbound.send(message) {
            debug!(port = %self.config.name, kind, error = %err, "failed to send envelope");
        }
    }

    /// Answer request `id`. A response the transport refuses is replaced by
    /// an error response so the requester still settles.
    fn send_response(&self, id: RequestId, outcome: std::result::Result<Value, RemoteError>) {
        let refused = match (Envelope::Response { id, outcome }).encode() {
            Ok(message) => {
                let inner = self.lock();
                let Some(outbound) = inner.outbound.as_ref() else {
                    trace!(port = %self.config.name, id, "port closed; dropping response");
                    return;
                };
                match outbound.send(message) {
                    Ok(()) => return,
                    Err(TransportError::Closed) => {
                        debug!(port = %self.config.name, id, "transport closed; dropping response");
                        return;
                    }
                    Err(err) => err.to_string(),
                }
            }
            Err(err) => err.to_string(),
        };

        warn!(port = %self.config.name, id, error = %refused, "response refused; answering with an error");
        self.send_internal(Envelope::Response {
            id,
            outcome: Err(RemoteError::new(UNDELIVERABLE).with_data(Value::String(refused))),
        });
    }

    fn dispatch(self: &Arc<Self>, message: &[u8]) {
        let envelope = match Envelope::decode(message) {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!(
                    port = %self.config.name,
                    size = message.len(),
                    error = %err,
                    "discarding malformed envelope"
                );
                return;
            }
        };

        match envelope {
            Envelope::Request { id, payload } => self.handle_request(id, payload),
            Envelope::Notification { payload } => self.handle_notification(payload),
            Envelope::Response { id, outcome } => self.handle_response(id, outcome),
            Envelope::Cancel { id } => self.handle_cancel(id),
        }
    }

    fn handle_request(self: &Arc<Self>, id: RequestId, payload: Value) {
        let handler = self.lock().request_handler.clone();
        let Some(handler) = handler else {
            debug!(port = %self.config.name, id, "no request handler installed");
            self.send_internal(Envelope::Response {
                id,
                outcome: Err(RemoteError::new(NO_HANDLER)),
            });
            return;
        };

        let task = self.runtime.spawn(async move { (*handler)(payload).await });
        {
            let mut inner = self.lock();
            if inner.state == PortState::Closed {
                task.abort();
            } else {
                inner.inflight.insert(id, task.abort_handle());
            }
        }

        let port = Arc::downgrade(self);
        self.runtime.spawn(async move {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(err) if err.is_cancelled() => Err(RemoteError::new(CANCELLED_BY_PEER)),
                Err(_) => Err(RemoteError::new(HANDLER_PANICKED)),
            };
            let Some(shared) = port.upgrade() else {
                return;
            };
            if let Err(err) = &outcome {
                debug!(port = %shared.config.name, id, error = %err, "request handler failed");
            }
            shared.lock().inflight.remove(&id);
            shared.send_response(id, outcome);
        });
    }

    fn handle_cancel(&self, id: RequestId) {
        let task = self.lock().inflight.remove(&id);
        match task {
            Some(task) => {
                debug!(port = %self.config.name, id, "peer withdrew request; aborting handler");
                task.abort();
            }
            None => trace!(port = %self.config.name, id, "cancel notice for finished request"),
        }
    }

    fn handle_notification(&self, payload: Value) {
        let handler = self.lock().notification_handler.clone();
        let Some(handler) = handler else {
            trace!(port = %self.config.name, "no notification handler installed; dropping");
            return;
        };
        match std::panic::catch_unwind(AssertUnwindSafe(|| (*handler)(payload))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(port = %self.config.name, error = %err, "notification handler failed")
            }
            Err(_) => warn!(port = %self.config.name, "notification handler panicked"),
        }
    }

    fn handle_response(&self, id: RequestId, outcome: std::result::Result<Value, RemoteError>) {
        let entry = self.lock().pending.remove(id);
        match entry {
            Some(entry) => {
                trace!(
                    port = %self.config.name,
                    id,
                    elapsed_ms = entry.age().as_millis() as u64,
                    ok = outcome.is_ok(),
                    "response matched"
                );
                entry.settle(outcome.map_err(PortError::Remote));
                self.maybe_finish_closing();
            }
            None => trace!(port = %self.config.name, id, "discarding response for unknown request"),
        }
    }

    fn close(self: &Arc<Self>) {
        let mut inner = self.lock();
        let state = inner.state;
        match state {
            PortState::Closed => {}
            PortState::Closing => {
                drop(inner);
                self.finish_close();
            }
            PortState::Open => match self.config.close_grace {
                Some(grace) if !inner.pending.is_empty() => {
                    inner.state = PortState::Closing;
                    let port = Arc::downgrade(self);
                    let timer = self.runtime.spawn(async move {
                        tokio::time::sleep(grace).await;
                        if let Some(shared) = port.upgrade() {
                            shared.finish_close();
                        }
                    });
                    inner.grace_timer = Some(timer.abort_handle());
                    debug!(
                        port = %self.config.name,
                        pending = inner.pending.len(),
                        grace_ms = grace.as_millis() as u64,
                        "port closing"
                    );
                }
                _ => {
                    drop(inner);
                    self.finish_close();
                }
            },
        }
    }

    fn maybe_finish_closing(&self) {
        let drained = {
            let inner = self.lock();
            inner.state == PortState::Closing && inner.pending.is_empty()
        };
        if drained {
            self.finish_close();
        }
    }

    fn finish_close(&self) {
        let (entries, outbound, inflight, grace_timer, handlers) = {
            let mut inner = self.lock();
            if inner.state == PortState::Closed {
                return;
            }
            inner.state = PortState::Closed;
            (
                inner.pending.drain(),
                inner.outbound.take(),
                std::mem::take(&mut inner.inflight),
                inner.grace_timer.take(),
                (
                    inner.request_handler.take(),
                    inner.notification_handler.take(),
                ),
            )
        };

        self.closed.cancel();
        if let Some(timer) = grace_timer {
            timer.abort();
        }
        for task in inflight.into_values() {
            task.abort();
        }
        let rejected = entries.len();
        for (_, entry) in entries {
            entry.settle(Err(PortError::Closed));
        }
        drop(outbound);
        drop(handlers);

        debug!(port = %self.config.name, rejected, "port closed");
    }
}

async fn dispatch_loop(shared: Arc<Shared>, mut inbound: BoxInbound) {
    let closed = shared.closed.clone();
    loop {
        let next = tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            next = inbound.next() => next,
        };
        match next {
            Some(Ok(message)) => shared.dispatch(&message),
            Some(Err(err)) => {
                warn!(port = %shared.config.name, error = %err, "inbound transport failed; closing port");
                shared.finish_close();
                break;
            }
            None => {
                debug!(port = %shared.config.name, "peer released transport; closing port");
                shared.finish_close();
                break;
            }
        }
    }
    trace!(port = %shared.config.name, "dispatcher stopped");
}
