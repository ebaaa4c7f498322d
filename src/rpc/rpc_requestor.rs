use super::result_slot::{ResponseFuture, ResultSlot};
use crate::connection::{RpcConnection, TimerHandle, TransportError};
use crate::message::{Message, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

/// Invoked with the response of a call made through
/// [`RpcRequestor::call_with_callback`].
pub type ResponseCallback = Box<dyn FnOnce(Message) + Send>;

/// The calling convention a pending request was issued with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Blocking,
    Future,
    Callback,
}

enum Resolver {
    Slot(Arc<ResultSlot>),
    Callback(ResponseCallback),
}

/// Bookkeeping for one in-flight call.
///
/// Lives in the requestor's table from issue until exactly one of the
/// response path or the timeout path removes it.
struct PendingRequest {
    call_kind: CallKind,
    resolver: Mutex<Option<Resolver>>,
    /// The connection the request went out on; owns the timer.
    conn: Weak<dyn RpcConnection>,
    timer: Mutex<Option<TimerHandle>>,
    timed_out: AtomicBool,
    issued_at: Instant,
}

impl PendingRequest {
    fn new(call_kind: CallKind, resolver: Resolver, conn: &Arc<dyn RpcConnection>) -> Self {
        Self {
            call_kind,
            resolver: Mutex::new(Some(resolver)),
            conn: Arc::downgrade(conn),
            timer: Mutex::new(None),
            timed_out: AtomicBool::new(false),
            issued_at: Instant::now(),
        }
    }

    fn take_resolver(&self) -> Option<Resolver> {
        self.resolver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    fn set_timer(&self, handle: TimerHandle) {
        *self
            .timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
    }

    /// Disarms the request's timer through the connection that armed it.
    /// Every path that removes the entry from the table calls this.
    fn cancel_timer(&self) {
        let timer = self
            .timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(timer) = timer else {
            return;
        };
        match self.conn.upgrade() {
            Some(conn) => conn.cancel_timer(&timer),
            None => timer.cancel(),
        }
    }
}

/// Client-side correlation engine.
///
/// Tracks every in-flight request by id and resolves it exactly once, either
/// with the matching response or with a synthesized `TIMEOUT` response. The
/// whole table sits behind one mutex; the claim on an entry is its removal
/// from the table, so the response path and the timeout path can never both
/// resolve the same request.
#[derive(Default)]
pub struct RpcRequestor {
    pending: Mutex<HashMap<String, Arc<PendingRequest>>>,
}

impl RpcRequestor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends `request` and returns a handle to its eventual response.
    ///
    /// A timer armed on the connection's loop resolves the handle with a
    /// `TIMEOUT` response if nothing arrives within `timeout`.
    pub fn call_async(
        self: &Arc<Self>,
        conn: &Arc<dyn RpcConnection>,
        request: Message,
        timeout: Duration,
    ) -> Result<ResponseFuture, RequestorError> {
        self.issue_with_slot(conn, request, timeout, CallKind::Future)
    }

    /// Sends `request` and blocks the calling thread until it resolves.
    ///
    /// If the local wait expires first, the timeout path is triggered here so
    /// that the connection's timer has nothing left to do. Whichever path
    /// claimed the request decides the outcome. Must not be called from
    /// within an async task.
    pub fn call_blocking(
        self: &Arc<Self>,
        conn: &Arc<dyn RpcConnection>,
        request: Message,
        timeout: Duration,
    ) -> Result<Message, RequestorError> {
        tracing::debug!("Blocking call id={} timeout={:?}", request.id(), timeout);
        let response = self.issue_with_slot(conn, request, timeout, CallKind::Blocking)?;

        let message = match response.wait_timeout(timeout) {
            Some(message) => message,
            None => {
                tracing::error!("Blocking wait expired id={}", response.request_id());
                self.on_timeout(response.request_id());
                // Both resolution paths fill the slot while holding the table
                // guard, so it is populated once `on_timeout` returns.
                response
                    .try_take()
                    .unwrap_or_else(|| timeout_response(response.request_id()))
            }
        };

        match message.status() {
            Some(StatusCode::Timeout) => Err(RequestorError::Timeout),
            Some(StatusCode::Disconnected) => Err(RequestorError::Disconnected),
            _ => Ok(message),
        }
    }

    /// Sends `request` and invokes `callback` with its response.
    ///
    /// The callback runs exactly once: with the real response, or with a
    /// synthesized `TIMEOUT` response when `timeout` elapses first.
    pub fn call_with_callback(
        self: &Arc<Self>,
        conn: &Arc<dyn RpcConnection>,
        request: Message,
        timeout: Duration,
        callback: ResponseCallback,
    ) -> Result<(), RequestorError> {
        self.issue(
            conn,
            request,
            timeout,
            CallKind::Callback,
            Resolver::Callback(callback),
        )
    }

    /// Response path. Called by the dispatcher for every inbound response.
    pub fn on_response(&self, conn: &dyn RpcConnection, message: Message) {
        let id = message.id().to_owned();
        let mut message = Some(message);

        let (entry, callback) = {
            let mut pending = self.lock_pending();
            let Some(entry) = pending.get(&id).cloned() else {
                tracing::warn!(
                    "Received response id={} from {} with no pending request",
                    id,
                    conn.peer()
                );
                return;
            };

            pending.remove(&id);

            if entry.timed_out.load(Ordering::Acquire) {
                tracing::warn!("Received response id={} after it timed out; dropping", id);
                return;
            }

            match entry.take_resolver() {
                Some(Resolver::Slot(slot)) => {
                    if let Some(message) = message.take() {
                        slot.fulfill(message);
                    }
                    (entry, None)
                }
                Some(Resolver::Callback(callback)) => (entry, Some(callback)),
                None => return,
            }
        };

        entry.cancel_timer();

        tracing::trace!(
            "Resolved id={} ({:?}) after {:?}",
            id,
            entry.call_kind,
            entry.issued_at.elapsed()
        );

        if let (Some(callback), Some(message)) = (callback, message) {
            callback(message);
        }
    }

    /// Timeout path. Called by the per-request timer, or by a blocking
    /// caller whose own wait expired.
    pub fn on_timeout(&self, request_id: &str) {
        let (entry, callback) = {
            let mut pending = self.lock_pending();
            let Some(entry) = pending.get(request_id).cloned() else {
                tracing::debug!(
                    "Timeout for id={} ignored; request already resolved",
                    request_id
                );
                return;
            };

            if entry.timed_out.swap(true, Ordering::AcqRel) {
                return;
            }
            pending.remove(request_id);

            match entry.take_resolver() {
                Some(Resolver::Slot(slot)) => {
                    if !slot.fulfill(timeout_response(request_id)) {
                        tracing::debug!(
                            "Timeout for id={} lost the race to its response",
                            request_id
                        );
                    }
                    (entry, None)
                }
                Some(Resolver::Callback(callback)) => (entry, Some(callback)),
                None => return,
            }
        };

        tracing::error!(
            "Request timed out id={} ({:?}) after {:?}",
            request_id,
            entry.call_kind,
            entry.issued_at.elapsed()
        );

        entry.cancel_timer();

        if let Some(callback) = callback {
            callback(timeout_response(request_id));
        }
    }

    /// Resolves every pending request with a synthesized response carrying
    /// `status`. Used when the connection the requests were sent on is gone.
    pub fn fail_all(&self, status: StatusCode) {
        let drained: Vec<(String, Arc<PendingRequest>, Option<ResponseCallback>)> = {
            let mut pending = self.lock_pending();
            pending
                .drain()
                .map(|(id, entry)| {
                    entry.timed_out.store(true, Ordering::Release);
                    let callback = match entry.take_resolver() {
                        Some(Resolver::Slot(slot)) => {
                            slot.fulfill(Message::rpc_response(&id, status, Value::Null));
                            None
                        }
                        Some(Resolver::Callback(callback)) => Some(callback),
                        None => None,
                    };
                    (id, entry, callback)
                })
                .collect()
        };

        if !drained.is_empty() {
            tracing::warn!("Failing {} pending request(s) with {}", drained.len(), status);
        }

        for (id, entry, callback) in drained {
            entry.cancel_timer();
            if let Some(callback) = callback {
                callback(Message::rpc_response(&id, status, Value::Null));
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    pub fn is_pending(&self, request_id: &str) -> bool {
        self.lock_pending().contains_key(request_id)
    }

    fn issue_with_slot(
        self: &Arc<Self>,
        conn: &Arc<dyn RpcConnection>,
        request: Message,
        timeout: Duration,
        call_kind: CallKind,
    ) -> Result<ResponseFuture, RequestorError> {
        let slot = ResultSlot::new();
        let request_id = request.id().to_owned();
        self.issue(conn, request, timeout, call_kind, Resolver::Slot(slot.clone()))?;
        Ok(ResponseFuture::new(request_id, slot))
    }

    fn issue(
        self: &Arc<Self>,
        conn: &Arc<dyn RpcConnection>,
        request: Message,
        timeout: Duration,
        call_kind: CallKind,
        resolver: Resolver,
    ) -> Result<(), RequestorError> {
        let request_id = request.id().to_owned();
        let entry = Arc::new(PendingRequest::new(call_kind, resolver, conn));

        {
            let mut pending = self.lock_pending();
            if pending.contains_key(&request_id) {
                return Err(RequestorError::DuplicateRequestId(request_id));
            }
            pending.insert(request_id.clone(), entry.clone());
        }
        tracing::debug!("Issued id={} ({:?}) to {}", request_id, call_kind, conn.peer());

        let timer = conn.arm_timer(timeout, {
            let requestor: Weak<RpcRequestor> = Arc::downgrade(self);
            let request_id = request_id.clone();
            Box::new(move || {
                if let Some(requestor) = requestor.upgrade() {
                    requestor.on_timeout(&request_id);
                }
            })
        });
        entry.set_timer(timer);

        if let Err(err) = conn.send(request) {
            tracing::error!("Failed to send id={} to {}: {}", request_id, conn.peer(), err);
            self.lock_pending().remove(&request_id);
            entry.cancel_timer();
            return Err(RequestorError::Transport(err));
        }

        Ok(())
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<String, Arc<PendingRequest>>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn timeout_response(request_id: &str) -> Message {
    Message::rpc_response(request_id, StatusCode::Timeout, Value::Null)
}

/// Errors surfaced to the caller by [`RpcRequestor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestorError {
    /// The request could not be handed to the connection.
    Transport(TransportError),
    /// No response arrived before the deadline.
    Timeout,
    /// The connection closed while the call was in flight.
    Disconnected,
    /// A request with the same id is already in flight.
    DuplicateRequestId(String),
}

impl fmt::Display for RequestorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestorError::Transport(e) => write!(f, "transport error: {}", e),
            RequestorError::Timeout => write!(f, "request timed out"),
            RequestorError::Disconnected => write!(f, "connection closed before a response"),
            RequestorError::DuplicateRequestId(id) => {
                write!(f, "request id {} is already in flight", id)
            }
        }
    }
}

impl std::error::Error for RequestorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RequestorError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for RequestorError {
    fn from(e: TransportError) -> Self {
        RequestorError::Transport(e)
    }
}
