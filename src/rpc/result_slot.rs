use crate::message::Message;
use futures::task::AtomicWaker;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;

/// Single-assignment holder for the outcome of one call.
///
/// Writers race through [`ResultSlot::fulfill`]; the first one to flip
/// `claimed` wins and every later attempt returns `false` without touching
/// the stored value. Readers can either await it or block on it.
#[derive(Default)]
pub(crate) struct ResultSlot {
    claimed: AtomicBool,
    value: Mutex<Option<Message>>,
    ready: Condvar,
    waker: AtomicWaker,
}

impl ResultSlot {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stores `message` unless the slot was already claimed.
    pub(crate) fn fulfill(&self, message: Message) -> bool {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        *self.lock_value() = Some(message);
        self.ready.notify_all();
        self.waker.wake();
        true
    }

    pub(crate) fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    fn lock_value(&self) -> MutexGuard<'_, Option<Message>> {
        self.value.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle to the eventual response of a call made with
/// [`super::RpcRequestor::call_async`].
///
/// Await it from async code, or block on it with
/// [`ResponseFuture::wait_timeout`] from a plain thread. The response is
/// handed out once; after that the handle yields nothing.
pub struct ResponseFuture {
    request_id: String,
    slot: Arc<ResultSlot>,
}

impl ResponseFuture {
    pub(crate) fn new(request_id: String, slot: Arc<ResultSlot>) -> Self {
        Self { request_id, slot }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Whether a response (real or synthesized) has been stored.
    pub fn is_ready(&self) -> bool {
        self.slot.is_claimed()
    }

    /// Takes the response if one has been stored.
    pub fn try_take(&self) -> Option<Message> {
        self.slot.lock_value().take()
    }

    /// Blocks the calling thread until the response is stored or `timeout`
    /// elapses. Must not be called from within an async task.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Message> {
        let guard = self.slot.lock_value();
        let (mut guard, _) = self
            .slot
            .ready
            .wait_timeout_while(guard, timeout, |value| value.is_none())
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.take()
    }
}

impl Future for ResponseFuture {
    type Output = Message;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(message) = self.try_take() {
            return Poll::Ready(message);
        }
        self.slot.waker.register(cx.waker());
        // Re-check after registering so a concurrent `fulfill` is not missed.
        match self.try_take() {
            Some(message) => Poll::Ready(message),
            None => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for ResponseFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseFuture")
            .field("request_id", &self.request_id)
            .field("ready", &self.is_ready())
            .finish()
    }
}
