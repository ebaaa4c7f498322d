use tokio::task::AbortHandle;

#[derive(Debug, Clone)]
enum TimerInner {
    Task(AbortHandle),
    Token(u64),
}

/// A cancellable reference to a timer armed with
/// [`super::RpcConnection::arm_timer`].
///
/// Cancelling a timer that already fired is a no-op: its callback has run
/// (or is running) and cannot be taken back.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    inner: TimerInner,
}

impl TimerHandle {
    /// A timer implemented as a spawned tokio task.
    pub fn from_task(abort_handle: AbortHandle) -> Self {
        Self {
            inner: TimerInner::Task(abort_handle),
        }
    }

    /// A timer owned by the connection itself, identified by `token`.
    ///
    /// Connections handing these out must override
    /// [`super::RpcConnection::cancel_timer`].
    pub fn from_token(token: u64) -> Self {
        Self {
            inner: TimerInner::Token(token),
        }
    }

    pub fn token(&self) -> Option<u64> {
        match self.inner {
            TimerInner::Token(token) => Some(token),
            TimerInner::Task(_) => None,
        }
    }

    /// Aborts a task-backed timer. Token timers are left to their connection.
    pub fn cancel(&self) {
        if let TimerInner::Task(abort_handle) = &self.inner {
            abort_handle.abort();
        }
    }

    /// Whether a task-backed timer fired or was cancelled.
    pub fn is_finished(&self) -> bool {
        match &self.inner {
            TimerInner::Task(abort_handle) => abort_handle.is_finished(),
            TimerInner::Token(_) => false,
        }
    }
}
