//! Cancellation context carried by every outbound request.
//!
//! A `CancelContext` is a shared cancellation signal plus an optional deadline. Clones and
//! contexts derived with [`CancelContext::with_deadline`] share the same signal, so cancelling
//! any of them aborts every wait tied to that request.

use crate::error::ThrottleError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Cancellation signal and optional deadline for one request.
#[derive(Debug, Clone)]
pub struct CancelContext {
    signal: Arc<watch::Sender<bool>>,
    deadline: Option<Instant>,
}

impl Default for CancelContext {
    fn default() -> Self {
        Self::background()
    }
}

impl CancelContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        let (signal, _) = watch::channel(false);
        Self { signal: Arc::new(signal), deadline: None }
    }

    /// Derive a context sharing this signal whose deadline is the earlier of the two.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self { signal: self.signal.clone(), deadline: Some(deadline) }
    }

    /// Derive a context that expires `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    /// Cancel every context sharing this signal.
    pub fn cancel(&self) {
        self.signal.send_replace(true);
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.signal.borrow()
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why this context is done, or `None` while it is still live.
    ///
    /// Cancellation takes precedence over an elapsed deadline.
    pub fn err(&self) -> Option<ThrottleError> {
        if self.is_cancelled() {
            return Some(ThrottleError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(ThrottleError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ThrottleError {
        let mut rx = self.signal.subscribe();
        let cancelled = async move {
            // The sender lives as long as `self`, so the channel cannot close under us.
            let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
            if closed {
                std::future::pending::<()>().await;
            }
        };
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = cancelled => ThrottleError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => ThrottleError::DeadlineExceeded,
            },
            None => {
                cancelled.await;
                ThrottleError::Cancelled
            }
        }
    }
}
