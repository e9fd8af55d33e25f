//! Per-call cancellation and deadlines
//!
//! A [`CallContext`] travels with every call. It fires when the server shuts
//! down (via [`Shutdown`]) or when the call's deadline passes, whichever
//! comes first. Every suspension point of a call races against it.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::CallError;

/// Server-wide cancellation source
///
/// Dropping the `Shutdown` without calling [`trigger`](Self::trigger) does
/// not cancel outstanding contexts.
#[derive(Debug)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Shutdown {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Cancel every context created from this source
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    /// A fresh context tied to this source, with no deadline
    #[must_use]
    pub fn context(&self) -> CallContext {
        CallContext {
            cancel: Some(self.sender.subscribe()),
            deadline: None,
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation and deadline state of one call
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never cancelled and has no deadline
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Set an absolute deadline, keeping the earlier one if already set
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Set a deadline `timeout` from now
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The error describing why this context is done, if it is
    #[must_use]
    pub fn err(&self) -> Option<CallError> {
        if self.cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Some(CallError::cancelled());
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(CallError::deadline_exceeded());
        }
        None
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolve once the context is cancelled or its deadline passes
    ///
    /// Never resolves for a background context.
    pub async fn done(&self) -> CallError {
        let cancelled = async {
            match self.cancel.clone() {
                // Err means the Shutdown was dropped untriggered
                Some(mut rx) => {
                    let closed = rx.wait_for(|&cancelled| cancelled).await.is_err();
                    if closed {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            () = cancelled => CallError::cancelled(),
            () = expired => CallError::deadline_exceeded(),
        }
    }

    /// Run `fut` unless the context finishes first
    ///
    /// # Errors
    ///
    /// Returns the error from `fut`, or a `Cancelled` error if the context
    /// finishes before `fut` does.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, CallError>
    where
        F: Future<Output = Result<T, CallError>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            result = fut => result,
            err = self.done() => Err(err),
        }
    }
}
