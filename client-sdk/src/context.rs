//! Per-call cancellation and deadlines.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::ClientError;

/// Cancellation signal and optional deadline attached to a device call.
///
/// Contexts are cheap to clone; clones share the cancellation signal.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    cancel: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Cancels every context derived from [`CallContext::cancellable`].
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

impl CallContext {
    /// A context that is never cancelled and never expires.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().deadline(Instant::now() + timeout)
    }

    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn cancellable(mut self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        self.cancel = Some(rx);
        (self, CancelHandle(tx))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Runs `fut` until it completes, the context is cancelled or the
    /// deadline passes, whichever comes first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ClientError> {
        if self.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        if self.is_expired() {
            return Err(ClientError::TimedOut);
        }

        let mut cancel = self.cancel.clone();
        let cancelled = async move {
            match cancel.as_mut() {
                // a dropped handle can no longer cancel
                Some(rx) => {
                    let closed = rx.wait_for(|c| *c).await.is_err();
                    if closed {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };
        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(ClientError::Cancelled),
            _ = expired => Err(ClientError::TimedOut),
            out = fut => Ok(out),
        }
    }
}
