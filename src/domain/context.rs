//! Request Context
//!
//! Cancellation and deadline carried by every request.

use crate::domain::errors::EdgeError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A cancellable, optionally deadline-bound context.
///
/// Clones share the same cancellation token, so cancelling any clone
/// cancels all of them. Resolvers receive a clone and may watch it, but
/// nothing forces them to stop when it fires.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context that is never done unless cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Derive a child context. Cancelling the parent cancels the child, not
    /// the other way round. The tighter of the two deadlines wins.
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let own = timeout.map(|t| Instant::now() + t);
        let deadline = match (self.deadline, own) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// The context's error, if it is already done.
    pub fn err(&self) -> Option<EdgeError> {
        if self.token.is_cancelled() {
            return Some(EdgeError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(EdgeError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes,
    /// yielding the corresponding error.
    pub async fn done(&self) -> EdgeError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => EdgeError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => EdgeError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                EdgeError::Cancelled
            }
        }
    }
}
