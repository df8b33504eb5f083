//! Cancellation context passed to every handler and HTTP request.
//!
//! A context combines a cancellation token with an optional deadline. Child
//! contexts are cancelled with their parent and may carry a tighter deadline.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

const CANCELED: &str = "context canceled";
const DEADLINE_EXCEEDED: &str = "context deadline exceeded";

/// Cancellation scope for one unit of work.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Create a root context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing cancellation token.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Child context, cancelled whenever this one is.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Child context whose deadline is at most `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancel this context and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The underlying token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` means unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Whether the context has been cancelled or its deadline has passed.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// The cancellation cause, if the context is done.
    pub fn err(&self) -> Option<Error> {
        if self.token.is_cancelled() {
            return Some(Error::Cancelled(CANCELED.into()));
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Some(Error::Cancelled(DEADLINE_EXCEEDED.into()))
            }
            _ => None,
        }
    }

    /// Resolve once the context is done, yielding the cause.
    pub async fn done(&self) -> Error {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => Error::Cancelled(CANCELED.into()),
                _ = tokio::time::sleep_until(deadline) => Error::Cancelled(DEADLINE_EXCEEDED.into()),
            },
            None => {
                self.token.cancelled().await;
                Error::Cancelled(CANCELED.into())
            }
        }
    }

    /// Sleep for `duration` unless the context finishes first.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            err = self.done() => Err(err),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
