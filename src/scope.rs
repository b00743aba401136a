//! Request scopes: cancellation, deadline, and the selected limiter key.
//!
//! A [`RequestScope`] accompanies a single outbound request. Deriving a scope
//! (binding a key, tightening a deadline) always yields a new value and never
//! changes the scope it was derived from. A derived scope is cancelled when
//! its parent is, but cancelling it leaves the parent and siblings live.
//! Scopes ride on `http::Request` extensions, so the limiter key lives in a
//! typed field that no other extension value can be mistaken for.

use std::sync::Arc;
use std::time::Duration;

use http::Request;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::TollgateError;

/// Per-request scope carried alongside an outbound request.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    /// Fires when the caller gives up on the request
    cancel: CancellationToken,
    /// Point in time after which the request is abandoned
    deadline: Option<Instant>,
    /// Limiter selected for this request
    limiter_key: Option<Arc<str>>,
}

impl RequestScope {
    /// Create a scope with no deadline, no key, and a fresh cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a scope that is cancelled by `token` instead of this scope's token.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancel: token,
            ..self.clone()
        }
    }

    /// Derive a scope with the same deadline and key that can be cancelled
    /// on its own.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
            limiter_key: self.limiter_key.clone(),
        }
    }

    /// Derive a scope with `deadline`. An earlier existing deadline is kept.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self.child()
        }
    }

    /// Derive a scope whose deadline is `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child(),
        }
    }

    /// Derive a scope bound to the limiter registered under `key`.
    pub fn with_limiter_key(&self, key: impl AsRef<str>) -> Self {
        Self {
            limiter_key: Some(Arc::from(key.as_ref())),
            ..self.child()
        }
    }

    /// The limiter key bound to this scope, if any.
    pub fn limiter_key(&self) -> Option<&str> {
        self.limiter_key.as_deref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The reason this scope is finished, or `None` while it is still live.
    ///
    /// Cancellation wins over an expired deadline.
    pub fn error(&self) -> Option<TollgateError> {
        if self.cancel.is_cancelled() {
            return Some(TollgateError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(TollgateError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolve once the scope is cancelled or its deadline passes.
    pub async fn aborted(&self) -> TollgateError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => TollgateError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => TollgateError::DeadlineExceeded,
                }
            }
            None => {
                self.cancel.cancelled().await;
                TollgateError::Cancelled
            }
        }
    }
}

/// Read and derive the [`RequestScope`] of an `http::Request`.
pub trait RequestScopeExt: Sized {
    /// The request's scope, or a fresh unbound scope if it has none.
    fn scope(&self) -> RequestScope;

    /// Replace the request's scope.
    fn with_scope(self, scope: RequestScope) -> Self;

    /// Bind a limiter key, deriving from the request's current scope.
    fn with_limiter_key(self, key: impl AsRef<str>) -> Self {
        let scope = self.scope().with_limiter_key(key);
        self.with_scope(scope)
    }
}

impl<B> RequestScopeExt for Request<B> {
    fn scope(&self) -> RequestScope {
        self.extensions()
            .get::<RequestScope>()
            .cloned()
            .unwrap_or_default()
    }

    fn with_scope(mut self, scope: RequestScope) -> Self {
        self.extensions_mut().insert(scope);
        self
    }
}
