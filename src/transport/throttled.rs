//! Interceptor that holds each request until its limiter admits it.

use std::sync::Arc;

use async_trait::async_trait;
use http::Request;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::Transport;
use crate::error::TollgateError;
use crate::ratelimit::LimiterRegistry;
use crate::scope::{RequestScope, RequestScopeExt};

/// What to do with a request whose limiter key is not registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingKeyPolicy {
    /// Forward the request unthrottled
    #[default]
    FailOpen,
    /// Reject the request with `NotFound`
    FailClosed,
}

impl std::str::FromStr for MissingKeyPolicy {
    type Err = TollgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail_open" | "fail-open" => Ok(MissingKeyPolicy::FailOpen),
            "fail_closed" | "fail-closed" => Ok(MissingKeyPolicy::FailClosed),
            other => Err(TollgateError::Config(format!(
                "unknown missing key policy: {}",
                other
            ))),
        }
    }
}

/// Error from a throttled round trip.
#[derive(Error, Debug)]
pub enum InterceptError<E: std::error::Error + 'static> {
    /// The request was not admitted and was never sent
    #[error("request not admitted: {0}")]
    Throttle(#[from] TollgateError),

    /// The underlying transport failed
    #[error(transparent)]
    Transport(E),
}

/// Transport wrapper that applies the limiter bound to each request's scope.
///
/// Per request:
/// - no scope or no key bound: forwarded at once;
/// - key bound but not registered: forwarded at once under
///   [`MissingKeyPolicy::FailOpen`] (the default), rejected with `NotFound`
///   under [`MissingKeyPolicy::FailClosed`];
/// - key registered: one token is acquired, waiting as long as the request
///   scope allows. If the wait is aborted the request is not sent.
pub struct ThrottledTransport<T> {
    /// Transport that performs the request once admitted
    inner: T,
    /// Limiters to resolve keys against
    registry: Arc<LimiterRegistry>,
    /// Handling of unregistered keys
    missing_key: MissingKeyPolicy,
}

impl<T> ThrottledTransport<T> {
    /// Wrap `inner`, failing open on unregistered keys.
    pub fn new(inner: T, registry: Arc<LimiterRegistry>) -> Self {
        Self {
            inner,
            registry,
            missing_key: MissingKeyPolicy::default(),
        }
    }

    /// Set the handling of unregistered keys.
    pub fn with_missing_key_policy(mut self, policy: MissingKeyPolicy) -> Self {
        self.missing_key = policy;
        self
    }

    pub fn registry(&self) -> &Arc<LimiterRegistry> {
        &self.registry
    }

    pub fn missing_key_policy(&self) -> MissingKeyPolicy {
        self.missing_key
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Wait until a request with `scope` may be sent.
    async fn admit(&self, scope: &RequestScope) -> Result<(), TollgateError> {
        let Some(key) = scope.limiter_key() else {
            trace!("No limiter key bound, forwarding unthrottled");
            return Ok(());
        };

        let limiter = match self.registry.get(key) {
            Ok(limiter) => limiter,
            Err(err) => {
                return match self.missing_key {
                    MissingKeyPolicy::FailOpen => {
                        debug!(key = %key, "No limiter registered for key, forwarding unthrottled");
                        Ok(())
                    }
                    MissingKeyPolicy::FailClosed => {
                        warn!(key = %key, "No limiter registered for key, rejecting request");
                        Err(err)
                    }
                };
            }
        };

        limiter.acquire(scope).await
    }
}

#[async_trait]
impl<T, B> Transport<B> for ThrottledTransport<T>
where
    T: Transport<B>,
    B: Send + 'static,
{
    type Response = T::Response;
    type Error = InterceptError<T::Error>;

    async fn round_trip(&self, request: Request<B>) -> Result<Self::Response, Self::Error> {
        let scope = request.scope();
        self.admit(&scope).await?;

        trace!(
            method = %request.method(),
            uri = %request.uri(),
            "Request admitted"
        );

        self.inner
            .round_trip(request)
            .await
            .map_err(InterceptError::Transport)
    }
}
