//! Token bucket limiter shared by every caller of one key.

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::bucket::TokenBucket;
use crate::error::{Result, TollgateError};
use crate::scope::RequestScope;

/// A token bucket rate limiter identified by a key.
///
/// Tokens refill continuously at `rate` per second up to `burst`. The limiter
/// is thread-safe and is normally shared as a [`LimiterHandle`]. Each limiter
/// has its own lock, so callers on unrelated keys never contend.
#[derive(Debug)]
pub struct Limiter {
    /// Registry key
    key: String,
    /// Tokens per second
    rate: f64,
    /// Bucket capacity
    burst: u32,
    /// Mutable bucket state
    bucket: Mutex<TokenBucket>,
}

/// Shared handle to a registered limiter.
pub type LimiterHandle = std::sync::Arc<Limiter>;

impl Limiter {
    /// Create a limiter with a full bucket.
    ///
    /// Parameters are validated by the registry; see [`Limiter::validate`].
    pub(crate) fn new(key: String, rate: f64, burst: u32) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(rate, burst, Instant::now())),
            key,
            rate,
            burst,
        }
    }

    /// Reject parameters that would build a limiter that never admits anything.
    pub fn validate(key: &str, rate: f64, burst: u32) -> Result<()> {
        // A rate whose inverse overflows would never produce a token
        if !rate.is_finite() || rate <= 0.0 || !(1.0 / rate).is_finite() {
            return Err(TollgateError::InvalidRate {
                key: key.to_string(),
                rate,
            });
        }
        if burst < 1 {
            return Err(TollgateError::InvalidBurst {
                key: key.to_string(),
                burst,
            });
        }
        Ok(())
    }

    /// Take a token, waiting for one to accrue if the bucket is empty.
    ///
    /// Returns `Cancelled` or `DeadlineExceeded` if the scope finishes first.
    /// When the scope has a deadline that falls before the next token, the
    /// call fails at once instead of sleeping until the deadline; a token that
    /// would arrive exactly at the deadline counts as too late. Waiting never
    /// touches the bucket, so an aborted wait leaves the token count intact.
    ///
    /// Waiters do not queue. Every waiter sleeps until the next token is due
    /// and they race for it when they wake; the losers compute a new wait.
    pub async fn acquire(&self, scope: &RequestScope) -> Result<()> {
        if let Some(err) = scope.error() {
            trace!(key = %self.key, error = %err, "Scope already finished before acquire");
            return Err(err);
        }

        loop {
            let now = Instant::now();
            let wait = match self.bucket.lock().try_take(now) {
                Ok(()) => {
                    trace!(key = %self.key, "Token granted");
                    return Ok(());
                }
                Err(wait) => wait,
            };

            if let Some(deadline) = scope.deadline() {
                if now.checked_add(wait).map_or(true, |ready| ready >= deadline) {
                    debug!(
                        key = %self.key,
                        wait_ms = wait.as_millis() as u64,
                        "Next token would arrive after the request deadline"
                    );
                    return Err(TollgateError::DeadlineExceeded);
                }
            }

            trace!(key = %self.key, wait_ms = wait.as_millis() as u64, "Waiting for token");

            tokio::select! {
                biased;
                err = scope.aborted() => {
                    debug!(key = %self.key, error = %err, "Token wait aborted");
                    return Err(err);
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let granted = self.bucket.lock().try_take(Instant::now()).is_ok();
        trace!(key = %self.key, granted, "Non-blocking acquire");
        granted
    }

    /// Tokens available at this instant, after refilling.
    pub fn available_tokens(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        bucket.refill(Instant::now());
        bucket.tokens()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Tokens refilled per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Maximum tokens held at once.
    pub fn burst(&self) -> u32 {
        self.burst
    }
}
