//! Token bucket state and refill arithmetic.

use std::time::Duration;
use tokio::time::Instant;

/// Shortest time between two tokens, however high the configured rate.
pub const MIN_INTERVAL: Duration = Duration::from_nanos(1);

/// Convert a rate in tokens per second into the time it takes one token to accrue.
///
/// Very high rates are clamped to [`MIN_INTERVAL`] rather than rounding to zero.
/// Rates too small to invert map to [`Duration::MAX`].
pub fn interval_for_rate(rate: f64) -> Duration {
    let secs = 1.0 / rate;
    if secs.is_nan() || secs == f64::INFINITY {
        return Duration::MAX;
    }
    if secs <= MIN_INTERVAL.as_secs_f64() {
        return MIN_INTERVAL;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Bucket state for a single limiter.
///
/// The bucket holds no lock of its own; the owning limiter guards it. Time is
/// passed in so the arithmetic can be exercised against a paused clock.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Maximum tokens the bucket holds
    burst: u32,
    /// Time for one token to accrue
    interval: Duration,
    /// Tokens currently available, fractional between refills
    tokens: f64,
    /// When tokens were last recomputed
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(rate: f64, burst: u32, now: Instant) -> Self {
        Self {
            burst,
            interval: interval_for_rate(rate),
            tokens: burst as f64,
            last_refill: now,
        }
    }

    /// Add the tokens accrued since the last refill, capped at `burst`.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed.is_zero() {
            return;
        }

        let accrued = elapsed.as_secs_f64() / self.interval.as_secs_f64();
        self.tokens = (self.tokens + accrued).min(self.burst as f64);
        self.last_refill = now;
    }

    /// Refill, then take one token.
    ///
    /// On failure, returns how long until one whole token is available.
    /// A failed take leaves the token count as the refill computed it.
    pub fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Ok(());
        }

        Err(self.time_until_token())
    }

    /// Time until one whole token is available, zero if one is already there.
    pub fn time_until_token(&self) -> Duration {
        let missing = 1.0 - self.tokens;
        if missing <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.interval.as_secs_f64() * missing)
            .unwrap_or(Duration::MAX)
            .max(MIN_INTERVAL)
    }

    /// Tokens available as of the last refill.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Bucket capacity.
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Time for one token to accrue.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_for_rate() {
        assert_eq!(interval_for_rate(1.0), Duration::from_secs(1));
        assert_eq!(interval_for_rate(2.0), Duration::from_millis(500));
        assert_eq!(interval_for_rate(0.5), Duration::from_secs(2));
    }

    #[test]
    fn test_interval_clamped_for_huge_rate() {
        assert_eq!(interval_for_rate(1e12), MIN_INTERVAL);
        assert_eq!(interval_for_rate(f64::MAX), MIN_INTERVAL);
    }

    #[test]
    fn test_interval_for_uninvertible_rate_is_max() {
        assert_eq!(interval_for_rate(1e-310), Duration::MAX);
        assert_eq!(interval_for_rate(1e-30), Duration::MAX);
    }

    #[test]
    fn test_tiny_rate_does_not_refill_quickly() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(1e-310, 1, now);
        assert!(bucket.try_take(now).is_ok());

        let later = now + Duration::from_secs(3600);
        assert!(bucket.try_take(later).is_err());
    }

    #[test]
    fn test_bucket_starts_full() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(1.0, 3, now);

        for _ in 0..3 {
            assert!(bucket.try_take(now).is_ok());
        }
        assert_eq!(bucket.try_take(now), Err(Duration::from_secs(1)));
    }

    #[test]
    fn test_refill_accrues_fractional_tokens() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(2.0, 1, now);
        assert!(bucket.try_take(now).is_ok());

        // 250ms at 2 tokens/s is half a token, kept for the next call
        let later = now + Duration::from_millis(250);
        assert_eq!(bucket.try_take(later), Err(Duration::from_millis(250)));
        assert!((bucket.tokens() - 0.5).abs() < 1e-9);

        let ready = later + Duration::from_millis(250);
        assert!(bucket.try_take(ready).is_ok());
    }

    #[test]
    fn test_refill_capped_at_burst() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(100.0, 5, now);
        bucket.try_take(now).unwrap();

        bucket.refill(now + Duration::from_secs(3600));
        assert_eq!(bucket.tokens(), 5.0);
    }

    #[test]
    fn test_stale_clock_reading_adds_nothing() {
        let start = Instant::now();
        let later = start + Duration::from_secs(1);
        let mut bucket = TokenBucket::new(1.0, 1, later);
        bucket.try_take(later).unwrap();

        bucket.refill(start);
        assert_eq!(bucket.tokens(), 0.0);

        // last_refill did not move back, so the second is not counted twice
        bucket.refill(later + Duration::from_millis(500));
        assert!((bucket.tokens() - 0.5).abs() < 1e-9);
    }
}
