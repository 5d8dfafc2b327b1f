//! Global rate limiter shared by every outbound HTTP request.
//!
//! Wraps `governor`'s GCRA implementation with burst size 1, which gives the
//! same "wait until `interval` has elapsed since the last grant" behavior the
//! acquisition engine requires, without hand-rolling the timestamp bookkeeping.

use crate::error::{FetchError, Result};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type Inner = Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Default request rate, in requests per second, used when no explicit rate is configured.
pub const DEFAULT_RATE_PER_SECOND: f64 = 8.0;

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
    rate: f64,
}

impl RateLimiter {
    pub fn new(rate_per_second: f64) -> Result<Self> {
        if !(rate_per_second > 0.0) {
            return Err(FetchError::InvalidRate(rate_per_second));
        }
        let interval = Duration::from_secs_f64(1.0 / rate_per_second);
        let quota = Quota::with_period(interval)
            .ok_or(FetchError::InvalidRate(rate_per_second))?
            .allow_burst(NonZeroU32::new(1).expect("1 is nonzero"));
        Ok(Self {
            inner: Arc::new(Governor::direct(quota)),
            rate: rate_per_second,
        })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Suspends the caller until a permit is granted, enforcing the minimum
    /// inter-request interval across all callers of this limiter.
    pub async fn acquire(&self) {
        self.inner.until_ready().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_rate() {
        assert!(matches!(RateLimiter::new(0.0), Err(FetchError::InvalidRate(_))));
        assert!(matches!(RateLimiter::new(-1.0), Err(FetchError::InvalidRate(_))));
    }

    #[test]
    fn accepts_default_rate() {
        let limiter = RateLimiter::new(DEFAULT_RATE_PER_SECOND).unwrap();
        assert_eq!(limiter.rate(), 8.0);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn spaces_grants_by_the_interval() {
        let limiter = RateLimiter::new(10.0).unwrap();
        let start = tokio::time::Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs_f64(0.4));
    }
}
