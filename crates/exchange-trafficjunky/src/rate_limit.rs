//! Shared request throttle.
//!
//! One [`RateLimiter`] is created per run and cloned into every client, so the
//! aggregate request rate stays at one call per interval no matter how many
//! campaign workers are in flight.

use crate::cancel::CancelToken;
use crate::error::{MarketplaceError, Result};
use governor::{Quota, RateLimiter as GovernorLimiter};
use nonzero_ext::nonzero;
use std::sync::Arc;
use std::time::Duration;

/// Minimum spacing between marketplace calls.
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_millis(300);

type DirectLimiter = GovernorLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Fixed-interval limiter with a burst of one.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<DirectLimiter>,
    interval: Duration,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        let quota = Quota::with_period(DEFAULT_REQUEST_INTERVAL)
            .unwrap_or_else(|| Quota::per_second(nonzero!(3u32)))
            .allow_burst(nonzero!(1u32));
        Self {
            inner: Arc::new(GovernorLimiter::direct(quota)),
            interval: DEFAULT_REQUEST_INTERVAL,
        }
    }
}

impl RateLimiter {
    /// Creates a limiter allowing one call per `interval`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `interval` is zero.
    pub fn new(interval: Duration) -> Result<Self> {
        let quota = Quota::with_period(interval)
            .ok_or_else(|| {
                MarketplaceError::Configuration("rate limit interval must be positive".to_string())
            })?
            .allow_burst(nonzero!(1u32));

        Ok(Self {
            inner: Arc::new(GovernorLimiter::direct(quota)),
            interval,
        })
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until a call is permitted.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceError::Cancelled`] if `cancel` fires first.
    pub async fn wait(&self, cancel: &CancelToken) -> Result<()> {
        cancel
            .guard(async {
                self.inner.until_ready().await;
                Ok(())
            })
            .await
    }
}
