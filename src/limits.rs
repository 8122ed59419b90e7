//! Request rate limiting.
//!
//! The auth pipeline composes two injected tiers: a global bucket under the
//! literal key `"global"` and a per-client bucket under `"ip:<canonical-ip>"`.
//! Keys are opaque here; one keyed limiter serves any key space.

use std::num::NonZeroU32;

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter as GovernorLimiter,
    clock::DefaultClock,
    state::keyed::DefaultKeyedStateStore,
};

use crate::service::RateLimiter;

type KeyedLimiter = GovernorLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Token-bucket limiter with one bucket per key.
pub struct QuotaLimiter {
    inner: KeyedLimiter,
}

impl QuotaLimiter {
    /// Create a limiter allowing `per_second` sustained requests with bursts
    /// up to `burst` per key. Zero values are clamped to one.
    #[must_use]
    pub fn new(per_second: u32, burst: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN));
        Self {
            inner: GovernorLimiter::keyed(quota),
        }
    }
}

#[async_trait]
impl RateLimiter for QuotaLimiter {
    async fn allow(&self, key: &str) -> bool {
        self.inner.check_key(&key.to_string()).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_is_honored_then_exhausted() {
        let limiter = QuotaLimiter::new(1, 3);

        assert!(limiter.allow("global").await);
        assert!(limiter.allow("global").await);
        assert!(limiter.allow("global").await);
        assert!(!limiter.allow("global").await);
    }

    #[tokio::test]
    async fn buckets_are_independent_per_key() {
        let limiter = QuotaLimiter::new(1, 1);

        assert!(limiter.allow("ip:10.0.0.1").await);
        assert!(!limiter.allow("ip:10.0.0.1").await);
        // A different client still has budget.
        assert!(limiter.allow("ip:10.0.0.2").await);
    }

    #[tokio::test]
    async fn zero_quota_is_clamped_not_panicking() {
        let limiter = QuotaLimiter::new(0, 0);
        assert!(limiter.allow("global").await);
    }
}
