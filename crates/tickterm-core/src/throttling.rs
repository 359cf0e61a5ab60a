use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::data_source::FetchError;
use crate::provider_policy::ProviderPolicy;
use crate::ProviderId;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Client-side request budget for one provider.
///
/// A spent budget is reported as `RateLimited` before any network traffic,
/// carrying the time until the next cell replenishes as the retry hint.
#[derive(Clone)]
pub struct ThrottlingQueue {
    provider: ProviderId,
    limiter: Arc<DirectRateLimiter>,
    replenish_interval: Duration,
    max_retry_after: Duration,
}

impl ThrottlingQueue {
    pub fn new(
        provider: ProviderId,
        quota_window: Duration,
        quota_limit: u32,
        max_retry_after: Duration,
    ) -> Self {
        let quota = quota_from_window(quota_window, quota_limit);
        Self {
            provider,
            replenish_interval: quota.replenish_interval(),
            limiter: Arc::new(RateLimiter::direct(quota)),
            max_retry_after,
        }
    }

    pub fn from_policy(policy: &ProviderPolicy) -> Self {
        Self::new(
            policy.provider_id,
            policy.quota_window,
            policy.quota_limit,
            policy.max_retry_after,
        )
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    /// Takes one cell of budget.
    pub fn acquire(&self) -> Result<(), FetchError> {
        if self.limiter.check().is_ok() {
            return Ok(());
        }

        let retry_after = self.replenish_interval.min(self.max_retry_after);
        Err(FetchError::rate_limited(format!(
            "{} request budget exhausted; retry in {:.2}s",
            self.provider,
            retry_after.as_secs_f64()
        ))
        .with_retry_after(retry_after))
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let burst = NonZeroU32::new(quota_limit.max(1)).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(burst.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
