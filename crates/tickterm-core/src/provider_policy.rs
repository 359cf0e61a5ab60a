use std::time::Duration;

use crate::ProviderId;

/// Local request budget for one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPolicy {
    pub provider_id: ProviderId,
    pub quota_window: Duration,
    pub quota_limit: u32,
    /// Upper bound on the retry-after hint handed back when the budget is spent.
    pub max_retry_after: Duration,
}

impl ProviderPolicy {
    /// FMP starter plan: 300 calls per minute.
    pub fn fmp_default() -> Self {
        Self {
            provider_id: ProviderId::Fmp,
            quota_window: Duration::from_secs(60),
            quota_limit: 300,
            max_retry_after: Duration::from_secs(5),
        }
    }

    /// FRED allows 120 requests per minute per key.
    pub fn fred_default() -> Self {
        Self {
            provider_id: ProviderId::Fred,
            quota_window: Duration::from_secs(60),
            quota_limit: 120,
            max_retry_after: Duration::from_secs(5),
        }
    }

    pub fn default_for(provider_id: ProviderId) -> Option<Self> {
        match provider_id {
            ProviderId::Fmp => Some(Self::fmp_default()),
            ProviderId::Fred => Some(Self::fred_default()),
            ProviderId::Mock => None,
        }
    }
}
