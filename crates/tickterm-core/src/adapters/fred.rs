use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::adapters::{parse_json, send};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::data_source::{CapabilitySet, DataSource, Endpoint, FetchError, SourceFuture};
use crate::http_client::{HttpClient, HttpRequest};
use crate::{EconomicObservation, ProviderId};

const DEFAULT_BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// Federal Reserve Economic Data adapter; serves economic series only.
#[derive(Clone)]
pub struct FredAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    base_url: String,
    timeout: Duration,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl FredAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            base_url: String::from(DEFAULT_BASE_URL),
            timeout: Duration::from_secs(10),
            circuit_breaker: Arc::new(CircuitBreaker::new(
                ProviderId::Fred,
                CircuitBreakerConfig::default(),
            )),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn fetch_latest(&self, series_id: &str) -> Result<EconomicObservation, FetchError> {
        let request = HttpRequest::get(format!("{}/series/observations", self.base_url))
            .with_timeout(self.timeout)
            .with_query("series_id", series_id)
            .with_query("api_key", &self.api_key)
            .with_query("file_type", "json")
            .with_query("sort_order", "desc")
            .with_query("limit", 1);

        let body = send(
            ProviderId::Fred,
            self.http_client.as_ref(),
            &self.circuit_breaker,
            request,
        )
        .await?;
        let response: FredObservations = parse_json(ProviderId::Fred, &body)?;

        let latest = response
            .observations
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::not_found(format!("no observations for {series_id}")))?;

        Ok(EconomicObservation {
            series_id: series_id.to_owned(),
            // FRED publishes "." for a missing data point
            value: latest.value.trim().parse().ok(),
            date: latest.date,
        })
    }
}

impl DataSource for FredAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Fred
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::only(&[Endpoint::Economic])
    }

    fn economic_series<'a>(&'a self, series_id: &'a str) -> SourceFuture<'a, EconomicObservation> {
        Box::pin(self.fetch_latest(series_id))
    }
}

#[derive(Deserialize)]
struct FredObservations {
    #[serde(default)]
    observations: Vec<FredObservation>,
}

#[derive(Deserialize)]
struct FredObservation {
    date: String,
    value: String,
}
