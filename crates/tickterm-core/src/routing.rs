use std::sync::Arc;

use crate::adapters::{FmpAdapter, FredAdapter, MockSource};
use crate::config::Settings;
use crate::data_source::{DataSource, Endpoint, FetchError};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::ProviderId;

/// Ordered adapter registry; the first source supporting an endpoint serves it.
#[derive(Clone, Default)]
pub struct SourceRouter {
    sources: Vec<Arc<dyn DataSource>>,
}

impl SourceRouter {
    pub fn new(sources: Vec<Arc<dyn DataSource>>) -> Self {
        Self { sources }
    }

    pub fn builder() -> SourceRouterBuilder {
        SourceRouterBuilder::default()
    }

    /// Router serving every endpoint from [`MockSource`].
    pub fn mock() -> Self {
        Self::new(vec![Arc::new(MockSource::new())])
    }

    /// Picks the source for `endpoint`.
    ///
    /// With no capable source the request cannot be authorized, so the error
    /// is `InvalidKey` naming the variable to set.
    pub fn select(&self, endpoint: Endpoint) -> Result<Arc<dyn DataSource>, FetchError> {
        self.sources
            .iter()
            .find(|source| source.capabilities().supports(endpoint))
            .cloned()
            .ok_or_else(|| {
                let provider = match endpoint {
                    Endpoint::Economic => ProviderId::Fred,
                    _ => ProviderId::Fmp,
                };
                let variable = provider.key_variable().unwrap_or_default();
                FetchError::invalid_key(format!(
                    "no data source configured for {endpoint}; set {variable} or run with --mock"
                ))
            })
    }

    pub fn source_ids(&self) -> Vec<ProviderId> {
        self.sources.iter().map(|source| source.id()).collect()
    }
}

/// Assembles a router from keys and flags.
#[derive(Default)]
pub struct SourceRouterBuilder {
    fmp_api_key: Option<String>,
    fred_api_key: Option<String>,
    mock_mode: bool,
    http_client: Option<Arc<dyn HttpClient>>,
    extra: Vec<Arc<dyn DataSource>>,
}

impl SourceRouterBuilder {
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.fmp_api_key = settings.fmp_api_key.clone();
        self.fred_api_key = settings.fred_api_key.clone();
        self.mock_mode = settings.mock_mode;
        self
    }

    pub fn with_mock_mode(mut self, mock_mode: bool) -> Self {
        self.mock_mode = mock_mode;
        self
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Registers a source ahead of the configured providers.
    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.extra.push(source);
        self
    }

    pub fn build(self) -> SourceRouter {
        let mut sources = self.extra;

        if self.mock_mode {
            sources.push(Arc::new(MockSource::new()));
            return SourceRouter::new(sources);
        }

        let http_client = self
            .http_client
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
        if let Some(key) = self.fmp_api_key {
            sources.push(Arc::new(FmpAdapter::new(http_client.clone(), key)));
        }
        if let Some(key) = self.fred_api_key {
            sources.push(Arc::new(FredAdapter::new(http_client, key)));
        }
        SourceRouter::new(sources)
    }
}
