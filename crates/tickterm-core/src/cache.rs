//! In-memory response cache keyed by (endpoint, normalized arguments).
//!
//! Entries expire by TTL only. Values are stored as serialized JSON bodies so
//! one store can hold every endpoint's response type.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::data_source::Endpoint;

/// Exact operation + argument tuple a response was fetched for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub endpoint: Endpoint,
    pub args: String,
}

impl CacheKey {
    /// Builds a key from already-normalized argument parts.
    pub fn new<I, S>(endpoint: Endpoint, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args = args
            .into_iter()
            .map(|part| part.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join("|");
        Self { endpoint, args }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.endpoint, self.args)
    }
}

/// Per-endpoint time-to-live table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTtls {
    pub quote: Duration,
    pub series: Duration,
    pub statement: Duration,
    pub profile: Duration,
    pub ratios: Duration,
    pub news: Duration,
    pub search: Duration,
    pub movers: Duration,
    pub yields: Duration,
    pub economic: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            quote: Duration::from_secs(15),
            series: Duration::from_secs(300),
            statement: Duration::from_secs(3600),
            profile: Duration::from_secs(3600),
            ratios: Duration::from_secs(3600),
            news: Duration::from_secs(300),
            search: Duration::from_secs(3600),
            movers: Duration::from_secs(60),
            yields: Duration::from_secs(3600),
            economic: Duration::from_secs(3600),
        }
    }
}

impl CacheTtls {
    pub const fn for_endpoint(&self, endpoint: Endpoint) -> Duration {
        match endpoint {
            Endpoint::Quote => self.quote,
            Endpoint::Series => self.series,
            Endpoint::Statement => self.statement,
            Endpoint::Profile => self.profile,
            Endpoint::Ratios => self.ratios,
            Endpoint::News => self.news,
            Endpoint::Search => self.search,
            Endpoint::Movers => self.movers,
            Endpoint::Yields => self.yields,
            Endpoint::Economic => self.economic,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    fetched_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.fetched_at) < self.ttl
    }
}

/// Inserts between sweeps of expired entries.
const DEFAULT_SWEEP_EVERY: usize = 256;

/// Thread-safe in-memory cache shared by all concurrent dispatches.
///
/// Expired entries are swept from `put` every `sweep_every` inserts, so keys
/// that are never requested again do not stay resident.
#[derive(Debug, Clone)]
pub struct CacheStore {
    inner: Arc<tokio::sync::RwLock<HashMap<CacheKey, CacheEntry>>>,
    inserts: Arc<AtomicUsize>,
    sweep_every: usize,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self {
            inner: Arc::default(),
            inserts: Arc::default(),
            sweep_every: DEFAULT_SWEEP_EVERY,
        }
    }
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweeps expired entries every `inserts` puts (minimum 1).
    pub fn with_sweep_every(mut self, inserts: usize) -> Self {
        self.sweep_every = inserts.max(1);
        self
    }

    /// Returns the body for `key` if it is still within its TTL.
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        let map = self.inner.read().await;
        let now = Instant::now();
        map.get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.body.clone())
    }

    /// Stores `body`; a zero TTL disables caching for the entry.
    pub async fn put(&self, key: CacheKey, body: String, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }

        let now = Instant::now();
        let mut map = self.inner.write().await;
        map.insert(
            key,
            CacheEntry {
                body,
                fetched_at: now,
                ttl,
            },
        );

        let inserted = self.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if inserted % self.sweep_every == 0 {
            let before = map.len();
            map.retain(|_, entry| entry.is_fresh(now));
            tracing::trace!(swept = before - map.len(), "cache sweep");
        }
    }

    pub async fn clear_expired(&self) {
        let mut map = self.inner.write().await;
        let now = Instant::now();
        map.retain(|_, entry| entry.is_fresh(now));
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    /// Number of entries, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
