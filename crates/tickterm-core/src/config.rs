//! Runtime configuration read from environment variables.
//!
//! Every setting has a `TICKTERM_` name; API keys also accept the unprefixed
//! provider name (`FMP_API_KEY`, `FRED_API_KEY`). Values that fail to parse
//! fall back to their defaults.

use std::env;
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::CacheTtls;
use crate::Symbol;

const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_CHART_WIDTH: usize = 60;
const DEFAULT_CHART_HEIGHT: usize = 12;

#[derive(Clone, PartialEq)]
pub struct Settings {
    pub fmp_api_key: Option<String>,
    pub fred_api_key: Option<String>,
    pub watchlist_path: PathBuf,
    pub fetch_timeout: Duration,
    pub max_retries: u32,
    pub ttls: CacheTtls,
    pub chart_width: usize,
    pub chart_height: usize,
    /// Route every endpoint to the offline mock source.
    pub mock_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fmp_api_key: None,
            fred_api_key: None,
            watchlist_path: default_watchlist_path(env::var_os("HOME").map(PathBuf::from)),
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            ttls: CacheTtls::default(),
            chart_width: DEFAULT_CHART_WIDTH,
            chart_height: DEFAULT_CHART_HEIGHT,
            mock_mode: false,
        }
    }
}

impl Debug for Settings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("fmp_api_key", &redacted(&self.fmp_api_key))
            .field("fred_api_key", &redacted(&self.fred_api_key))
            .field("watchlist_path", &self.watchlist_path)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("max_retries", &self.max_retries)
            .field("ttls", &self.ttls)
            .field("chart_width", &self.chart_width)
            .field("chart_height", &self.chart_height)
            .field("mock_mode", &self.mock_mode)
            .finish()
    }
}

fn redacted(key: &Option<String>) -> &'static str {
    match key {
        Some(_) => "<set>",
        None => "<unset>",
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let mut ttls = defaults.ttls.clone();
        if let Some(secs) = parsed::<u64>(&var, "TICKTERM_QUOTE_TTL_SECS") {
            ttls.quote = Duration::from_secs(secs);
        }
        if let Some(secs) = parsed::<u64>(&var, "TICKTERM_NEWS_TTL_SECS") {
            ttls.news = Duration::from_secs(secs);
        }
        if let Some(secs) = parsed::<u64>(&var, "TICKTERM_STATEMENT_TTL_SECS") {
            ttls.statement = Duration::from_secs(secs);
        }

        let watchlist_path = match var("TICKTERM_WATCHLIST_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_watchlist_path(var("HOME").map(PathBuf::from)),
        };

        Self {
            fmp_api_key: var("TICKTERM_FMP_API_KEY").or_else(|| var("FMP_API_KEY")),
            fred_api_key: var("TICKTERM_FRED_API_KEY").or_else(|| var("FRED_API_KEY")),
            watchlist_path,
            fetch_timeout: parsed::<u64>(&var, "TICKTERM_FETCH_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.fetch_timeout),
            max_retries: parsed(&var, "TICKTERM_MAX_RETRIES").unwrap_or(defaults.max_retries),
            ttls,
            chart_width: parsed(&var, "TICKTERM_CHART_WIDTH").unwrap_or(defaults.chart_width),
            chart_height: parsed(&var, "TICKTERM_CHART_HEIGHT").unwrap_or(defaults.chart_height),
            mock_mode: false,
        }
    }

    pub fn with_mock_mode(mut self, mock_mode: bool) -> Self {
        self.mock_mode = mock_mode;
        self
    }
}

fn parsed<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = var(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, "ignoring unparseable setting");
            None
        }
    }
}

fn default_watchlist_path(home: Option<PathBuf>) -> PathBuf {
    match home {
        Some(home) => home.join(".tickterm").join("watchlists.json"),
        None => PathBuf::from("watchlists.json"),
    }
}

/// One symbol of a configured basket with its display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasketEntry {
    pub symbol: Symbol,
    pub label: String,
}

/// Economic series shown on the `ECST` page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indicator {
    pub series_id: String,
    pub label: String,
    pub unit: String,
}

/// Symbol lists behind the basket pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasketConfig {
    pub indices: Vec<BasketEntry>,
    pub forex: Vec<BasketEntry>,
    pub indicators: Vec<Indicator>,
}

const INDICES: &[(&str, &str)] = &[
    ("^GSPC", "S&P 500"),
    ("^DJI", "Dow Jones"),
    ("^IXIC", "Nasdaq Composite"),
    ("^RUT", "Russell 2000"),
    ("^FTSE", "FTSE 100"),
    ("^GDAXI", "DAX"),
    ("^FCHI", "CAC 40"),
    ("^STOXX50E", "Euro Stoxx 50"),
    ("^N225", "Nikkei 225"),
    ("^HSI", "Hang Seng"),
    ("^KS11", "KOSPI"),
    ("^AXJO", "ASX 200"),
];

const FOREX: &[(&str, &str)] = &[
    ("FXE", "Euro"),
    ("FXY", "Japanese Yen"),
    ("FXB", "British Pound"),
    ("FXC", "Canadian Dollar"),
    ("FXA", "Australian Dollar"),
    ("UUP", "US Dollar Index"),
];

const INDICATORS: &[(&str, &str, &str)] = &[
    ("GDP", "Gross Domestic Product", "Bil. $"),
    ("UNRATE", "Unemployment Rate", "%"),
    ("CPIAUCSL", "Consumer Price Index", "Index"),
    ("FEDFUNDS", "Federal Funds Rate", "%"),
    ("DGS10", "10-Year Treasury", "%"),
];

impl Default for BasketConfig {
    fn default() -> Self {
        Self {
            indices: entries(INDICES),
            forex: entries(FOREX),
            indicators: INDICATORS
                .iter()
                .map(|(series_id, label, unit)| Indicator {
                    series_id: (*series_id).to_owned(),
                    label: (*label).to_owned(),
                    unit: (*unit).to_owned(),
                })
                .collect(),
        }
    }
}

fn entries(table: &[(&str, &str)]) -> Vec<BasketEntry> {
    table
        .iter()
        .filter_map(|(symbol, label)| {
            Symbol::parse(symbol).ok().map(|symbol| BasketEntry {
                symbol,
                label: (*label).to_owned(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_variables() {
        let settings = Settings::from_lookup(lookup(&[("HOME", "/home/trader")]));
        assert_eq!(settings.fmp_api_key, None);
        assert_eq!(settings.fetch_timeout, Duration::from_secs(10));
        assert_eq!(settings.max_retries, 2);
        assert_eq!(settings.chart_width, 60);
        assert_eq!(
            settings.watchlist_path,
            PathBuf::from("/home/trader/.tickterm/watchlists.json")
        );
    }

    #[test]
    fn prefixed_key_wins_over_fallback() {
        let settings = Settings::from_lookup(lookup(&[
            ("TICKTERM_FMP_API_KEY", "primary"),
            ("FMP_API_KEY", "fallback"),
            ("FRED_API_KEY", "fred"),
        ]));
        assert_eq!(settings.fmp_api_key.as_deref(), Some("primary"));
        assert_eq!(settings.fred_api_key.as_deref(), Some("fred"));
    }

    #[test]
    fn overrides_and_bad_values() {
        let settings = Settings::from_lookup(lookup(&[
            ("TICKTERM_QUOTE_TTL_SECS", "5"),
            ("TICKTERM_MAX_RETRIES", "lots"),
            ("TICKTERM_CHART_HEIGHT", "20"),
            ("TICKTERM_WATCHLIST_PATH", "/tmp/lists.json"),
        ]));
        assert_eq!(settings.ttls.quote, Duration::from_secs(5));
        assert_eq!(settings.max_retries, 2);
        assert_eq!(settings.chart_height, 20);
        assert_eq!(settings.watchlist_path, PathBuf::from("/tmp/lists.json"));
    }

    #[test]
    fn debug_output_hides_keys() {
        let settings = Settings::from_lookup(lookup(&[("FMP_API_KEY", "sk-secret")]));
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<set>"));
    }

    #[test]
    fn default_baskets_are_complete() {
        let baskets = BasketConfig::default();
        assert_eq!(baskets.indices.len(), 12);
        assert_eq!(baskets.forex.len(), 6);
        assert_eq!(baskets.indicators.len(), 5);
        assert_eq!(baskets.indices[0].symbol.as_str(), "^GSPC");
    }
}
