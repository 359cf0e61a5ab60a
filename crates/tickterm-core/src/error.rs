use thiserror::Error;

/// Validation errors raised while constructing domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter, digit or '^': '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("watchlist name cannot be empty")]
    EmptyWatchlistName,
    #[error("watchlist name length {len} exceeds max {max}")]
    WatchlistNameTooLong { len: usize, max: usize },
    #[error("watchlist name contains invalid character '{ch}'")]
    WatchlistNameInvalidChar { ch: char },

    #[error("invalid period '{value}', expected one of 1D, 1W, 1M, 3M, 6M, 1Y, 5Y")]
    InvalidPeriod { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("unrecognized date '{value}'")]
    InvalidDate { value: String },

    #[error("price series for {symbol} is empty")]
    EmptySeries { symbol: String },
}
