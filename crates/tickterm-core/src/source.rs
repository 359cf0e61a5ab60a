use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Identifiers for the data providers tickterm can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Financial Modeling Prep.
    Fmp,
    /// Federal Reserve Economic Data.
    Fred,
    /// Deterministic offline data.
    Mock,
}

impl ProviderId {
    pub const ALL: [Self; 3] = [Self::Fmp, Self::Fred, Self::Mock];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fmp => "fmp",
            Self::Fred => "fred",
            Self::Mock => "mock",
        }
    }

    /// Environment variable that carries this provider's key, if it needs one.
    pub const fn key_variable(self) -> Option<&'static str> {
        match self {
            Self::Fmp => Some("TICKTERM_FMP_API_KEY"),
            Self::Fred => Some("TICKTERM_FRED_API_KEY"),
            Self::Mock => None,
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
