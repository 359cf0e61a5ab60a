use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_NAME_LEN: usize = 32;

/// Case-insensitive watchlist identifier, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WatchlistName(String);

impl WatchlistName {
    pub const DEFAULT: &'static str = "default";

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let normalized = input.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(ValidationError::EmptyWatchlistName);
        }

        let len = normalized.chars().count();
        if len > MAX_NAME_LEN {
            return Err(ValidationError::WatchlistNameTooLong {
                len,
                max: MAX_NAME_LEN,
            });
        }

        if let Some(ch) = normalized
            .chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '_' || *ch == '-'))
        {
            return Err(ValidationError::WatchlistNameInvalidChar { ch });
        }

        Ok(Self(normalized))
    }

    pub fn default_list() -> Self {
        Self(String::from(Self::DEFAULT))
    }

    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for WatchlistName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for WatchlistName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WatchlistName> for String {
    fn from(value: WatchlistName) -> Self {
        value.0
    }
}
