use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Chart look-back window accepted by the `GP` verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChartPeriod {
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
    #[default]
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "5Y")]
    FiveYears,
}

impl ChartPeriod {
    pub const ALL: [Self; 7] = [
        Self::OneDay,
        Self::OneWeek,
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
        Self::FiveYears,
    ];

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let normalized = input.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|period| period.as_str() == normalized)
            .ok_or(ValidationError::InvalidPeriod {
                value: input.trim().to_owned(),
            })
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1D",
            Self::OneWeek => "1W",
            Self::OneMonth => "1M",
            Self::ThreeMonths => "3M",
            Self::SixMonths => "6M",
            Self::OneYear => "1Y",
            Self::FiveYears => "5Y",
        }
    }

    /// Calendar days covered by the window.
    pub const fn days(self) -> i64 {
        match self {
            Self::OneDay => 1,
            Self::OneWeek => 7,
            Self::OneMonth => 30,
            Self::ThreeMonths => 90,
            Self::SixMonths => 180,
            Self::OneYear => 365,
            Self::FiveYears => 1825,
        }
    }
}

impl Display for ChartPeriod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartPeriod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_periods_case_insensitively() {
        assert_eq!(ChartPeriod::parse("1y"), Ok(ChartPeriod::OneYear));
        assert_eq!(ChartPeriod::parse("5Y"), Ok(ChartPeriod::FiveYears));
        assert_eq!(ChartPeriod::parse(" 3m "), Ok(ChartPeriod::ThreeMonths));
    }

    #[test]
    fn rejects_periods_outside_the_fixed_set() {
        for value in ["2Y", "10D", "", "YTD"] {
            let err = ChartPeriod::parse(value).expect_err("must fail");
            assert!(matches!(err, ValidationError::InvalidPeriod { .. }));
        }
    }

    #[test]
    fn default_period_is_one_month() {
        assert_eq!(ChartPeriod::default(), ChartPeriod::OneMonth);
        assert_eq!(ChartPeriod::OneMonth.days(), 30);
    }
}
