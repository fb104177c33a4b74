//! Lookback windows: enumerated period tokens or explicit date ranges.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Enumerated lookback shorthand understood by the market-data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PeriodToken {
    FiveDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
    TenYears,
    TwentyYears,
    FortyYears,
}

impl PeriodToken {
    /// Token as sent on the wire (`range=` query parameter).
    pub fn as_provider_str(self) -> &'static str {
        match self {
            PeriodToken::FiveDays => "5d",
            PeriodToken::OneMonth => "1mo",
            PeriodToken::ThreeMonths => "3mo",
            PeriodToken::SixMonths => "6mo",
            PeriodToken::OneYear => "1y",
            PeriodToken::TwoYears => "2y",
            PeriodToken::FiveYears => "5y",
            PeriodToken::TenYears => "10y",
            PeriodToken::TwentyYears => "20y",
            PeriodToken::FortyYears => "40y",
        }
    }

    /// Calendar days the token spans, for callers that need a concrete range.
    pub fn calendar_days(self) -> i64 {
        match self {
            PeriodToken::FiveDays => 7,
            PeriodToken::OneMonth => 31,
            PeriodToken::ThreeMonths => 92,
            PeriodToken::SixMonths => 183,
            PeriodToken::OneYear => 365,
            PeriodToken::TwoYears => 2 * 365,
            PeriodToken::FiveYears => 5 * 365 + 1,
            PeriodToken::TenYears => 10 * 365 + 2,
            PeriodToken::TwentyYears => 20 * 365 + 5,
            PeriodToken::FortyYears => 40 * 365 + 10,
        }
    }

    /// Resolve a dashboard label, falling back to three months for anything unknown.
    pub fn from_label_or_default(label: &str) -> Self {
        label.parse().unwrap_or(PeriodToken::ThreeMonths)
    }
}

impl fmt::Display for PeriodToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_provider_str())
    }
}

/// Error for unparseable period labels.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown period '{0}' (expected one of 5d 1mo 3mo 6mo 1y 2y 5y 10y 20y 40y or 1W 1M 3M 6M 1Y)")]
pub struct UnknownPeriod(pub String);

impl FromStr for PeriodToken {
    type Err = UnknownPeriod;

    /// Accepts provider tokens (`5d`, `1mo`, ...) and the short dashboard
    /// labels (`1W`, `1M`, `3M`, `6M`, `1Y`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = match s.trim() {
            "5d" | "1W" => PeriodToken::FiveDays,
            "1mo" | "1M" => PeriodToken::OneMonth,
            "3mo" | "3M" => PeriodToken::ThreeMonths,
            "6mo" | "6M" => PeriodToken::SixMonths,
            "1y" | "1Y" => PeriodToken::OneYear,
            "2y" => PeriodToken::TwoYears,
            "5y" => PeriodToken::FiveYears,
            "10y" => PeriodToken::TenYears,
            "20y" => PeriodToken::TwentyYears,
            "40y" => PeriodToken::FortyYears,
            other => return Err(UnknownPeriod(other.to_string())),
        };
        Ok(token)
    }
}

/// A request window: either a provider token or an explicit inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodSpec {
    Token(PeriodToken),
    Range { start: NaiveDate, end: NaiveDate },
}

impl From<PeriodToken> for PeriodSpec {
    fn from(token: PeriodToken) -> Self {
        PeriodSpec::Token(token)
    }
}

impl fmt::Display for PeriodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodSpec::Token(token) => write!(f, "{token}"),
            PeriodSpec::Range { start, end } => write!(f, "{start}..{end}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_tokens_and_dashboard_labels() {
        assert_eq!("1mo".parse::<PeriodToken>().unwrap(), PeriodToken::OneMonth);
        assert_eq!("1W".parse::<PeriodToken>().unwrap(), PeriodToken::FiveDays);
        assert_eq!("10y".parse::<PeriodToken>().unwrap(), PeriodToken::TenYears);
        assert!("7w".parse::<PeriodToken>().is_err());
    }

    #[test]
    fn unknown_label_falls_back_to_three_months() {
        assert_eq!(
            PeriodToken::from_label_or_default("whatever"),
            PeriodToken::ThreeMonths
        );
        assert_eq!(PeriodToken::from_label_or_default("1Y"), PeriodToken::OneYear);
    }

    #[test]
    fn window_display_and_span() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(PeriodSpec::Range { start: a, end: b }.to_string(), "2024-01-02..2024-03-01");
        assert_eq!(PeriodSpec::from(PeriodToken::OneYear).to_string(), "1y");
        assert_eq!(PeriodToken::OneYear.calendar_days(), 365);
    }
}
