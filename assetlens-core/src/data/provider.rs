//! Market-data provider trait and structured error types.
//!
//! The `MarketDataProvider` trait abstracts over price sources (Yahoo Finance,
//! in-memory fakes in tests) so the pipeline never depends on a concrete
//! transport. The cache layer sits above this trait; providers don't know
//! about the cache.

use super::period::PeriodSpec;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Raw daily OHLCV bar from a provider. Fields the provider left blank are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<u64>,
}

impl RawBar {
    /// Bar carrying only a close, as used by fakes and fixtures.
    pub fn close_only(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: None,
            high: None,
            low: None,
            close: Some(close),
            adj_close: None,
            volume: None,
        }
    }

    /// The price this bar contributes under the given basis.
    ///
    /// Adjusted close falls back to the raw close when the provider has no
    /// adjusted value for the bar.
    pub fn price(&self, basis: PriceBasis) -> Option<f64> {
        let value = match basis {
            PriceBasis::Close => self.close,
            PriceBasis::AdjustedClose => self.adj_close.or(self.close),
        };
        value.filter(|v| v.is_finite())
    }
}

/// Which price column of a bar feeds the price table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBasis {
    #[default]
    Close,
    AdjustedClose,
}

/// Structured error types for provider operations.
///
/// These never reach the presentation layer directly: the pipeline converts
/// them into an empty outcome plus a warning.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("provider is refusing requests (circuit breaker open)")]
    CircuitBreakerTripped,

    #[error("http client setup failed: {0}")]
    ClientSetup(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Result of one batched fetch.
///
/// `series` only holds symbols the provider recognized; everything else
/// requested lands in `unrecognized`.
#[derive(Debug, Clone, Default)]
pub struct BatchResponse {
    pub series: BTreeMap<String, Vec<RawBar>>,
    pub unrecognized: Vec<String>,
}

impl BatchResponse {
    pub fn is_empty(&self) -> bool {
        self.series.values().all(|bars| bars.is_empty())
    }
}

/// Trait for market-data providers.
///
/// One call covers the whole symbol set; how the provider fans that out
/// internally is its own business.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for every symbol over the window.
    fn fetch_batch(
        &self,
        symbols: &[String],
        window: &PeriodSpec,
    ) -> Result<BatchResponse, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn adjusted_basis_falls_back_to_close() {
        let mut bar = RawBar::close_only(date("2024-01-02"), 101.0);
        assert_eq!(bar.price(PriceBasis::AdjustedClose), Some(101.0));

        bar.adj_close = Some(99.5);
        assert_eq!(bar.price(PriceBasis::AdjustedClose), Some(99.5));
        assert_eq!(bar.price(PriceBasis::Close), Some(101.0));
    }

    #[test]
    fn non_finite_prices_are_treated_as_missing() {
        let bar = RawBar::close_only(date("2024-01-02"), f64::NAN);
        assert_eq!(bar.price(PriceBasis::Close), None);
    }

    #[test]
    fn empty_batch_detection() {
        let mut batch = BatchResponse::default();
        assert!(batch.is_empty());
        batch.series.insert("SPY".into(), Vec::new());
        assert!(batch.is_empty());
        batch
            .series
            .insert("QQQ".into(), vec![RawBar::close_only(date("2024-01-02"), 1.0)]);
        assert!(!batch.is_empty());
    }
}
