//! Yahoo Finance market-data provider.
//!
//! Fetches daily bars from Yahoo's v8 chart API, one request per symbol,
//! behind the single batched `fetch_batch` call the pipeline makes. Handles
//! rate limiting, retries with exponential backoff, response parsing and the
//! circuit breaker.
//!
//! A whole batch shares one deadline equal to the configured request timeout:
//! retries, backoff sleeps and later symbols all draw on the same budget, and
//! a timed-out request is never retried.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes; every parse problem surfaces as `ResponseFormatChanged`.

use super::circuit_breaker::CircuitBreaker;
use super::period::PeriodSpec;
use super::provider::{BatchResponse, DataError, MarketDataProvider, RawBar};
use crate::config::MarketConfig;
use chrono::NaiveDate;
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: Url,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
    timeout: Duration,
}

impl YahooProvider {
    pub fn new(config: &MarketConfig, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| DataError::ClientSetup(e.to_string()))?;
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| DataError::ClientSetup(format!("invalid base url '{}': {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(DataError::ClientSetup(format!(
                "base url '{}' cannot carry a path",
                config.base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            circuit_breaker,
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            timeout,
        })
    }

    /// Build the chart API URL for a symbol and window.
    fn chart_url(&self, symbol: &str, window: &PeriodSpec) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v8", "finance", "chart", symbol]);
        }
        {
            let mut query = url.query_pairs_mut();
            match window {
                PeriodSpec::Token(token) => {
                    query.append_pair("range", token.as_provider_str());
                }
                PeriodSpec::Range { start, end } => {
                    let start_ts = start.and_hms_opt(0, 0, 0).map(|t| t.and_utc().timestamp());
                    let end_ts = end.and_hms_opt(23, 59, 59).map(|t| t.and_utc().timestamp());
                    if let (Some(start_ts), Some(end_ts)) = (start_ts, end_ts) {
                        query
                            .append_pair("period1", &start_ts.to_string())
                            .append_pair("period2", &end_ts.to_string());
                    }
                }
            }
            query
                .append_pair("interval", "1d")
                .append_pair("includeAdjustedClose", "true");
        }
        url
    }

    /// Execute a single symbol request with retry and circuit breaker logic.
    ///
    /// Gives up once `deadline` passes, whatever attempt it is on.
    fn fetch_with_retry(
        &self,
        symbol: &str,
        window: &PeriodSpec,
        deadline: Instant,
    ) -> Result<Vec<RawBar>, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = self.chart_url(symbol, window);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.base_delay, attempt);
                if delay >= deadline.saturating_duration_since(Instant::now()) {
                    debug!(symbol, attempt, "no time left for another attempt");
                    break;
                }
                debug!(symbol, attempt, ?delay, "retrying chart request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.deadline_exceeded());
            }

            let resp = match self.client.get(url.clone()).timeout(remaining).send() {
                Ok(resp) => resp,
                Err(e) if e.is_timeout() => {
                    self.circuit_breaker.record_failure();
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
                Err(e) if e.is_connect() => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(DataError::AuthenticationRequired(
                    "Yahoo Finance requires authentication".into(),
                ));
            }

            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let chart: ChartResponse = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
            })?;

            let bars = parse_response(symbol, chart)?;
            self.circuit_breaker.record_success();
            return Ok(bars);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }

    fn deadline_exceeded(&self) -> DataError {
        DataError::NetworkUnreachable(format!(
            "request deadline of {}s exceeded",
            self.timeout.as_secs()
        ))
    }
}

/// Exponential backoff: `base * 2^(attempt - 1)`, saturating.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor)
}

/// Parse the chart API response into bars, skipping rows with no data at all.
fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<RawBar>, DataError> {
    let result = match (resp.chart.result, resp.chart.error) {
        (Some(result), _) => result,
        (None, Some(err)) if err.code == "Not Found" => {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })
        }
        (None, Some(err)) => {
            return Err(DataError::ResponseFormatChanged(format!(
                "{}: {}",
                err.code,
                err.description.unwrap_or_default()
            )))
        }
        (None, None) => {
            return Err(DataError::ResponseFormatChanged(
                "empty result with no error".into(),
            ))
        }
    };

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

    // A window without trading days comes back without timestamps.
    let Some(timestamps) = data.timestamp else {
        return Ok(Vec::new());
    };

    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose)
        .unwrap_or_default();
    let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = exchange_date(ts, offset)
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;

        let pick = |v: &[Option<f64>]| v.get(i).copied().flatten();
        let bar = RawBar {
            date,
            open: pick(quote.open.as_slice()),
            high: pick(quote.high.as_slice()),
            low: pick(quote.low.as_slice()),
            close: pick(quote.close.as_slice()),
            adj_close: pick(adj_closes.as_slice()),
            volume: quote.volume.get(i).copied().flatten(),
        };

        // Holidays / non-trading days come through as all-null rows
        if bar.open.is_none()
            && bar.high.is_none()
            && bar.low.is_none()
            && bar.close.is_none()
            && bar.volume.is_none()
        {
            continue;
        }
        bars.push(bar);
    }

    Ok(bars)
}

/// Trading date in the exchange's local time.
fn exchange_date(ts: i64, gmtoffset: i64) -> Option<NaiveDate> {
    chrono::DateTime::from_timestamp(ts.checked_add(gmtoffset)?, 0).map(|dt| dt.naive_utc().date())
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_batch(&self, symbols: &[String], window: &PeriodSpec) -> Result<BatchResponse, DataError> {
        let mut batch = BatchResponse::default();
        let deadline = Instant::now() + self.timeout;

        for symbol in symbols {
            if batch.series.contains_key(symbol) || batch.unrecognized.contains(symbol) {
                continue;
            }
            match self.fetch_with_retry(symbol, window, deadline) {
                Ok(bars) if bars.is_empty() => {
                    debug!(symbol = %symbol, %window, "no bars in window");
                    batch.unrecognized.push(symbol.clone());
                }
                Ok(bars) => {
                    debug!(symbol = %symbol, bars = bars.len(), "fetched");
                    batch.series.insert(symbol.clone(), bars);
                }
                Err(DataError::SymbolNotFound { .. }) => {
                    debug!(symbol = %symbol, "symbol not recognized by provider");
                    batch.unrecognized.push(symbol.clone());
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "batch aborted");
                    return Err(e);
                }
            }
        }

        info!(
            provider = self.name(),
            %window,
            fetched = batch.series.len(),
            unrecognized = batch.unrecognized.len(),
            "batch complete"
        );
        Ok(batch)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::period::PeriodToken;

    fn parse(json: &str) -> Result<Vec<RawBar>, DataError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        parse_response("SPY", resp)
    }

    fn provider() -> YahooProvider {
        let config = MarketConfig {
            base_url: "https://query2.finance.yahoo.com".into(),
            ..MarketConfig::default()
        };
        YahooProvider::new(&config, Arc::new(CircuitBreaker::default_provider())).unwrap()
    }

    #[test]
    fn parses_bars_and_skips_empty_rows() {
        let bars = parse(
            r#"{"chart":{"result":[{
                "meta":{"gmtoffset":-18000},
                "timestamp":[1704205800,1704292200,1704378600],
                "indicators":{
                    "quote":[{"open":[470.0,null,468.0],"high":[472.0,null,470.0],
                              "low":[469.0,null,467.0],"close":[471.0,null,469.5],
                              "volume":[1000,null,1200]}],
                    "adjclose":[{"adjclose":[470.5,null,469.0]}]}
            }],"error":null}}"#,
        )
        .unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].close, Some(471.0));
        assert_eq!(bars[1].adj_close, Some(469.0));
        assert_eq!(bars[1].date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
    }

    #[test]
    fn not_found_error_maps_to_symbol_not_found() {
        let err = parse(
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound { .. }));
    }

    #[test]
    fn missing_timestamps_mean_no_bars() {
        let bars = parse(
            r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{}]}}],"error":null}}"#,
        )
        .unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn other_errors_are_format_changes() {
        let err = parse(r#"{"chart":{"result":null,"error":null}}"#).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn chart_url_for_token_and_range() {
        let p = provider();

        let url = p.chart_url("SPY", &PeriodToken::OneMonth.into());
        assert_eq!(url.path(), "/v8/finance/chart/SPY");
        assert!(url.query().unwrap().contains("range=1mo"));
        assert!(url.query().unwrap().contains("interval=1d"));

        let range = PeriodSpec::Range {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        };
        let url = p.chart_url("GC=F", &range);
        let query = url.query().unwrap();
        assert!(query.contains("period1=1704067200"));
        assert!(query.contains("period2=1706745599"));
        assert!(!query.contains("range="));
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, 40), base.saturating_mul(u32::MAX));
        assert_eq!(backoff_delay(Duration::from_secs(u64::MAX), 2), Duration::MAX);
    }

    #[test]
    fn rejects_invalid_base_url() {
        let config = MarketConfig {
            base_url: "not a url".into(),
            ..MarketConfig::default()
        };
        let result = YahooProvider::new(&config, Arc::new(CircuitBreaker::default_provider()));
        assert!(matches!(result, Err(DataError::ClientSetup(_))));
    }
}
