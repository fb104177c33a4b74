//! Integration tests for price loading through in-memory providers.

use assetlens_core::analytics::{
    correlation_matrix, daily_returns, period_returns, volatility, Coefficient,
};
use assetlens_core::data::{
    BatchResponse, DataError, MarketDataProvider, PeriodSpec, PeriodToken, PriceBasis, RawBar,
};
use assetlens_core::{EmptyReason, LoadOutcome, Notifier, PricePipeline};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Fakes ────────────────────────────────────────────────────────────

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
}

/// Serves fixed bars per symbol and counts calls.
struct FakeProvider {
    bars: BTreeMap<String, Vec<RawBar>>,
    calls: Arc<AtomicUsize>,
}

impl FakeProvider {
    fn new(series: &[(&str, &[(u32, f64)])]) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let bars = series
            .iter()
            .map(|(symbol, points)| {
                let bars = points
                    .iter()
                    .map(|&(day, close)| RawBar::close_only(d(day), close))
                    .collect();
                (symbol.to_string(), bars)
            })
            .collect();
        (
            Self {
                bars,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl MarketDataProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn fetch_batch(&self, symbols: &[String], _window: &PeriodSpec) -> Result<BatchResponse, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut response = BatchResponse::default();
        for symbol in symbols {
            match self.bars.get(symbol) {
                Some(bars) => {
                    response.series.insert(symbol.clone(), bars.clone());
                }
                None => response.unrecognized.push(symbol.clone()),
            }
        }
        Ok(response)
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Fails every call.
struct DownProvider {
    calls: Arc<AtomicUsize>,
}

impl MarketDataProvider for DownProvider {
    fn name(&self) -> &str {
        "down"
    }

    fn fetch_batch(&self, _symbols: &[String], _window: &PeriodSpec) -> Result<BatchResponse, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DataError::NetworkUnreachable("connection refused".into()))
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Reports itself unavailable; any fetch is a test failure.
struct BlockedProvider;

impl MarketDataProvider for BlockedProvider {
    fn name(&self) -> &str {
        "blocked"
    }

    fn fetch_batch(&self, _symbols: &[String], _window: &PeriodSpec) -> Result<BatchResponse, DataError> {
        panic!("fetch_batch called on an unavailable provider");
    }

    fn is_available(&self) -> bool {
        false
    }
}

#[derive(Default, Clone)]
struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl Notifier for RecordingNotifier {
    fn warn(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

fn window() -> PeriodSpec {
    PeriodToken::OneMonth.into()
}

fn loaded(outcome: LoadOutcome) -> assetlens_core::PriceTable {
    match outcome {
        LoadOutcome::Loaded(table) => table,
        LoadOutcome::Empty(reason) => panic!("expected a table, got {reason:?}"),
    }
}

// ── Loading ──────────────────────────────────────────────────────────

#[test]
fn empty_symbol_set_never_reaches_provider() {
    let (provider, calls) = FakeProvider::new(&[("SPY", &[(1, 500.0)])]);
    let mut pipeline = PricePipeline::new(Box::new(provider), Duration::from_secs(60));

    let none: [&str; 0] = [];
    assert_eq!(
        pipeline.load_prices(&none, &window()),
        LoadOutcome::Empty(EmptyReason::NoSymbols)
    );
    assert_eq!(pipeline.load_prices(&["  "], &window()).empty_reason(), Some(&EmptyReason::NoSymbols));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn provider_failure_is_one_warning_and_empty() {
    let calls = Arc::new(AtomicUsize::new(0));
    let notifier = RecordingNotifier::default();
    let mut pipeline = PricePipeline::new(
        Box::new(DownProvider {
            calls: Arc::clone(&calls),
        }),
        Duration::from_secs(60),
    )
    .with_notifier(Box::new(notifier.clone()));

    let outcome = pipeline.load_prices(&["SPY", "QQQ"], &window());

    assert!(matches!(outcome, LoadOutcome::Empty(EmptyReason::ProviderFailed(_))));
    assert!(outcome.table().is_empty());
    assert_eq!(notifier.messages.lock().unwrap().len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Downstream statistics accept the empty result.
    let returns = daily_returns(&outcome.table());
    assert!(returns.is_empty());
    assert!(period_returns(&outcome.table()).is_empty());
    assert!(correlation_matrix(&returns, 10).is_empty());
    assert!(volatility(&returns, true).is_empty());
}

#[test]
fn failures_are_not_cached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let notifier = RecordingNotifier::default();
    let mut pipeline = PricePipeline::new(
        Box::new(DownProvider {
            calls: Arc::clone(&calls),
        }),
        Duration::from_secs(60),
    )
    .with_notifier(Box::new(notifier.clone()));

    pipeline.load_prices(&["SPY"], &window());
    pipeline.load_prices(&["SPY"], &window());

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(notifier.messages.lock().unwrap().len(), 2);
}

#[test]
fn unavailable_provider_is_skipped_with_one_warning() {
    let notifier = RecordingNotifier::default();
    let mut pipeline = PricePipeline::new(Box::new(BlockedProvider), Duration::from_secs(60))
        .with_notifier(Box::new(notifier.clone()));

    let outcome = pipeline.load_prices(&["SPY"], &window());

    assert!(matches!(outcome, LoadOutcome::Empty(EmptyReason::ProviderFailed(_))));
    let messages = notifier.messages.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("blocked"));
}

#[test]
fn aligns_and_excludes_unrecognized_symbols() {
    let (provider, _) = FakeProvider::new(&[
        ("SPY", &[(1, 100.0), (2, 101.0), (4, 103.0)]),
        ("BTC-USD", &[(1, 60000.0), (2, 61000.0), (3, 62000.0), (4, 63000.0)]),
    ]);
    let mut pipeline = PricePipeline::new(Box::new(provider), Duration::from_secs(60));

    let table = loaded(pipeline.load_prices(&["SPY", "BTC-USD", "NOPE"], &window()));

    assert_eq!(table.symbols(), ["BTC-USD".to_string(), "SPY".to_string()]);
    assert_eq!(table.dates(), [d(1), d(2), d(3), d(4)]);
    assert!(table.dates().windows(2).all(|w| w[0] < w[1]));
    // Weekend gap on SPY is carried forward.
    assert_eq!(table.value(2, "SPY"), Some(101.0));
}

#[test]
fn only_unrecognized_symbols_is_no_data() {
    let (provider, _) = FakeProvider::new(&[("SPY", &[(1, 100.0)])]);
    let notifier = RecordingNotifier::default();
    let mut pipeline = PricePipeline::new(Box::new(provider), Duration::from_secs(60))
        .with_notifier(Box::new(notifier.clone()));

    assert_eq!(
        pipeline.load_prices(&["XXXX"], &window()),
        LoadOutcome::Empty(EmptyReason::NoData)
    );
    assert!(notifier.messages.lock().unwrap().is_empty());
}

// ── Cache ────────────────────────────────────────────────────────────

#[test]
fn repeat_requests_within_ttl_hit_cache() {
    let (provider, calls) = FakeProvider::new(&[("SPY", &[(1, 100.0), (2, 101.0)]), ("QQQ", &[(1, 400.0), (2, 404.0)])]);
    let mut pipeline = PricePipeline::new(Box::new(provider), Duration::from_secs(60));

    let first = pipeline.load_prices(&["SPY", "QQQ"], &window());
    let second = pipeline.load_prices(&["QQQ", "SPY", "QQQ"], &window());

    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A different window is a different entry.
    pipeline.load_prices(&["SPY", "QQQ"], &PeriodToken::OneYear.into());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn expired_entries_are_refetched() {
    let (provider, calls) = FakeProvider::new(&[("SPY", &[(1, 100.0), (2, 101.0)])]);
    let mut pipeline = PricePipeline::new(Box::new(provider), Duration::from_millis(10));

    pipeline.load_prices(&["SPY"], &window());
    std::thread::sleep(Duration::from_millis(20));
    pipeline.load_prices(&["SPY"], &window());

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn adjusted_close_basis_flows_through() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut bar = RawBar::close_only(d(1), 100.0);
    bar.adj_close = Some(95.0);
    let provider = FakeProvider {
        bars: BTreeMap::from([("TLT".to_string(), vec![bar, RawBar::close_only(d(2), 99.0)])]),
        calls,
    };
    let mut pipeline = PricePipeline::new(Box::new(provider), Duration::from_secs(60))
        .with_price_basis(PriceBasis::AdjustedClose);

    let table = loaded(pipeline.load_prices(&["TLT"], &window()));
    // Second bar has no adjusted value and falls back to close.
    assert_eq!(table.column("TLT"), Some(&[Some(95.0), Some(99.0)][..]));
}

// ── End to end ───────────────────────────────────────────────────────

#[test]
fn two_symbol_scenario() {
    let (provider, _) = FakeProvider::new(&[
        ("A", &[(1, 100.0), (2, 110.0), (3, 121.0)]),
        ("B", &[(1, 50.0), (2, 45.0), (3, 40.5)]),
    ]);
    let mut pipeline = PricePipeline::new(Box::new(provider), Duration::from_secs(60));
    let table = loaded(pipeline.load_prices(&["A", "B"], &window()));

    let returns = daily_returns(&table);
    let a = returns.column("A").unwrap();
    assert_eq!(returns.len(), 2);
    assert!((a[0].unwrap() - 0.10).abs() < 1e-12);
    assert!((a[1].unwrap() - 0.10).abs() < 1e-12);

    let period = period_returns(&table);
    assert!((period["A"].unwrap() - 21.0).abs() < 1e-9);
    assert!((period["B"].unwrap() + 19.0).abs() < 1e-9);

    // Both return columns are constant over the window.
    assert!(matches!(
        correlation_matrix(&returns, 2).get("A", "B"),
        Some(Coefficient::ZeroVariance { observations: 2 })
    ));
}

#[test]
fn staggered_listing_correlates_on_overlap() {
    // LATE starts trading on day 5, leaving three shared return rows.
    let (provider, _) = FakeProvider::new(&[
        ("EARLY", &[(1, 10.0), (2, 11.0), (3, 10.5), (4, 11.5), (5, 12.0), (6, 11.0), (7, 12.5), (8, 12.0)]),
        ("LATE", &[(5, 20.0), (6, 18.0), (7, 21.0), (8, 20.5)]),
    ]);
    let mut pipeline = PricePipeline::new(Box::new(provider), Duration::from_secs(60));
    let returns = daily_returns(&loaded(pipeline.load_prices(&["EARLY", "LATE"], &window())));

    let lenient = correlation_matrix(&returns, 3);
    let coefficient = lenient.get("EARLY", "LATE").unwrap();
    assert_eq!(coefficient.observations(), 3);
    assert!(coefficient.value().unwrap() > 0.9);

    assert_eq!(
        correlation_matrix(&returns, 4).get("EARLY", "LATE"),
        Some(Coefficient::InsufficientOverlap { observations: 3 })
    );
}
