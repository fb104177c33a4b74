//! Price loading: provider fetch, alignment, and the read-through cache.
//!
//! `load_prices` never returns an error. A provider failure is reported once
//! through the [`Notifier`] and comes back as an empty outcome, so callers can
//! feed the result straight into the analytics functions.

use crate::config::AppConfig;
use crate::data::{
    BatchResponse, CircuitBreaker, DataError, MarketDataProvider, PeriodSpec, PriceBasis,
    RequestKey, TtlCache, YahooProvider,
};
use crate::table::PriceTable;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sink for user-facing warnings.
pub trait Notifier: Send + Sync {
    fn warn(&self, message: &str);
}

/// Routes warnings into the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn warn(&self, message: &str) {
        warn!("{message}");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmptyReason {
    /// The request named no symbols.
    NoSymbols,
    /// The provider call failed; carries the error text.
    ProviderFailed(String),
    /// The provider answered but had no usable prices for any symbol.
    NoData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(PriceTable),
    Empty(EmptyReason),
}

impl LoadOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, LoadOutcome::Empty(_))
    }

    /// The loaded table, or an empty one.
    pub fn table(&self) -> PriceTable {
        match self {
            LoadOutcome::Loaded(table) => table.clone(),
            LoadOutcome::Empty(_) => PriceTable::empty(),
        }
    }

    pub fn into_table(self) -> PriceTable {
        match self {
            LoadOutcome::Loaded(table) => table,
            LoadOutcome::Empty(_) => PriceTable::empty(),
        }
    }

    pub fn empty_reason(&self) -> Option<&EmptyReason> {
        match self {
            LoadOutcome::Loaded(_) => None,
            LoadOutcome::Empty(reason) => Some(reason),
        }
    }
}

pub struct PricePipeline {
    provider: Box<dyn MarketDataProvider>,
    cache: TtlCache<RequestKey, PriceTable>,
    price_basis: PriceBasis,
    notifier: Box<dyn Notifier>,
}

impl PricePipeline {
    pub fn new(provider: Box<dyn MarketDataProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            cache: TtlCache::new(ttl),
            price_basis: PriceBasis::default(),
            notifier: Box::new(TracingNotifier),
        }
    }

    /// Yahoo-backed pipeline wired from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, DataError> {
        let breaker = Arc::new(CircuitBreaker::new(
            config.market.breaker_cooldown(),
            config.market.breaker_failure_threshold,
        ));
        let provider = YahooProvider::new(&config.market, breaker)?;
        Ok(Self::new(Box::new(provider), config.cache.ttl()).with_price_basis(config.market.price_basis))
    }

    pub fn with_price_basis(mut self, basis: PriceBasis) -> Self {
        self.price_basis = basis;
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Aligned price table for `symbols` over `window`.
    ///
    /// Columns are the requested symbols the provider recognized, in
    /// alphabetical order; rows are ascending dates. Repeat requests for the
    /// same symbol set and window are served from the cache until the TTL
    /// runs out. Failed or empty loads are not cached. A provider that reports
    /// itself unavailable is not called at all; that counts as a failure.
    pub fn load_prices<S: AsRef<str>>(&mut self, symbols: &[S], window: &PeriodSpec) -> LoadOutcome {
        let key = RequestKey::new(symbols, *window);
        if key.symbols().is_empty() {
            debug!("no symbols requested");
            return LoadOutcome::Empty(EmptyReason::NoSymbols);
        }

        let request = key.fingerprint();
        let provider = &self.provider;
        let notifier = &self.notifier;
        let basis = self.price_basis;
        let mut fetched = false;

        let result = self.cache.get_or_try_insert_with(key.clone(), || {
            fetched = true;
            debug!(%request, symbols = ?key.symbols(), window = %key.window(), "cache miss");

            let response = if provider.is_available() {
                provider.fetch_batch(key.symbols(), key.window())
            } else {
                Err(DataError::CircuitBreakerTripped)
            };
            let response = response.map_err(|e| {
                notifier.warn(&format!(
                    "Could not load prices from {}: {e}. Showing no data.",
                    provider.name()
                ));
                EmptyReason::ProviderFailed(e.to_string())
            })?;

            if !response.unrecognized.is_empty() {
                debug!(%request, symbols = ?response.unrecognized, "excluding unrecognized symbols");
            }

            let table = align_response(&response, key.symbols(), basis);
            if table.is_empty() {
                debug!(%request, "provider returned no usable prices");
                return Err(EmptyReason::NoData);
            }
            info!(
                %request,
                symbols = table.symbols().len(),
                rows = table.len(),
                "loaded price table"
            );
            Ok(table)
        });

        if !fetched {
            debug!(%request, "cache hit");
        }
        match result {
            Ok(table) => LoadOutcome::Loaded(table),
            Err(reason) => LoadOutcome::Empty(reason),
        }
    }
}

/// Turn a provider response into an aligned table, keeping only requested symbols.
fn align_response(response: &BatchResponse, requested: &[String], basis: PriceBasis) -> PriceTable {
    let observations: BTreeMap<String, Vec<_>> = response
        .series
        .iter()
        .filter(|(symbol, _)| requested.contains(symbol))
        .map(|(symbol, bars)| {
            let points = bars
                .iter()
                .filter_map(|bar| bar.price(basis).map(|price| (bar.date, price)))
                .collect();
            (symbol.clone(), points)
        })
        .collect();
    PriceTable::from_observations(observations)
}
