//! Market and macro data acquisition: providers, request windows, caching.

pub mod cache;
pub mod circuit_breaker;
pub mod ecos;
pub mod period;
pub mod provider;
pub mod yahoo;

pub use cache::{RequestKey, TtlCache};
pub use circuit_breaker::CircuitBreaker;
pub use ecos::{default_indicators, Cadence, EcosClient, IndicatorSpec, KpiValue};
pub use period::{PeriodSpec, PeriodToken, UnknownPeriod};
pub use provider::{BatchResponse, DataError, MarketDataProvider, PriceBasis, RawBar};
pub use yahoo::YahooProvider;
