//! AssetLens Core: price loading, return and risk statistics, macro indicators.
//!
//! - `data`: market-data provider trait, Yahoo chart client, ECOS statistics
//!   client, period windows, TTL cache, circuit breaker
//! - `pipeline`: batched, cached price loading that degrades to empty
//! - `table`: aligned date × symbol price and return tables
//! - `analytics`: daily and period returns, correlation, volatility, snapshots
//! - `catalog`: asset display names and tickers
//! - `config`: TOML configuration with environment overrides

pub mod analytics;
pub mod catalog;
pub mod config;
pub mod data;
pub mod pipeline;
pub mod table;

pub use catalog::AssetCatalog;
pub use config::AppConfig;
pub use pipeline::{EmptyReason, LoadOutcome, Notifier, PricePipeline, TracingNotifier};
pub use table::{PriceTable, ReturnSeries};
