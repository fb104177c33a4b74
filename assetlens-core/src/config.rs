//! Application configuration.
//!
//! Loaded from an optional TOML file, then overlaid with `ASSETLENS_*`
//! environment variables. Every field has a default, so an empty file (or no
//! file at all) is a valid configuration. The ECOS API key is never read from
//! the file; it comes from `ECOS_API_KEY` only.

use crate::data::provider::PriceBasis;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_CACHE_TTL_SECS: &str = "ASSETLENS_CACHE_TTL_SECS";
pub const ENV_MARKET_BASE_URL: &str = "ASSETLENS_MARKET_BASE_URL";
pub const ENV_STATS_BASE_URL: &str = "ASSETLENS_STATS_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "ASSETLENS_REQUEST_TIMEOUT_SECS";
pub const ENV_MIN_OVERLAP: &str = "ASSETLENS_MIN_OVERLAP";
pub const ENV_ECOS_API_KEY: &str = "ECOS_API_KEY";

const MAX_TIMEOUT_SECS: u64 = 600;
const MAX_RETRIES: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub market: MarketConfig,
    pub statistics: StatisticsConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a cached price table.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Market-data provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub price_basis: PriceBasis,
    pub user_agent: String,
    pub breaker_cooldown_secs: u64,
    pub breaker_failure_threshold: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query2.finance.yahoo.com".to_string(),
            timeout_secs: 20,
            max_retries: 3,
            retry_base_delay_ms: 500,
            price_basis: PriceBasis::Close,
            user_agent: "Mozilla/5.0 (compatible; assetlens/0.1)".to_string(),
            breaker_cooldown_secs: 30 * 60,
            breaker_failure_threshold: 3,
        }
    }
}

impl MarketConfig {
    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_secs)
    }
}

/// ECOS statistics endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub lang: String,
    pub max_rows: u32,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ecos.bok.or.kr/api/StatisticSearch".to_string(),
            timeout_secs: 20,
            lang: "kr".to_string(),
            max_rows: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Minimum shared observations for a correlation coefficient.
    pub min_overlap: usize,
    /// Report volatility in percent rather than as a fraction.
    pub volatility_as_percent: bool,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            min_overlap: 10,
            volatility_as_percent: true,
        }
    }
}

impl AppConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// File (if given) plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `ASSETLENS_*` variables. Unset, empty or unparseable values
    /// leave the current setting untouched.
    pub fn with_env_overrides(mut self) -> Self {
        self.cache.ttl_secs = env_u64(ENV_CACHE_TTL_SECS, self.cache.ttl_secs);
        self.market.base_url = env_str(ENV_MARKET_BASE_URL, &self.market.base_url);
        self.statistics.base_url = env_str(ENV_STATS_BASE_URL, &self.statistics.base_url);
        if let Some(timeout) = env_parse::<u64>(ENV_REQUEST_TIMEOUT_SECS) {
            self.market.timeout_secs = timeout;
            self.statistics.timeout_secs = timeout;
        }
        self.analytics.min_overlap = env_parse(ENV_MIN_OVERLAP).unwrap_or(self.analytics.min_overlap);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.market.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "market.base_url",
                reason: "must not be empty".into(),
            });
        }
        if self.statistics.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "statistics.base_url",
                reason: "must not be empty".into(),
            });
        }
        if self.market.timeout_secs == 0 || self.statistics.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout_secs",
                reason: "must be at least 1 second".into(),
            });
        }
        if self.market.timeout_secs > MAX_TIMEOUT_SECS || self.statistics.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ConfigError::Invalid {
                field: "timeout_secs",
                reason: format!("must be at most {MAX_TIMEOUT_SECS} seconds"),
            });
        }
        if self.market.max_retries > MAX_RETRIES {
            return Err(ConfigError::Invalid {
                field: "market.max_retries",
                reason: format!("must be at most {MAX_RETRIES}"),
            });
        }
        if self.statistics.max_rows == 0 {
            return Err(ConfigError::Invalid {
                field: "statistics.max_rows",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Secret API key. `Debug` and `Display` never show the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read `ECOS_API_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        env::var(ENV_ECOS_API_KEY)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(Self)
            .ok_or(ConfigError::MissingEnv(ENV_ECOS_API_KEY))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env_parse(name).unwrap_or(default)
}
