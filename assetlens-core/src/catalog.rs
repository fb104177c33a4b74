//! Asset catalog: display names mapped to provider tickers.
//!
//! Stored as TOML, one table per asset:
//!
//! ```toml
//! [assets."S&P 500"]
//! ticker = "^GSPC"
//! color = "#243A5E"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid catalog TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("asset '{name}' has an empty ticker")]
    EmptyTicker { name: String },

    #[error("ticker {ticker} is listed under both '{first}' and '{second}'")]
    DuplicateTicker {
        ticker: String,
        first: String,
        second: String,
    },

    #[error("unknown asset '{0}'")]
    UnknownAsset(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub ticker: String,
    /// Hex color used when plotting this asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCatalog {
    assets: BTreeMap<String, AssetEntry>,
}

impl AssetCatalog {
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        let catalog: Self = toml::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Tickers must be non-empty and unique so labels map back one-to-one.
    fn validate(&self) -> Result<(), CatalogError> {
        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        for (name, entry) in &self.assets {
            let ticker = entry.ticker.trim();
            if ticker.is_empty() {
                return Err(CatalogError::EmptyTicker { name: name.clone() });
            }
            if let Some(first) = seen.insert(ticker, name) {
                return Err(CatalogError::DuplicateTicker {
                    ticker: ticker.to_string(),
                    first: first.to_string(),
                    second: name.clone(),
                });
            }
        }
        Ok(())
    }

    /// The dashboard's built-in asset list.
    pub fn default_dashboard() -> Self {
        let entries = [
            ("S&P 500", "^GSPC", Some("#243A5E")),
            ("Gold", "GC=F", Some("#7A8F3B")),
            ("Gold ETF", "GLD", Some("#8B3A3A")),
            ("US Bond", "TLT", Some("#6B5B95")),
            ("Bitcoin", "BTC-USD", Some("#B07A3B")),
            ("QQQ", "QQQ", Some("#2F7F7F")),
            ("USD Index", "DX-Y.NYB", None),
        ];
        let assets = entries
            .into_iter()
            .map(|(name, ticker, color)| {
                (
                    name.to_string(),
                    AssetEntry {
                        ticker: ticker.to_string(),
                        color: color.map(String::from),
                    },
                )
            })
            .collect();
        Self { assets }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &AssetEntry)> {
        self.assets.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&AssetEntry> {
        self.assets.get(name)
    }

    pub fn ticker_for(&self, name: &str) -> Option<&str> {
        self.assets.get(name).map(|entry| entry.ticker.trim())
    }

    /// Reverse lookup for labelling result columns.
    pub fn name_for(&self, ticker: &str) -> Option<&str> {
        self.assets
            .iter()
            .find(|(_, entry)| entry.ticker.trim() == ticker)
            .map(|(name, _)| name.as_str())
    }

    pub fn color_for(&self, name: &str) -> Option<&str> {
        self.assets.get(name).and_then(|entry| entry.color.as_deref())
    }

    /// Resolve display names to tickers, failing on the first unknown name.
    pub fn tickers_for<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<String>, CatalogError> {
        names
            .iter()
            .map(|name| {
                self.ticker_for(name.as_ref())
                    .map(String::from)
                    .ok_or_else(|| CatalogError::UnknownAsset(name.as_ref().to_string()))
            })
            .collect()
    }

    /// Ticker → display name for every asset.
    pub fn label_map(&self) -> BTreeMap<String, String> {
        self.assets
            .iter()
            .map(|(name, entry)| (entry.ticker.trim().to_string(), name.clone()))
            .collect()
    }
}

impl Default for AssetCatalog {
    fn default() -> Self {
        Self::default_dashboard()
    }
}
