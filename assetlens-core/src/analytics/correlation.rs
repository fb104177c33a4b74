//! Pairwise correlation of return columns.
//!
//! Each pair uses only the rows where both columns have a value
//! (pairwise-complete), so two symbols with staggered histories still get a
//! coefficient from whatever overlap they share. Cells that cannot be
//! computed carry a reason instead of NaN.

use super::volatility::{mean, sample_std};
use crate::catalog::AssetCatalog;
use crate::table::ReturnSeries;
use serde::{Deserialize, Serialize};

/// Below this standard deviation a column counts as constant.
///
/// Constant return columns built from float prices carry rounding noise
/// around 1e-17; real daily returns sit around 1e-2.
const ZERO_STD: f64 = 1e-12;

/// One cell of a correlation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Coefficient {
    Value { value: f64, observations: usize },
    /// Fewer shared rows than the configured minimum.
    InsufficientOverlap { observations: usize },
    /// At least one side is constant over the shared rows.
    ZeroVariance { observations: usize },
}

impl Coefficient {
    pub fn value(&self) -> Option<f64> {
        match self {
            Coefficient::Value { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn observations(&self) -> usize {
        match *self {
            Coefficient::Value { observations, .. }
            | Coefficient::InsufficientOverlap { observations }
            | Coefficient::ZeroVariance { observations } => observations,
        }
    }
}

/// Symmetric N×N matrix of coefficients, rows/columns in `symbols` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    symbols: Vec<String>,
    cells: Vec<Vec<Coefficient>>,
}

impl CorrelationMatrix {
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn index_of(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    pub fn get(&self, a: &str, b: &str) -> Option<Coefficient> {
        let i = self.index_of(a)?;
        let j = self.index_of(b)?;
        Some(self.cells[i][j])
    }

    /// Coefficient value for a pair, `None` if unknown or not computable.
    pub fn value(&self, a: &str, b: &str) -> Option<f64> {
        self.get(a, b).and_then(|c| c.value())
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &[Coefficient])> {
        self.symbols
            .iter()
            .map(String::as_str)
            .zip(self.cells.iter().map(Vec::as_slice))
    }

    /// Sub-matrix with `rows` on one axis and `cols` on the other.
    ///
    /// Symbols missing from the matrix are skipped. Each axis is ordered by
    /// mean absolute coefficient, strongest first; an axis entry with no
    /// computable coefficient sorts last.
    pub fn cross_block(&self, rows: &[String], cols: &[String]) -> CrossBlock {
        let row_idx: Vec<usize> = dedup(rows).filter_map(|s| self.index_of(s)).collect();
        let col_idx: Vec<usize> = dedup(cols).filter_map(|s| self.index_of(s)).collect();

        let strength = |values: Vec<Option<f64>>| -> Option<f64> {
            let abs: Vec<f64> = values.into_iter().flatten().map(f64::abs).collect();
            mean(&abs)
        };
        let ordered = |axis: &[usize], other: &[usize], row_major: bool| -> Vec<usize> {
            let mut scored: Vec<(usize, Option<f64>)> = axis
                .iter()
                .map(|&i| {
                    let values = other
                        .iter()
                        .map(|&j| {
                            let cell = if row_major { self.cells[i][j] } else { self.cells[j][i] };
                            cell.value()
                        })
                        .collect();
                    (i, strength(values))
                })
                .collect();
            scored.sort_by(|a, b| match (a.1, b.1) {
                (Some(x), Some(y)) => y.total_cmp(&x),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
            scored.into_iter().map(|(i, _)| i).collect()
        };

        let row_order = ordered(&row_idx, &col_idx, true);
        let col_order = ordered(&col_idx, &row_idx, false);

        CrossBlock {
            rows: row_order.iter().map(|&i| self.symbols[i].clone()).collect(),
            cols: col_order.iter().map(|&j| self.symbols[j].clone()).collect(),
            cells: row_order
                .iter()
                .map(|&i| col_order.iter().map(|&j| self.cells[i][j]).collect())
                .collect(),
        }
    }
}

fn dedup(symbols: &[String]) -> impl Iterator<Item = &str> {
    let mut seen = std::collections::HashSet::new();
    symbols
        .iter()
        .map(String::as_str)
        .filter(move |s| seen.insert(*s))
}

/// Rows-by-columns slice of a correlation matrix (e.g. risk vs safe assets).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossBlock {
    pub rows: Vec<String>,
    pub cols: Vec<String>,
    pub cells: Vec<Vec<Coefficient>>,
}

/// Pearson correlation matrix over pairwise-complete rows.
///
/// `min_overlap` is the smallest number of shared rows a pair needs; values
/// below 2 are raised to 2. The floor applies to off-diagonal pairs only:
/// the diagonal is exactly `1.0` for every column with nonzero variance.
pub fn correlation_matrix(returns: &ReturnSeries, min_overlap: usize) -> CorrelationMatrix {
    let min_overlap = min_overlap.max(2);
    let symbols: Vec<String> = returns.symbols().to_vec();
    let columns: Vec<&[Option<f64>]> = returns.columns().map(|(_, c)| c).collect();
    let n = symbols.len();

    let placeholder = Coefficient::InsufficientOverlap { observations: 0 };
    let mut cells = vec![vec![placeholder; n]; n];

    for i in 0..n {
        for j in i..n {
            let (xs, ys): (Vec<f64>, Vec<f64>) = columns[i]
                .iter()
                .zip(columns[j].iter())
                .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
                .unzip();
            let observations = xs.len();
            let floor = if i == j { 2 } else { min_overlap };

            let cell = if observations < floor {
                Coefficient::InsufficientOverlap { observations }
            } else {
                match pearson(&xs, &ys) {
                    Some(value) => Coefficient::Value {
                        value: if i == j { 1.0 } else { value },
                        observations,
                    },
                    None => Coefficient::ZeroVariance { observations },
                }
            };
            cells[i][j] = cell;
            cells[j][i] = cell;
        }
    }

    CorrelationMatrix { symbols, cells }
}

/// Pearson coefficient of two equal-length samples, clamped to [-1, 1].
///
/// `None` when either sample is (numerically) constant or too short.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let sx = sample_std(xs)?;
    let sy = sample_std(ys)?;
    if sx < ZERO_STD || sy < ZERO_STD {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let cov: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mx) * (y - my))
        .sum::<f64>()
        / (xs.len() - 1) as f64;
    Some((cov / (sx * sy)).clamp(-1.0, 1.0))
}

/// Qualitative reading of a coefficient for dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationBand {
    StrongNegative,
    WeakNegative,
    Uncorrelated,
    WeakPositive,
    StrongPositive,
}

impl CorrelationBand {
    pub fn classify(value: f64) -> Self {
        if value <= -0.3 {
            CorrelationBand::StrongNegative
        } else if value <= -0.1 {
            CorrelationBand::WeakNegative
        } else if value < 0.1 {
            CorrelationBand::Uncorrelated
        } else if value < 0.3 {
            CorrelationBand::WeakPositive
        } else {
            CorrelationBand::StrongPositive
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            CorrelationBand::StrongNegative => "strong negative: good diversification / hedge",
            CorrelationBand::WeakNegative => "weak negative: limited diversification",
            CorrelationBand::Uncorrelated => "near zero: independent movement",
            CorrelationBand::WeakPositive => "weak positive: some co-movement",
            CorrelationBand::StrongPositive => "strong positive: diversification weakened",
        }
    }
}

/// Headline asset pairs whose correlation reads as a market-regime signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPair {
    BitcoinGold,
    EquityBond,
    DollarEquity,
}

impl KeyPair {
    pub const ALL: [KeyPair; 3] = [KeyPair::BitcoinGold, KeyPair::EquityBond, KeyPair::DollarEquity];

    /// Catalog names of the two sides.
    pub fn assets(self) -> (&'static str, &'static str) {
        match self {
            KeyPair::BitcoinGold => ("Bitcoin", "Gold"),
            KeyPair::EquityBond => ("S&P 500", "US Bond"),
            KeyPair::DollarEquity => ("USD Index", "S&P 500"),
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            KeyPair::BitcoinGold => "Bitcoin vs Gold",
            KeyPair::EquityBond => "Equity vs Bond",
            KeyPair::DollarEquity => "USD Index vs Equity",
        }
    }

    pub fn macro_reading(self, value: f64) -> &'static str {
        match self {
            KeyPair::BitcoinGold if value > 0.3 => "Bitcoin tracks gold: acting as a risk asset",
            KeyPair::BitcoinGold => "Bitcoin moves independently of gold",
            KeyPair::EquityBond if value > 0.0 => "stock/bond diversification (60/40) is breaking down",
            KeyPair::EquityBond => "stock/bond diversification holds",
            KeyPair::DollarEquity if value < -0.3 => "dollar strength with falling equities: risk-off",
            KeyPair::DollarEquity => "dollar/equity relationship neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyPairReading {
    pub pair: KeyPair,
    pub coefficient: Coefficient,
}

impl KeyPairReading {
    /// Macro reading, or `None` when the coefficient could not be computed.
    pub fn reading(&self) -> Option<&'static str> {
        self.coefficient.value().map(|v| self.pair.macro_reading(v))
    }
}

/// Key pairs whose two assets are both in the catalog and in `matrix`.
pub fn key_pair_readings(matrix: &CorrelationMatrix, catalog: &AssetCatalog) -> Vec<KeyPairReading> {
    KeyPair::ALL
        .into_iter()
        .filter_map(|pair| {
            let (a, b) = pair.assets();
            let coefficient = matrix.get(catalog.ticker_for(a)?, catalog.ticker_for(b)?)?;
            Some(KeyPairReading { pair, coefficient })
        })
        .collect()
}
