//! Aligned date × symbol tables.
//!
//! `PriceTable` is the unified close-price table every derived statistic
//! starts from. `ReturnSeries` has the same column layout, one row shorter.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Close prices on a common date index.
///
/// Invariants (enforced by every constructor):
/// - `dates` strictly increasing
/// - each column has exactly `dates.len()` cells
/// - no row is entirely `None`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
}

impl PriceTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from per-symbol observations.
    ///
    /// Dates are the union of all observation dates. Each column is
    /// forward-filled from its most recent known value (never back-filled),
    /// then rows with no value in any column are dropped. Symbols with no
    /// observations at all are left out. Duplicate dates keep the last value.
    pub fn from_observations(observations: BTreeMap<String, Vec<(NaiveDate, f64)>>) -> Self {
        let observations: BTreeMap<String, BTreeMap<NaiveDate, f64>> = observations
            .into_iter()
            .map(|(symbol, points)| {
                let by_date = points
                    .into_iter()
                    .filter(|(_, v)| v.is_finite())
                    .collect::<BTreeMap<_, _>>();
                (symbol, by_date)
            })
            .filter(|(_, by_date)| !by_date.is_empty())
            .collect();

        let mut dates: Vec<NaiveDate> = observations
            .values()
            .flat_map(|by_date| by_date.keys().copied())
            .collect();
        dates.sort_unstable();
        dates.dedup();

        let symbols: Vec<String> = observations.keys().cloned().collect();
        let columns: Vec<Vec<Option<f64>>> = observations
            .values()
            .map(|by_date| dates.iter().map(|d| by_date.get(d).copied()).collect())
            .collect();

        Self::from_parts(dates, symbols, columns)
            .unwrap_or_default()
            .forward_filled()
    }

    /// Build a table from already-aligned columns.
    ///
    /// Returns `None` when the shape is inconsistent or dates are not strictly
    /// increasing. All-`None` rows are dropped; no filling is applied.
    pub fn from_parts(
        dates: Vec<NaiveDate>,
        symbols: Vec<String>,
        columns: Vec<Vec<Option<f64>>>,
    ) -> Option<Self> {
        if symbols.len() != columns.len() || columns.iter().any(|c| c.len() != dates.len()) {
            return None;
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return None;
        }
        let table = Self {
            dates,
            symbols,
            columns,
        };
        Some(table.without_empty_rows())
    }

    /// Propagate each column's last known value forward through gaps.
    ///
    /// Applying this to an already-filled table is a no-op.
    pub fn forward_filled(&self) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|column| {
                let mut last = None;
                column
                    .iter()
                    .map(|cell| {
                        if cell.is_some() {
                            last = *cell;
                        }
                        last
                    })
                    .collect()
            })
            .collect();
        Self {
            dates: self.dates.clone(),
            symbols: self.symbols.clone(),
            columns,
        }
        .without_empty_rows()
    }

    fn without_empty_rows(self) -> Self {
        let keep: Vec<bool> = (0..self.dates.len())
            .map(|row| self.columns.iter().any(|c| c[row].is_some()))
            .collect();
        if keep.iter().all(|k| *k) {
            return self;
        }
        let filter = |v: &[Option<f64>]| -> Vec<Option<f64>> {
            v.iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(cell, _)| *cell)
                .collect()
        };
        Self {
            dates: self
                .dates
                .iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(d, _)| *d)
                .collect(),
            columns: self.columns.iter().map(|c| filter(c.as_slice())).collect(),
            symbols: self.symbols,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.symbols.is_empty()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn column(&self, symbol: &str) -> Option<&[Option<f64>]> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|i| self.columns[i].as_slice())
    }

    /// Iterate `(symbol, column)` pairs in column order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.symbols
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }

    /// Value at `row` for `symbol`, if present.
    pub fn value(&self, row: usize, symbol: &str) -> Option<f64> {
        self.column(symbol).and_then(|c| c.get(row).copied().flatten())
    }

    /// Last `n` rows (all rows when the table is shorter).
    pub fn tail(&self, n: usize) -> Self {
        let skip = self.len().saturating_sub(n);
        Self {
            dates: self.dates[skip..].to_vec(),
            symbols: self.symbols.clone(),
            columns: self.columns.iter().map(|c| c[skip..].to_vec()).collect(),
        }
    }

    /// Rename columns through a label map; unmapped symbols keep their name.
    pub fn relabeled(&self, labels: &BTreeMap<String, String>) -> Self {
        Self {
            dates: self.dates.clone(),
            symbols: self
                .symbols
                .iter()
                .map(|s| labels.get(s).cloned().unwrap_or_else(|| s.clone()))
                .collect(),
            columns: self.columns.clone(),
        }
    }
}

/// Fractional change between consecutive rows of a `PriceTable`.
///
/// Always `source.len() - 1` rows (empty for sources shorter than two rows).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
}

impl ReturnSeries {
    /// Build a return series from aligned columns.
    ///
    /// Returns `None` when the shape is inconsistent or dates are not strictly
    /// increasing. Cells are kept as given, including all-`None` rows.
    pub fn from_parts(
        dates: Vec<NaiveDate>,
        symbols: Vec<String>,
        columns: Vec<Vec<Option<f64>>>,
    ) -> Option<Self> {
        if symbols.len() != columns.len() || columns.iter().any(|c| c.len() != dates.len()) {
            return None;
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return None;
        }
        Some(Self {
            dates,
            symbols,
            columns,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn column(&self, symbol: &str) -> Option<&[Option<f64>]> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|i| self.columns[i].as_slice())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.symbols
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }
}
