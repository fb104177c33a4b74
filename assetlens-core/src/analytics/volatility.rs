//! Volatility over the observed window.
//!
//! Sample standard deviation (n - 1) of each return column. No annualization:
//! the number describes the window that was fetched, whatever its length.

use crate::table::ReturnSeries;
use std::collections::BTreeMap;

/// Per-symbol standard deviation of daily returns, optionally in percent.
///
/// Symbols with fewer than two valid returns map to `None`.
pub fn volatility(returns: &ReturnSeries, as_percent: bool) -> BTreeMap<String, Option<f64>> {
    let scale = if as_percent { 100.0 } else { 1.0 };
    returns
        .columns()
        .map(|(symbol, column)| {
            let values: Vec<f64> = column.iter().flatten().copied().collect();
            (symbol.to_string(), sample_std(&values).map(|s| s * scale))
        })
        .collect()
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation. `None` for fewer than two values.
pub(crate) fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}
