//! Latest-quote summary cards.

use super::volatility::volatility;
use crate::table::{PriceTable, ReturnSeries};
use serde::{Deserialize, Serialize};

/// Current-price card for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub symbol: String,
    pub last_close: Option<f64>,
    /// Close on the previous row of the table (previous trading day).
    pub previous_close: Option<f64>,
    pub day_change_pct: Option<f64>,
    /// Standard deviation of daily returns over the window, in percent.
    pub volatility_pct: Option<f64>,
}

/// One snapshot per column, largest day change first; absent changes last.
pub fn quote_snapshots(table: &PriceTable, returns: &ReturnSeries) -> Vec<QuoteSnapshot> {
    if table.is_empty() {
        return Vec::new();
    }
    let last_row = table.len() - 1;
    let vol = volatility(returns, true);

    let mut snapshots: Vec<QuoteSnapshot> = table
        .symbols()
        .iter()
        .map(|symbol| {
            let last_close = table.value(last_row, symbol);
            let previous_close = last_row
                .checked_sub(1)
                .and_then(|row| table.value(row, symbol));
            let day_change_pct = match (last_close, previous_close) {
                (Some(last), Some(prev)) if prev != 0.0 => Some((last / prev - 1.0) * 100.0),
                _ => None,
            };
            QuoteSnapshot {
                symbol: symbol.clone(),
                last_close,
                previous_close,
                day_change_pct,
                volatility_pct: vol.get(symbol).copied().flatten(),
            }
        })
        .collect();

    snapshots.sort_by(|a, b| match (a.day_change_pct, b.day_change_pct) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    snapshots
}
