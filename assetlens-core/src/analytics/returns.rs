//! Return statistics: pure functions over a `PriceTable`.
//!
//! Every statistic that needs a starting price uses each symbol's own first
//! valid observation, so a symbol that started trading late is measured from
//! its listing date rather than penalized against the table's first row.
//! `period_returns` and `normalized_index` share that base and always agree:
//! `last(normalized) - 100 == period_return`.

use crate::table::{PriceTable, ReturnSeries};
use std::collections::BTreeMap;

/// Fractional change between consecutive rows, per symbol.
///
/// A cell is `None` when either side of the pair is missing or the
/// predecessor price is zero. The result has exactly `table.len() - 1` rows.
pub fn daily_returns(table: &PriceTable) -> ReturnSeries {
    if table.len() < 2 || table.symbols().is_empty() {
        return ReturnSeries::default();
    }

    let dates = table.dates()[1..].to_vec();
    let symbols = table.symbols().to_vec();
    let columns = table
        .columns()
        .map(|(_, column)| {
            column
                .windows(2)
                .map(|pair| match (pair[0], pair[1]) {
                    (Some(prev), Some(curr)) if prev != 0.0 => Some(curr / prev - 1.0),
                    _ => None,
                })
                .collect()
        })
        .collect();

    ReturnSeries::from_parts(dates, symbols, columns).unwrap_or_default()
}

/// Period return in percent: `(last valid / first valid - 1) * 100`.
///
/// Symbols with fewer than two valid observations (or a zero first price)
/// map to `None`.
pub fn period_returns(table: &PriceTable) -> BTreeMap<String, Option<f64>> {
    table
        .columns()
        .map(|(symbol, column)| (symbol.to_string(), column_period_return(column)))
        .collect()
}

fn column_period_return(column: &[Option<f64>]) -> Option<f64> {
    let mut valid = column.iter().flatten();
    let first = *valid.next()?;
    let last = *valid.last()?;
    if first == 0.0 {
        return None;
    }
    Some((last / first - 1.0) * 100.0)
}

/// Period returns sorted descending, absent values dropped.
pub fn ranked_period_returns(returns: &BTreeMap<String, Option<f64>>) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = returns
        .iter()
        .filter_map(|(symbol, value)| value.map(|v| (symbol.clone(), v)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

/// Rebase every column to 100 at its own first valid observation.
///
/// Columns whose first valid price is zero become entirely `None`.
pub fn normalized_index(table: &PriceTable) -> PriceTable {
    let columns = table
        .columns()
        .map(|(_, column)| {
            let base = column.iter().flatten().next().copied().filter(|b| *b != 0.0);
            column
                .iter()
                .map(|cell| match (cell, base) {
                    (Some(v), Some(b)) => Some(v / b * 100.0),
                    _ => None,
                })
                .collect()
        })
        .collect();

    PriceTable::from_parts(table.dates().to_vec(), table.symbols().to_vec(), columns)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn table(columns: Vec<(&str, Vec<Option<f64>>)>) -> PriceTable {
        let n = columns[0].1.len();
        let dates = (0..n).map(|i| d(2 + i as u32)).collect();
        let (symbols, cols): (Vec<String>, Vec<Vec<Option<f64>>>) = columns
            .into_iter()
            .map(|(s, c)| (s.to_string(), c))
            .unzip();
        PriceTable::from_parts(dates, symbols, cols).unwrap()
    }

    #[test]
    fn daily_returns_match_hand_computed_values() {
        let t = table(vec![
            ("A", vec![Some(100.0), Some(110.0), Some(121.0)]),
            ("B", vec![Some(50.0), Some(45.0), Some(40.5)]),
        ]);
        let r = daily_returns(&t);

        assert_eq!(r.len(), 2);
        assert_eq!(r.dates(), &[d(3), d(4)]);
        for v in r.column("A").unwrap() {
            assert!((v.unwrap() - 0.10).abs() < 1e-12);
        }
        for v in r.column("B").unwrap() {
            assert!((v.unwrap() + 0.10).abs() < 1e-12);
        }
    }

    #[test]
    fn daily_returns_leave_missing_predecessors_absent() {
        let t = table(vec![
            ("A", vec![Some(1.0), Some(2.0), Some(3.0)]),
            ("LATE", vec![None, Some(10.0), Some(11.0)]),
        ]);
        let r = daily_returns(&t);

        assert_eq!(r.column("LATE").unwrap()[0], None);
        assert!((r.column("LATE").unwrap()[1].unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn daily_returns_empty_for_short_tables() {
        let t = table(vec![("A", vec![Some(1.0)])]);
        assert!(daily_returns(&t).is_empty());
        assert!(daily_returns(&PriceTable::empty()).is_empty());
    }

    #[test]
    fn zero_predecessor_gives_absent_return() {
        let t = table(vec![("A", vec![Some(0.0), Some(1.0)])]);
        assert_eq!(daily_returns(&t).column("A").unwrap()[0], None);
    }

    #[test]
    fn period_return_uses_each_symbols_own_first_observation() {
        let t = table(vec![
            ("EARLY", vec![Some(100.0), Some(100.0), Some(150.0)]),
            ("LATE", vec![None, Some(20.0), Some(30.0)]),
        ]);
        let pr = period_returns(&t);

        assert!((pr["EARLY"].unwrap() - 50.0).abs() < 1e-9);
        // Measured from 20.0, not penalized for the missing first row
        assert!((pr["LATE"].unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn period_return_constant_price_is_exactly_zero() {
        let t = table(vec![("FLAT", vec![Some(42.0), Some(42.0), Some(42.0)])]);
        assert_eq!(period_returns(&t)["FLAT"], Some(0.0));
    }

    #[test]
    fn period_return_needs_two_observations() {
        let t = table(vec![
            ("A", vec![Some(1.0), Some(2.0)]),
            ("ONE", vec![None, Some(5.0)]),
        ]);
        let pr = period_returns(&t);
        assert_eq!(pr["ONE"], None);
        assert!(period_returns(&PriceTable::empty()).is_empty());
    }

    #[test]
    fn ranking_sorts_descending_and_skips_absent() {
        let mut pr = BTreeMap::new();
        pr.insert("A".to_string(), Some(-3.0));
        pr.insert("B".to_string(), Some(12.5));
        pr.insert("C".to_string(), None);
        pr.insert("D".to_string(), Some(0.0));

        let ranked = ranked_period_returns(&pr);
        let order: Vec<&str> = ranked.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(order, vec!["B", "D", "A"]);
    }

    #[test]
    fn normalized_index_agrees_with_period_return() {
        let t = table(vec![
            ("A", vec![Some(100.0), Some(110.0), Some(121.0)]),
            ("LATE", vec![None, Some(8.0), Some(6.0)]),
        ]);
        let idx = normalized_index(&t);
        let pr = period_returns(&t);

        assert_eq!(idx.value(0, "A"), Some(100.0));
        assert_eq!(idx.value(1, "LATE"), Some(100.0));
        for symbol in ["A", "LATE"] {
            let last = idx.value(idx.len() - 1, symbol).unwrap();
            assert!((last - 100.0 - pr[symbol].unwrap()).abs() < 1e-9);
        }
    }
}
