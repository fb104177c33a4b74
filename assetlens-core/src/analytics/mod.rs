//! Derived statistics. Pure functions, no I/O.
//!
//! Every function accepts an empty input and returns an empty or absent
//! result, so a failed fetch flows through to rendering without special cases.

pub mod correlation;
pub mod returns;
pub mod snapshot;
pub mod volatility;

pub use correlation::{
    correlation_matrix, key_pair_readings, pearson, Coefficient, CorrelationBand,
    CorrelationMatrix, CrossBlock, KeyPair, KeyPairReading,
};
pub use returns::{daily_returns, normalized_index, period_returns, ranked_period_returns};
pub use snapshot::{quote_snapshots, QuoteSnapshot};
pub use volatility::volatility;
