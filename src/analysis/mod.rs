/// Analysis layer: alignment of the two datasets, the statistics engine and
/// the reports built from them.
///
/// ```text
///   MarketHistory ──aggregate_annual──┐
///                                     ├──align──► AlignedTable ──► stats ──► reports
///   MacroTable ─────macro_series──────┘
/// ```
///
/// Every report is a plain `Serialize` struct; rendering is left to the
/// caller.

pub mod adhoc;
pub mod align;
pub mod compare;
pub mod correlations;
pub mod coverage;
pub mod explore;
pub mod metrics;
pub mod stats;
pub mod trends;
