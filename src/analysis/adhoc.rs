use serde::Serialize;

use super::align::{aggregate_annual, align, macro_series, AnnualAggregation};
use super::explore::indicator_groups;
use super::stats::{run_test, TestInput, TestKind, TestOutcome};
use crate::data::filter::Selection;
use crate::data::indicators::MacroTable;
use crate::data::market::MarketHistory;
use crate::error::Result;

/// What the indicator is paired with in a two-column test.
#[derive(Debug, Clone, PartialEq)]
pub enum PairWith {
    Market(AnnualAggregation),
    Indicator(String),
}

/// One engine test run on the loaded datasets.
#[derive(Debug, Clone)]
pub struct TestRequest {
    pub kind: TestKind,
    pub indicator: String,
    pub pair_with: PairWith,
    pub selection: Selection,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    /// What the statistic was computed on, e.g. `GDP growth (NY.GDP.MKTP.KD.ZG) grouped by country`.
    pub input: String,
    pub outcome: TestOutcome,
}

impl TestRequest {
    /// Whether the market history has to be loaded for this request.
    pub fn needs_market(&self) -> bool {
        matches!(self.pair_with, PairWith::Market(_)) && self.shape() == Shape::Paired
    }

    fn shape(&self) -> Shape {
        match self.kind {
            TestKind::ShapiroWilk | TestKind::DagostinoPearson => Shape::Single,
            TestKind::Anova | TestKind::KruskalWallis => Shape::Grouped,
            _ => Shape::Paired,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Single,
    Grouped,
    Paired,
}

/// Run the request. Distribution tests use the indicator column, grouped
/// tests the indicator split by country, and every other test the indicator
/// aligned on (country, year) with its pair.
pub fn run_request(
    history: Option<&MarketHistory>,
    macro_table: &MacroTable,
    request: &TestRequest,
) -> Result<TestReport> {
    let indicator = macro_series(macro_table, &request.indicator, &request.selection)?;

    match request.shape() {
        Shape::Single => {
            let values: Vec<f64> = indicator.values.values().copied().collect();
            Ok(TestReport {
                input: indicator.label,
                outcome: run_test(request.kind, TestInput::Single(&values))?,
            })
        }
        Shape::Grouped => {
            let (code, _) = macro_table.resolve_indicator(&request.indicator)?;
            let groups: Vec<Vec<f64>> = indicator_groups(macro_table, code, &request.selection)
                .into_values()
                .collect();
            Ok(TestReport {
                input: format!("{} grouped by country", indicator.label),
                outcome: run_test(request.kind, TestInput::Grouped(&groups))?,
            })
        }
        Shape::Paired => {
            let other = match (&request.pair_with, history) {
                (PairWith::Market(rule), Some(history)) => {
                    aggregate_annual(history, *rule, &request.selection)
                }
                (PairWith::Market(rule), None) => {
                    log::warn!("No market history loaded for {}", rule.name());
                    Default::default()
                }
                (PairWith::Indicator(key), _) => {
                    macro_series(macro_table, key, &request.selection)?
                }
            };
            let aligned = align(&other, &indicator);
            let (x, y) = aligned.split();
            Ok(TestReport {
                input: format!("{} vs {}", aligned.macro_label, aligned.market_label),
                outcome: run_test(request.kind, TestInput::Paired { x: &y, y: &x })?,
            })
        }
    }
}
