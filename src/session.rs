use std::cell::OnceCell;
use std::sync::Arc;

use crate::analysis::adhoc::{run_request, TestReport, TestRequest};
use crate::analysis::compare::{compare_datasets, Comparison, ComparisonOptions};
use crate::analysis::correlations::{correlation_matrix, CorrelationMatrix};
use crate::analysis::coverage::Coverage;
use crate::analysis::explore::{explore_indicator, Exploration};
use crate::analysis::metrics::{period_metrics, snapshot, AssetSnapshot, PeriodMetrics};
use crate::analysis::trends::{indicator_trends, TrendReport};
use crate::config::Config;
use crate::data::filter::Selection;
use crate::data::indicators::{load_macro, MacroSchema, MacroTable};
use crate::data::market::{load_market_history, HistorySchema, MarketHistory};
use crate::error::Result;

// ---------------------------------------------------------------------------
// Session – datasets loaded once, shared by every analysis
// ---------------------------------------------------------------------------

/// Each dataset is read from disk on first use and kept for the rest of the
/// process. Loaded data is never mutated, so callers get cheap `Arc` clones.
pub struct Session {
    config: Config,
    history_schema: HistorySchema,
    macro_schema: MacroSchema,
    history: OnceCell<Arc<MarketHistory>>,
    macro_table: OnceCell<Arc<MacroTable>>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            history_schema: HistorySchema::default(),
            macro_schema: MacroSchema::default(),
            history: OnceCell::new(),
            macro_table: OnceCell::new(),
        }
    }

    /// A session over datasets that are already in memory.
    pub fn from_datasets(config: Config, history: MarketHistory, macro_table: MacroTable) -> Self {
        let session = Self::new(config);
        let _ = session.history.set(Arc::new(history));
        let _ = session.macro_table.set(Arc::new(macro_table));
        session
    }

    pub fn with_schemas(mut self, history: HistorySchema, macro_schema: MacroSchema) -> Self {
        self.history_schema = history;
        self.macro_schema = macro_schema;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn history(&self) -> Result<Arc<MarketHistory>> {
        if let Some(history) = self.history.get() {
            return Ok(Arc::clone(history));
        }
        let history = Arc::new(load_market_history(
            &self.config.history_path(),
            &self.history_schema,
        )?);
        let _ = self.history.set(Arc::clone(&history));
        Ok(history)
    }

    pub fn macro_table(&self) -> Result<Arc<MacroTable>> {
        if let Some(table) = self.macro_table.get() {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(load_macro(&self.config.macro_path(), &self.macro_schema)?);
        let _ = self.macro_table.set(Arc::clone(&table));
        Ok(table)
    }

    // -- reports -----------------------------------------------------------

    pub fn coverage(&self) -> Result<Coverage> {
        Ok(Coverage::new(&*self.history()?, &*self.macro_table()?))
    }

    pub fn compare(&self, options: &ComparisonOptions) -> Result<Comparison> {
        compare_datasets(&*self.history()?, &*self.macro_table()?, options)
    }

    pub fn explore(&self, indicator: &str, selection: &Selection) -> Result<Exploration> {
        explore_indicator(&*self.macro_table()?, indicator, selection)
    }

    pub fn trends(&self, indicator: &str, selection: &Selection) -> Result<TrendReport> {
        indicator_trends(&*self.macro_table()?, indicator, selection)
    }

    pub fn correlations(&self, country: &str) -> Result<CorrelationMatrix> {
        correlation_matrix(&*self.macro_table()?, country)
    }

    pub fn snapshot(&self) -> Result<Vec<AssetSnapshot>> {
        Ok(snapshot(&*self.history()?))
    }

    pub fn period_metrics(&self, selection: &Selection) -> Result<Vec<PeriodMetrics>> {
        Ok(period_metrics(&*self.history()?, selection))
    }

    /// Run one engine test; the market history is only read when the test
    /// pairs the indicator with it.
    pub fn test(&self, request: &TestRequest) -> Result<TestReport> {
        let history = if request.needs_market() {
            Some(self.history()?)
        } else {
            None
        };
        run_request(history.as_deref(), &*self.macro_table()?, request)
    }
}
