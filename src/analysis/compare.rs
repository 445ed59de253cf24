//! Cross-dataset comparison: annual market performance against one macro
//! indicator, globally and country by country.

use serde::Serialize;

use super::align::{aggregate_annual, align, macro_series, AlignedTable, AnnualAggregation};
use super::coverage::Coverage;
use super::stats::correlation::pearson;
use super::stats::descriptive::{describe, Descriptive};
use super::stats::hypothesis::{mann_whitney, t_test};
use super::stats::normality::{shapiro_wilk, NormalityCheck, SHAPIRO_MAX_EXACT};
use super::stats::{mean, require, TestOutcome, MIN_PAIRED};
use crate::data::filter::Selection;
use crate::data::indicators::{MacroTable, GDP_GROWTH};
use crate::data::market::MarketHistory;
use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone)]
pub struct ComparisonOptions {
    pub indicator: String,
    pub aggregation: AnnualAggregation,
    pub selection: Selection,
}

impl Default for ComparisonOptions {
    fn default() -> Self {
        Self {
            indicator: GDP_GROWTH.to_string(),
            aggregation: AnnualAggregation::default(),
            selection: Selection::all(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub market_label: String,
    pub macro_label: String,
    pub aggregation: AnnualAggregation,
    pub coverage: Coverage,
    pub aligned_pairs: usize,
    pub years: Option<(i32, i32)>,
    pub global: GlobalComparison,
    /// Ordered by ascending p-value.
    pub per_country: Vec<CountryComparison>,
    pub skipped: Vec<SkippedCountry>,
    pub summary: ComparisonSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct GlobalComparison {
    pub market: Descriptive,
    pub macro_values: Descriptive,
    pub market_normality: Option<NormalityCheck>,
    pub macro_normality: Option<NormalityCheck>,
    /// Mann-Whitney when either column looks non-normal, t-test otherwise.
    pub difference: TestOutcome,
    pub correlation: Option<TestOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountryComparison {
    pub country: String,
    pub n: usize,
    pub market_mean: f64,
    pub macro_mean: f64,
    pub mean_difference: f64,
    pub difference: TestOutcome,
    pub correlation: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedCountry {
    pub country: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonSummary {
    pub countries_tested: usize,
    pub significant: usize,
    /// Percentage of tested countries with p < 0.05.
    pub significant_share: f64,
    pub mean_correlation: Option<f64>,
}

/// Aggregate, align and test. Fails only when the aligned table as a whole
/// is too small; countries that cannot be tested are listed in `skipped`.
pub fn compare_datasets(
    history: &MarketHistory,
    macro_table: &MacroTable,
    options: &ComparisonOptions,
) -> Result<Comparison> {
    let market = aggregate_annual(history, options.aggregation, &options.selection);
    let macro_side = macro_series(macro_table, &options.indicator, &options.selection)?;
    let aligned = align(&market, &macro_side);
    log::info!(
        "Aligned {} country-years ({} market, {} macro)",
        aligned.len(),
        market.len(),
        macro_side.len()
    );
    require("dataset comparison", "aligned country-years", MIN_PAIRED, aligned.len())?;

    let global = global_comparison(&aligned)?;
    let (per_country, skipped) = per_country(&aligned)?;

    let significant = per_country.iter().filter(|c| c.difference.is_significant()).count();
    let correlations: Vec<f64> = per_country.iter().filter_map(|c| c.correlation).collect();
    let summary = ComparisonSummary {
        countries_tested: per_country.len(),
        significant,
        significant_share: if per_country.is_empty() {
            0.0
        } else {
            significant as f64 / per_country.len() as f64 * 100.0
        },
        mean_correlation: (!correlations.is_empty()).then(|| mean(&correlations)),
    };

    Ok(Comparison {
        market_label: aligned.market_label.clone(),
        macro_label: aligned.macro_label.clone(),
        aggregation: options.aggregation,
        coverage: Coverage::new(history, macro_table),
        aligned_pairs: aligned.len(),
        years: aligned.years(),
        global,
        per_country,
        skipped,
        summary,
    })
}

fn global_comparison(aligned: &AlignedTable) -> Result<GlobalComparison> {
    let (market, macro_values) = aligned.split();
    let market_normality = shapiro_sampled(&market).map(NormalityCheck::from);
    let macro_normality = shapiro_sampled(&macro_values).map(NormalityCheck::from);
    let both_normal = matches!(
        (&market_normality, &macro_normality),
        (Some(a), Some(b)) if a.normal && b.normal
    );

    Ok(GlobalComparison {
        market: describe(&market)?,
        macro_values: describe(&macro_values)?,
        difference: difference_test(&market, &macro_values, both_normal)?,
        correlation: pearson(&market, &macro_values).ok(),
        market_normality,
        macro_normality,
    })
}

/// Countries whose data cannot support the tests are skipped; any other
/// failure aborts the comparison.
fn per_country(aligned: &AlignedTable) -> Result<(Vec<CountryComparison>, Vec<SkippedCountry>)> {
    let mut tested = Vec::new();
    let mut skipped = Vec::new();

    for (country, pairs) in aligned.by_country() {
        let (market, macro_values): (Vec<f64>, Vec<f64>) =
            pairs.iter().map(|p| (p.market_value, p.macro_value)).unzip();

        let outcome = require("per-country comparison", "aligned years", MIN_PAIRED, pairs.len())
            .and_then(|()| {
                let both_normal = [&market, &macro_values]
                    .iter()
                    .all(|v| shapiro_wilk(v).is_ok_and(|o| NormalityCheck::from(o).normal));
                difference_test(&market, &macro_values, both_normal)
            });

        match outcome {
            Ok(difference) => {
                let (market_mean, macro_mean) = (mean(&market), mean(&macro_values));
                tested.push(CountryComparison {
                    country: country.to_string(),
                    n: pairs.len(),
                    market_mean,
                    macro_mean,
                    mean_difference: market_mean - macro_mean,
                    difference,
                    correlation: pearson(&market, &macro_values).ok().map(|o| o.statistic),
                });
            }
            Err(err) if err.is_skippable() => {
                log::debug!("Skipping {country}: {err}");
                skipped.push(SkippedCountry {
                    country: country.to_string(),
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    tested.sort_by(|a, b| a.difference.p_value.total_cmp(&b.difference.p_value));
    Ok((tested, skipped))
}

/// t-test when both columns pass the normality check, Mann-Whitney
/// otherwise or when the t-test cannot run on the data.
fn difference_test(a: &[f64], b: &[f64], both_normal: bool) -> Result<TestOutcome> {
    if both_normal {
        match t_test(a, b) {
            Err(AnalysisError::ConstantInput { .. }) => {}
            result => return result,
        }
    }
    mann_whitney(a, b)
}

/// Shapiro-Wilk on at most [`SHAPIRO_MAX_EXACT`] values, taken at an even
/// stride so the result is reproducible.
fn shapiro_sampled(values: &[f64]) -> Option<TestOutcome> {
    if values.len() <= SHAPIRO_MAX_EXACT {
        return shapiro_wilk(values).ok();
    }
    let stride = values.len().div_ceil(SHAPIRO_MAX_EXACT);
    let sample: Vec<f64> = values.iter().step_by(stride).copied().collect();
    shapiro_wilk(&sample).ok()
}
