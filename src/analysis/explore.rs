use std::collections::BTreeMap;

use serde::Serialize;

use super::stats::descriptive::{describe, Descriptive};
use super::stats::hypothesis::{kruskal_wallis, mann_whitney, one_way_anova, t_test};
use super::stats::normality::{dagostino_pearson, NormalitySummary};
use super::stats::{require, TestOutcome, SIGNIFICANCE_LEVEL};
use crate::data::countries;
use crate::data::filter::{select_macro, Selection};
use crate::data::indicators::MacroTable;
use crate::error::Result;

/// Parametric tests are only chosen from this group size on.
pub const PARAMETRIC_MIN_GROUP: usize = 20;

/// Each side of a two-country comparison needs this many values.
const TWO_GROUP_MIN: usize = 3;

/// Countries with fewer values stay out of a multi-country comparison.
const GROUPED_MIN: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct CountrySummary {
    pub country: String,
    pub name: Option<&'static str>,
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: Option<f64>,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupComparison {
    /// Countries that entered the test.
    pub countries: Vec<String>,
    /// Whether the parametric test (t-test / ANOVA) was chosen.
    pub parametric: bool,
    pub outcome: TestOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct Exploration {
    pub indicator_code: String,
    pub indicator_name: String,
    pub years: Option<(i32, i32)>,
    /// Every selected value of the indicator, all countries pooled.
    pub summary: Option<Descriptive>,
    pub normality: NormalitySummary,
    /// Ordered by mean, highest first.
    pub countries: Vec<CountrySummary>,
    pub comparison: Option<GroupComparison>,
    /// Why no comparison was run, when there were groups to compare.
    pub comparison_skipped: Option<String>,
}

/// Per-country view of one indicator, plus a comparison across the
/// selected countries.
pub fn explore_indicator(
    table: &MacroTable,
    indicator: &str,
    selection: &Selection,
) -> Result<Exploration> {
    let (code, name) = table.resolve_indicator(indicator)?;
    let groups = indicator_groups(table, code, selection);

    let mut summaries = Vec::with_capacity(groups.len());
    for (country, values) in &groups {
        // every group holds at least one finite value
        let d = describe(values)?;
        summaries.push(CountrySummary {
            country: country.clone(),
            name: countries::name_of(country),
            n: d.n,
            mean: d.mean,
            median: d.median,
            std_dev: d.std_dev,
            min: d.min,
            max: d.max,
        });
    }
    summaries.sort_by(|a, b| b.mean.total_cmp(&a.mean));

    let years = select_macro(&table.observations, selection)
        .into_iter()
        .filter(|o| o.indicator_code == code && o.value.is_finite())
        .map(|o| o.year)
        .fold(None, |acc: Option<(i32, i32)>, y| {
            Some(acc.map_or((y, y), |(lo, hi)| (lo.min(y), hi.max(y))))
        });

    let pooled: Vec<f64> = groups.values().flatten().copied().collect();
    let summary = describe(&pooled).ok();
    let normality = NormalitySummary::of(&pooled);

    let (comparison, comparison_skipped) = match compare_groups(&groups) {
        Ok(comparison) => (comparison, None),
        Err(err) => {
            log::debug!("No group comparison for {code}: {err}");
            (None, Some(err.to_string()))
        }
    };

    Ok(Exploration {
        indicator_code: code.to_string(),
        indicator_name: name.to_string(),
        years,
        summary,
        normality,
        countries: summaries,
        comparison,
        comparison_skipped,
    })
}

/// Finite values of one indicator per country.
pub(crate) fn indicator_groups(
    table: &MacroTable,
    code: &str,
    selection: &Selection,
) -> BTreeMap<String, Vec<f64>> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for obs in select_macro(&table.observations, selection) {
        if obs.indicator_code == code && obs.value.is_finite() {
            groups.entry(obs.country.clone()).or_default().push(obs.value);
        }
    }
    groups
}

fn looks_normal(values: &[f64]) -> bool {
    values.len() >= PARAMETRIC_MIN_GROUP
        && dagostino_pearson(values).is_ok_and(|o| o.p_value > SIGNIFICANCE_LEVEL)
}

/// Two groups: t-test or Mann-Whitney. More: ANOVA or Kruskal-Wallis over
/// the countries with at least two values. `Ok(None)` when there is nothing
/// to compare.
fn compare_groups(groups: &BTreeMap<String, Vec<f64>>) -> Result<Option<GroupComparison>> {
    match groups.len() {
        0 | 1 => Ok(None),
        2 => {
            let countries: Vec<String> = groups.keys().cloned().collect();
            let mut sides = groups.values();
            let (Some(a), Some(b)) = (sides.next(), sides.next()) else {
                return Ok(None);
            };
            require("two-country comparison", "values per country", TWO_GROUP_MIN, a.len().min(b.len()))?;
            let parametric = looks_normal(a) && looks_normal(b);
            let outcome = if parametric { t_test(a, b)? } else { mann_whitney(a, b)? };
            Ok(Some(GroupComparison {
                countries,
                parametric,
                outcome,
            }))
        }
        _ => {
            let (countries, values): (Vec<String>, Vec<Vec<f64>>) = groups
                .iter()
                .filter(|(_, values)| values.len() >= GROUPED_MIN)
                .map(|(country, values)| (country.clone(), values.clone()))
                .unzip();
            require("multi-country comparison", "countries with two or more values", 2, countries.len())?;

            let parametric = values.iter().all(|g| looks_normal(g));
            let outcome = if parametric {
                one_way_anova(&values)?
            } else {
                kruskal_wallis(&values)?
            };
            Ok(Some(GroupComparison {
                countries,
                parametric,
                outcome,
            }))
        }
    }
}
