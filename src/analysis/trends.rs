use std::collections::BTreeMap;

use serde::Serialize;

use super::compare::SkippedCountry;
use super::stats::trend::{linear_trend, LinearTrend};
use crate::data::filter::{select_macro, Selection};
use crate::data::indicators::MacroTable;
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct CountryTrend {
    pub country: String,
    pub first_year: i32,
    pub last_year: i32,
    pub trend: LinearTrend,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendReport {
    pub indicator_code: String,
    pub indicator_name: String,
    /// Ordered by slope, steepest rise first.
    pub trends: Vec<CountryTrend>,
    pub skipped: Vec<SkippedCountry>,
}

/// Least-squares trend of an indicator over the years, per country.
pub fn indicator_trends(
    table: &MacroTable,
    indicator: &str,
    selection: &Selection,
) -> Result<TrendReport> {
    let (code, name) = table.resolve_indicator(indicator)?;

    let mut by_country: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for obs in select_macro(&table.observations, selection) {
        if obs.indicator_code == code {
            let (years, values) = by_country.entry(obs.country.as_str()).or_default();
            years.push(obs.year as f64);
            values.push(obs.value);
        }
    }

    let mut trends = Vec::new();
    let mut skipped = Vec::new();
    for (country, (years, values)) in by_country {
        match linear_trend(&years, &values) {
            Ok(trend) => {
                let used = years
                    .iter()
                    .zip(&values)
                    .filter(|(_, v)| v.is_finite())
                    .map(|(y, _)| *y as i32);
                let first_year = used.clone().min().unwrap_or_default();
                let last_year = used.max().unwrap_or_default();
                trends.push(CountryTrend {
                    country: country.to_string(),
                    first_year,
                    last_year,
                    trend,
                });
            }
            Err(err) => {
                log::debug!("No trend for {country}: {err}");
                skipped.push(SkippedCountry {
                    country: country.to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }
    trends.sort_by(|a, b| b.trend.slope.total_cmp(&a.trend.slope));

    Ok(TrendReport {
        indicator_code: code.to_string(),
        indicator_name: name.to_string(),
        trends,
        skipped,
    })
}
