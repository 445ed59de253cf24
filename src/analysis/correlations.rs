use std::collections::BTreeMap;

use serde::Serialize;

use super::stats::correlation::{correlation_p_value, pearson_r};
use super::stats::{require, Interpretation, MIN_PAIRED};
use crate::data::indicators::MacroTable;
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorPair {
    pub first: String,
    pub second: String,
    pub r: f64,
    pub p_value: f64,
    pub years: usize,
    pub interpretation: Interpretation,
}

/// Pearson r between every pair of indicators of one country over the
/// years both have a value.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub country: String,
    /// Indicator names, in code order; rows and columns follow it.
    pub indicators: Vec<String>,
    /// `None` where two indicators share fewer than 3 years or one of them
    /// is constant over the shared years.
    pub cells: Vec<Vec<Option<f64>>>,
    /// Defined pairs ordered by |r|, strongest first.
    pub strongest: Vec<IndicatorPair>,
}

pub fn correlation_matrix(table: &MacroTable, country: &str) -> Result<CorrelationMatrix> {
    let country = country.trim().to_ascii_uppercase();

    // code -> year -> value
    let mut series: BTreeMap<&str, BTreeMap<i32, f64>> = BTreeMap::new();
    for obs in &table.observations {
        if obs.country == country && obs.value.is_finite() {
            series
                .entry(obs.indicator_code.as_str())
                .or_default()
                .entry(obs.year)
                .or_insert(obs.value);
        }
    }
    require("correlation matrix", "indicators with data", 2, series.len())?;

    let columns: Vec<(&str, &BTreeMap<i32, f64>)> = series.iter().map(|(c, s)| (*c, s)).collect();
    let names: Vec<String> = columns
        .iter()
        .map(|(code, _)| table.indicators.get(*code).cloned().unwrap_or_else(|| code.to_string()))
        .collect();

    let k = columns.len();
    let mut cells = vec![vec![None; k]; k];
    let mut strongest = Vec::new();
    for i in 0..k {
        cells[i][i] = Some(1.0);
        for j in i + 1..k {
            let (x, y): (Vec<f64>, Vec<f64>) = columns[i]
                .1
                .iter()
                .filter_map(|(year, a)| columns[j].1.get(year).map(|b| (*a, *b)))
                .unzip();
            if x.len() < MIN_PAIRED {
                continue;
            }
            let Some(r) = pearson_r(&x, &y) else {
                continue;
            };
            cells[i][j] = Some(r);
            cells[j][i] = Some(r);
            let p_value = correlation_p_value(r, x.len());
            strongest.push(IndicatorPair {
                first: names[i].clone(),
                second: names[j].clone(),
                r,
                p_value,
                years: x.len(),
                interpretation: Interpretation::for_correlation(r, p_value),
            });
        }
    }
    strongest.sort_by(|a, b| b.r.abs().total_cmp(&a.r.abs()));

    Ok(CorrelationMatrix {
        country,
        indicators: names,
        cells,
        strongest,
    })
}
