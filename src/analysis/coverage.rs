use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use super::stats::mean;
use crate::data::indicators::MacroTable;
use crate::data::market::MarketHistory;

/// Countries whose indicators average above this share of years count as
/// complete.
pub const COMPLETE_COUNTRY_PERCENT: f64 = 80.0;

#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub observations: usize,
    pub countries: usize,
    /// Assets for the market history, indicators for the macro table.
    pub series: usize,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
}

/// Which countries and years both datasets can be compared on.
#[derive(Debug, Clone, Serialize)]
pub struct Coverage {
    pub market: DatasetSummary,
    pub macro_data: DatasetSummary,
    pub common_countries: BTreeSet<String>,
    pub market_only: BTreeSet<String>,
    pub macro_only: BTreeSet<String>,
    pub common_years: BTreeSet<i32>,
    /// First and last trading day in the market history.
    pub market_dates: Option<(NaiveDate, NaiveDate)>,
    /// Columns with at least one missing value.
    pub missing_values: Vec<MissingValues>,
    pub completeness: Completeness,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingValues {
    pub dataset: &'static str,
    pub column: &'static str,
    pub missing: usize,
    pub percent: f64,
}

impl MissingValues {
    fn count(
        dataset: &'static str,
        column: &'static str,
        values: impl ExactSizeIterator<Item = f64>,
    ) -> Option<Self> {
        let total = values.len();
        let missing = values.filter(|v| !v.is_finite()).count();
        (missing > 0).then(|| Self {
            dataset,
            column,
            missing,
            percent: missing as f64 / total as f64 * 100.0,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CountryCompleteness {
    pub country: String,
    pub percent: f64,
}

/// How many years of the macro table each (country, indicator) series
/// actually has a value for.
#[derive(Debug, Clone, Serialize)]
pub struct Completeness {
    /// Distinct years anywhere in the macro table.
    pub total_years: usize,
    /// Mean completeness over every (country, indicator) series.
    pub global_percent: Option<f64>,
    /// Mean completeness of each country's indicators, most complete first.
    pub countries: Vec<CountryCompleteness>,
    /// Countries above [`COMPLETE_COUNTRY_PERCENT`].
    pub complete_countries: usize,
}

impl Completeness {
    pub fn of(table: &MacroTable) -> Self {
        let total_years = table.years().len();

        let mut series: BTreeMap<(&str, &str), BTreeSet<i32>> = BTreeMap::new();
        for obs in &table.observations {
            let years = series
                .entry((obs.country.as_str(), obs.indicator_code.as_str()))
                .or_default();
            if obs.value.is_finite() {
                years.insert(obs.year);
            }
        }
        let percent = |years: &BTreeSet<i32>| years.len() as f64 / total_years as f64 * 100.0;

        let cells: Vec<f64> = series.values().map(percent).collect();
        let mut by_country: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for ((country, _), years) in &series {
            by_country.entry(*country).or_default().push(percent(years));
        }

        let mut countries: Vec<CountryCompleteness> = by_country
            .into_iter()
            .map(|(country, cells)| CountryCompleteness {
                country: country.to_string(),
                percent: mean(&cells),
            })
            .collect();
        countries.sort_by(|a, b| b.percent.total_cmp(&a.percent).then_with(|| a.country.cmp(&b.country)));

        Self {
            total_years,
            global_percent: (!cells.is_empty()).then(|| mean(&cells)),
            complete_countries: countries
                .iter()
                .filter(|c| c.percent > COMPLETE_COUNTRY_PERCENT)
                .count(),
            countries,
        }
    }
}

impl Coverage {
    pub fn new(history: &MarketHistory, macro_table: &MacroTable) -> Self {
        let market_years = history.years();
        let macro_years = macro_table.years();

        Self {
            market: DatasetSummary {
                observations: history.len(),
                countries: history.countries.len(),
                series: history.assets.len(),
                first_year: market_years.first().copied(),
                last_year: market_years.last().copied(),
            },
            macro_data: DatasetSummary {
                observations: macro_table.len(),
                countries: macro_table.countries.len(),
                series: macro_table.indicators.len(),
                first_year: macro_years.first().copied(),
                last_year: macro_years.last().copied(),
            },
            common_countries: history
                .countries
                .intersection(&macro_table.countries)
                .cloned()
                .collect(),
            market_only: history
                .countries
                .difference(&macro_table.countries)
                .cloned()
                .collect(),
            macro_only: macro_table
                .countries
                .difference(&history.countries)
                .cloned()
                .collect(),
            common_years: market_years.intersection(&macro_years).copied().collect(),
            market_dates: history.date_range(),
            missing_values: [
                MissingValues::count("market", "daily_return", history.observations.iter().map(|o| o.daily_return)),
                MissingValues::count("market", "volatility", history.observations.iter().map(|o| o.volatility)),
                MissingValues::count("macro", "value", macro_table.observations.iter().map(|o| o.value)),
            ]
            .into_iter()
            .flatten()
            .collect(),
            completeness: Completeness::of(macro_table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::indicators::tests::mobs;
    use crate::data::market::tests::obs;

    #[test]
    fn test_country_and_year_overlap() {
        let history = MarketHistory::from_observations(vec![
            obs("^A", "ARG", (2020, 1, 2), 1.0),
            obs("^B", "BRA", (2021, 1, 2), 1.0),
        ]);
        let macro_table = MacroTable::from_observations(vec![
            mobs("BRA", "X", 2021, 1.0),
            mobs("CHL", "X", 2022, 1.0),
        ]);
        let coverage = Coverage::new(&history, &macro_table);

        assert_eq!(coverage.common_countries, BTreeSet::from(["BRA".to_string()]));
        assert_eq!(coverage.market_only, BTreeSet::from(["ARG".to_string()]));
        assert_eq!(coverage.macro_only, BTreeSet::from(["CHL".to_string()]));
        assert_eq!(coverage.common_years, BTreeSet::from([2021]));
        assert_eq!(coverage.market.series, 2);
        assert_eq!(coverage.macro_data.first_year, Some(2021));
        assert_eq!(
            coverage.market_dates,
            Some((
                NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2021, 1, 2).unwrap()
            ))
        );
    }

    #[test]
    fn test_missing_values_per_column() {
        let history = MarketHistory::from_observations(vec![
            obs("^A", "ARG", (2020, 1, 2), 1.0),
            obs("^A", "ARG", (2020, 1, 3), 1.1),
            obs("^B", "BRA", (2020, 1, 2), 5.0),
        ]);
        let macro_table = MacroTable::from_observations(vec![
            mobs("BRA", "X", 2020, 1.0),
            mobs("BRA", "X", 2021, f64::NAN),
        ]);
        let missing = Coverage::new(&history, &macro_table).missing_values;

        // one return per asset is undefined; no volatility window is full
        assert_eq!(missing.len(), 3);
        assert_eq!((missing[0].column, missing[0].missing), ("daily_return", 2));
        assert_eq!((missing[1].column, missing[1].missing), ("volatility", 3));
        assert_eq!(missing[2].dataset, "macro");
        assert_eq!(missing[2].missing, 1);
        assert!((missing[2].percent - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_completeness_against_all_years() {
        let macro_table = MacroTable::from_observations(vec![
            mobs("BRA", "X", 2020, 1.0),
            mobs("BRA", "X", 2021, 2.0),
            mobs("BRA", "Y", 2020, 3.0),
            mobs("BRA", "Y", 2021, 4.0),
            mobs("CHL", "X", 2020, f64::NAN),
            mobs("CHL", "X", 2021, 5.0),
            mobs("CHL", "Y", 2021, 6.0),
        ]);
        let completeness = Completeness::of(&macro_table);

        assert_eq!(completeness.total_years, 2);
        assert!((completeness.global_percent.unwrap() - 75.0).abs() < 1e-12);
        assert_eq!(completeness.countries[0].country, "BRA");
        assert!((completeness.countries[0].percent - 100.0).abs() < 1e-12);
        assert!((completeness.countries[1].percent - 50.0).abs() < 1e-12);
        assert_eq!(completeness.complete_countries, 1);
    }

    #[test]
    fn test_completeness_of_empty_table() {
        let completeness = Completeness::of(&MacroTable::default());
        assert_eq!(completeness.total_years, 0);
        assert!(completeness.global_percent.is_none());
        assert!(completeness.countries.is_empty());
    }
}
