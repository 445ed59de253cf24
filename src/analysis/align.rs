use std::collections::BTreeMap;

use serde::Serialize;

use crate::analysis::stats::finite;
use crate::data::filter::Selection;
use crate::data::indicators::MacroTable;
use crate::data::market::{MarketHistory, MarketObservation, TRADING_DAYS_PER_YEAR};
use crate::error::Result;

// ---------------------------------------------------------------------------
// Annual aggregation of daily market data
// ---------------------------------------------------------------------------

/// How one asset's daily observations within a calendar year collapse into
/// a single annual value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AnnualAggregation {
    /// `(last - first) / first * 100` over the year's prices.
    #[default]
    PeriodReturn,
    /// Mean of the daily returns dated in the year.
    MeanDailyReturn,
    /// Sample std of the year's daily returns, annualized.
    Volatility,
    LastPrice,
    MeanPrice,
}

impl AnnualAggregation {
    pub fn name(self) -> &'static str {
        match self {
            AnnualAggregation::PeriodReturn => "period-return",
            AnnualAggregation::MeanDailyReturn => "mean-daily-return",
            AnnualAggregation::Volatility => "volatility",
            AnnualAggregation::LastPrice => "last-price",
            AnnualAggregation::MeanPrice => "mean-price",
        }
    }

    /// Column label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            AnnualAggregation::PeriodReturn => "annual market return (%)",
            AnnualAggregation::MeanDailyReturn => "mean daily market return (%)",
            AnnualAggregation::Volatility => "annualized market volatility (%)",
            AnnualAggregation::LastPrice => "year-end price",
            AnnualAggregation::MeanPrice => "mean price",
        }
    }

    /// Parse a rule name, case-insensitive.
    pub fn parse(name: &str) -> Option<Self> {
        <Self as clap::ValueEnum>::from_str(name.trim(), true).ok()
    }

    /// Value of one asset-year, `None` below the rule's minimum.
    /// `year` must be one asset's observations of one year, in date order.
    fn apply(self, year: &[MarketObservation]) -> Option<f64> {
        let prices = || year.iter().map(|o| o.price);
        let returns = || finite(&year.iter().map(|o| o.daily_return).collect::<Vec<_>>());
        match self {
            AnnualAggregation::PeriodReturn => {
                let (first, last) = (year.first()?, year.last()?);
                (year.len() >= 2 && first.price != 0.0)
                    .then(|| (last.price - first.price) / first.price * 100.0)
            }
            AnnualAggregation::MeanDailyReturn => {
                let r = returns();
                (!r.is_empty()).then(|| r.iter().sum::<f64>() / r.len() as f64)
            }
            AnnualAggregation::Volatility => {
                let r = returns();
                (r.len() >= 2).then(|| {
                    statrs::statistics::Statistics::std_dev(&r) * TRADING_DAYS_PER_YEAR.sqrt()
                })
            }
            AnnualAggregation::LastPrice => year.last().map(|o| o.price),
            AnnualAggregation::MeanPrice => {
                (!year.is_empty()).then(|| prices().sum::<f64>() / year.len() as f64)
            }
        }
    }
}

/// One value per (country, year), ordered by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnualSeries {
    pub label: String,
    pub values: BTreeMap<(String, i32), f64>,
}

impl AnnualSeries {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Collapse the daily history into one value per country and year.
///
/// Each asset-year is aggregated on its own; a country with several assets
/// gets the mean of its assets' values.
pub fn aggregate_annual(
    history: &MarketHistory,
    rule: AnnualAggregation,
    selection: &Selection,
) -> AnnualSeries {
    let mut sums: BTreeMap<(String, i32), (f64, usize)> = BTreeMap::new();
    let mut skipped = 0usize;

    for series in history.series() {
        for year in series.chunk_by(|a, b| a.year() == b.year()) {
            let year: Vec<MarketObservation> = year
                .iter()
                .filter(|o| selection.matches_market(o))
                .cloned()
                .collect();
            let Some(first) = year.first() else {
                continue;
            };
            match rule.apply(&year) {
                Some(value) if value.is_finite() => {
                    let slot = sums
                        .entry((first.country.clone(), first.year()))
                        .or_insert((0.0, 0));
                    slot.0 += value;
                    slot.1 += 1;
                }
                _ => skipped += 1,
            }
        }
    }
    if skipped > 0 {
        log::debug!("{}: skipped {skipped} asset-years below the minimum", rule.name());
    }

    AnnualSeries {
        label: rule.label().to_string(),
        values: sums
            .into_iter()
            .map(|(key, (sum, count))| (key, sum / count as f64))
            .collect(),
    }
}

/// One indicator as a (country, year) series. Duplicate keys keep the first
/// value; missing values stay NaN.
pub fn macro_series(
    table: &MacroTable,
    indicator: &str,
    selection: &Selection,
) -> Result<AnnualSeries> {
    let (code, name) = table.resolve_indicator(indicator)?;
    let mut series = AnnualSeries::new(format!("{name} ({code})"));
    for obs in table
        .observations
        .iter()
        .filter(|o| o.indicator_code == code && selection.matches_macro(o))
    {
        series
            .values
            .entry((obs.country.clone(), obs.year))
            .or_insert(obs.value);
    }
    Ok(series)
}

// ---------------------------------------------------------------------------
// Inner join
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedPair {
    pub country: String,
    pub year: i32,
    pub market_value: f64,
    pub macro_value: f64,
}

/// Inner join of two annual series on (country, year), ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlignedTable {
    pub market_label: String,
    pub macro_label: String,
    pub pairs: Vec<AlignedPair>,
}

/// Keys present on only one side are dropped, as are pairs where either
/// value is NaN.
pub fn align(market: &AnnualSeries, macro_side: &AnnualSeries) -> AlignedTable {
    let pairs = market
        .values
        .iter()
        .filter_map(|((country, year), &market_value)| {
            let &macro_value = macro_side.values.get(&(country.clone(), *year))?;
            (market_value.is_finite() && macro_value.is_finite()).then(|| AlignedPair {
                country: country.clone(),
                year: *year,
                market_value,
                macro_value,
            })
        })
        .collect();

    AlignedTable {
        market_label: market.label.clone(),
        macro_label: macro_side.label.clone(),
        pairs,
    }
}

impl AlignedTable {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The two value columns, row-aligned.
    pub fn split(&self) -> (Vec<f64>, Vec<f64>) {
        self.pairs
            .iter()
            .map(|p| (p.market_value, p.macro_value))
            .unzip()
    }

    /// Pairs grouped by country, each group in year order.
    pub fn by_country(&self) -> BTreeMap<&str, Vec<&AlignedPair>> {
        let mut groups: BTreeMap<&str, Vec<&AlignedPair>> = BTreeMap::new();
        for pair in &self.pairs {
            groups.entry(pair.country.as_str()).or_default().push(pair);
        }
        groups
    }

    /// Back to the two annual series the table was joined from.
    pub fn sides(&self) -> (AnnualSeries, AnnualSeries) {
        let mut market = AnnualSeries::new(self.market_label.clone());
        let mut macro_side = AnnualSeries::new(self.macro_label.clone());
        for p in &self.pairs {
            market.values.insert((p.country.clone(), p.year), p.market_value);
            macro_side.values.insert((p.country.clone(), p.year), p.macro_value);
        }
        (market, macro_side)
    }

    pub fn years(&self) -> Option<(i32, i32)> {
        let first = self.pairs.iter().map(|p| p.year).min()?;
        let last = self.pairs.iter().map(|p| p.year).max()?;
        Some((first, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::indicators::tests::mobs;
    use crate::data::indicators::GDP_GROWTH;
    use crate::data::market::tests::obs;

    fn series(label: &str, rows: &[(&str, i32, f64)]) -> AnnualSeries {
        AnnualSeries {
            label: label.into(),
            values: rows
                .iter()
                .map(|(c, y, v)| ((c.to_string(), *y), *v))
                .collect(),
        }
    }

    fn history() -> MarketHistory {
        MarketHistory::from_observations(vec![
            obs("^A", "ARG", (2020, 1, 2), 100.0),
            obs("^A", "ARG", (2020, 6, 1), 90.0),
            obs("^A", "ARG", (2020, 12, 30), 120.0),
            obs("^A", "ARG", (2021, 1, 4), 132.0),
            obs("^A", "ARG", (2021, 12, 30), 66.0),
            obs("^A2", "ARG", (2020, 1, 2), 10.0),
            obs("^A2", "ARG", (2020, 12, 30), 11.0),
            obs("^B", "BRA", (2020, 3, 2), 50.0),
        ])
    }

    #[test]
    fn test_period_return_means_assets_per_country() {
        let annual = aggregate_annual(&history(), AnnualAggregation::PeriodReturn, &Selection::all());
        // ^A 2020: +20%, ^A2 2020: +10% -> ARG 2020 = 15%; ^A 2021: -50%
        assert_eq!(annual.values[&("ARG".to_string(), 2020)], 15.0);
        assert_eq!(annual.values[&("ARG".to_string(), 2021)], -50.0);
        // a single price is not a period
        assert!(!annual.values.contains_key(&("BRA".to_string(), 2020)));
    }

    #[test]
    fn test_other_rules() {
        let h = history();
        let last = aggregate_annual(&h, AnnualAggregation::LastPrice, &Selection::all());
        assert_eq!(last.values[&("BRA".to_string(), 2020)], 50.0);
        assert_eq!(last.values[&("ARG".to_string(), 2021)], 66.0);

        let mean = aggregate_annual(&h, AnnualAggregation::MeanPrice, &Selection::all());
        assert!((mean.values[&("ARG".to_string(), 2021)] - 99.0).abs() < 1e-12);

        // ^A 2021 daily returns: +10% (against the 2020 close) and -50%
        let daily = aggregate_annual(&h, AnnualAggregation::MeanDailyReturn, &Selection::all());
        assert!((daily.values[&("ARG".to_string(), 2021)] + 20.0).abs() < 1e-9);

        let vol = aggregate_annual(&h, AnnualAggregation::Volatility, &Selection::all());
        assert!(vol.values[&("ARG".to_string(), 2021)] > 0.0);
        assert!(!vol.values.contains_key(&("BRA".to_string(), 2020)));
    }

    #[test]
    fn test_rule_names_parse() {
        assert_eq!(
            AnnualAggregation::parse("Mean-Daily-Return"),
            Some(AnnualAggregation::MeanDailyReturn)
        );
        assert_eq!(AnnualAggregation::parse("median"), None);
        assert_eq!(AnnualAggregation::default().name(), "period-return");
    }

    #[test]
    fn test_selection_limits_countries() {
        let selection = Selection::all().with_countries(["BRA"]);
        let annual = aggregate_annual(&history(), AnnualAggregation::LastPrice, &selection);
        assert_eq!(annual.len(), 1);
    }

    #[test]
    fn test_inner_join_drops_unmatched_and_nan() {
        let market = series("m", &[("ARG", 2020, 1.0), ("ARG", 2021, 2.0), ("BRA", 2020, 3.0), ("CHL", 2020, 4.0)]);
        let macro_side = series(
            "g",
            &[("ARG", 2020, 0.5), ("ARG", 2021, f64::NAN), ("BRA", 2020, 1.5), ("MEX", 2020, 9.0)],
        );
        let aligned = align(&market, &macro_side);

        assert_eq!(aligned.len(), 2);
        assert!(aligned.len() <= market.len().min(macro_side.len()));
        assert_eq!(aligned.pairs[0].country, "ARG");
        assert_eq!(aligned.pairs[1].macro_value, 1.5);
        assert_eq!(aligned.split(), (vec![1.0, 3.0], vec![0.5, 1.5]));
        assert_eq!(aligned.by_country().len(), 2);
        assert_eq!(aligned.years(), Some((2020, 2020)));
    }

    #[test]
    fn test_realigning_is_idempotent() {
        let market = series("m", &[("ARG", 2020, 1.0), ("ARG", 2021, f64::NAN), ("BRA", 2022, 3.0)]);
        let macro_side = series("g", &[("ARG", 2020, 0.5), ("ARG", 2021, 1.0), ("BRA", 2022, 2.0)]);
        let once = align(&market, &macro_side);
        let (m, g) = once.sides();
        assert_eq!(align(&m, &g), once);
    }

    #[test]
    fn test_macro_series_keeps_first_duplicate() {
        let table = MacroTable::from_observations(vec![
            mobs("ARG", GDP_GROWTH, 2020, -9.9),
            mobs("ARG", GDP_GROWTH, 2020, 1.0),
            mobs("ARG", "OTHER", 2020, 7.0),
        ]);
        let series = macro_series(&table, GDP_GROWTH, &Selection::all()).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.values[&("ARG".to_string(), 2020)], -9.9);
        assert!(macro_series(&table, "nope", &Selection::all()).is_err());
    }
}
