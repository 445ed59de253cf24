use std::collections::BTreeSet;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use super::loader::load_table;
use super::model::Table;
use crate::error::Result;

/// Trading days used to annualize daily volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Number of daily returns in the rolling volatility window (about a month).
pub const VOLATILITY_WINDOW: usize = 21;

// ---------------------------------------------------------------------------
// MarketObservation – one daily close of one asset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketObservation {
    /// ISO3 code; the join key against macro data.
    pub country: String,
    pub country_name: String,
    pub asset_id: String,
    pub date: NaiveDate,
    pub price: f64,
    /// Simple return (%) against the previous close of the same asset.
    /// NaN on the asset's first observation.
    pub daily_return: f64,
    /// Annualized volatility (%) of the last [`VOLATILITY_WINDOW`] daily
    /// returns. NaN until the window is full.
    pub volatility: f64,
}

impl MarketObservation {
    pub fn year(&self) -> i32 {
        self.date.year()
    }
}

/// Column names of the market history file.
#[derive(Debug, Clone)]
pub struct HistorySchema {
    pub date: String,
    pub price: String,
    pub country_name: String,
    pub asset: String,
    pub iso3: String,
}

impl Default for HistorySchema {
    fn default() -> Self {
        Self {
            date: "Fecha".into(),
            price: "Precio".into(),
            country_name: "Pais".into(),
            asset: "Ticker".into(),
            iso3: "ISO3".into(),
        }
    }
}

impl HistorySchema {
    pub fn required(&self) -> [&str; 5] {
        [
            self.date.as_str(),
            self.price.as_str(),
            self.country_name.as_str(),
            self.asset.as_str(),
            self.iso3.as_str(),
        ]
    }
}

// ---------------------------------------------------------------------------
// MarketHistory – the loaded daily dataset
// ---------------------------------------------------------------------------

/// All observations, sorted by (asset, date), one row per key.
#[derive(Debug, Clone, Default)]
pub struct MarketHistory {
    pub observations: Vec<MarketObservation>,
    pub countries: BTreeSet<String>,
    pub assets: BTreeSet<String>,
}

/// Load and type the market history file.
pub fn load_market_history(path: &Path, schema: &HistorySchema) -> Result<MarketHistory> {
    let table = load_table(path, &schema.required())?;
    let history = MarketHistory::from_table(&table, schema);
    log::info!(
        "Loaded {} market observations for {} assets in {} countries from {}",
        history.len(),
        history.assets.len(),
        history.countries.len(),
        path.display()
    );
    Ok(history)
}

impl MarketHistory {
    /// Type the rows of an already validated table. Rows without a date,
    /// price, asset or country code are skipped.
    pub fn from_table(table: &Table, schema: &HistorySchema) -> Self {
        let (Some(dates), Some(prices), Some(names), Some(assets), Some(codes)) = (
            table.column(&schema.date),
            table.column(&schema.price),
            table.column(&schema.country_name),
            table.column(&schema.asset),
            table.column(&schema.iso3),
        ) else {
            return Self::default();
        };

        let mut skipped = 0usize;
        let mut observations = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let parsed = (
                dates[row].as_date(),
                prices[row].as_f64().filter(|p| p.is_finite()),
                assets[row].as_text(),
                codes[row].as_text(),
            );
            let (Some(date), Some(price), Some(asset), Some(iso3)) = parsed else {
                skipped += 1;
                continue;
            };
            observations.push(MarketObservation {
                country: iso3.to_string(),
                country_name: names[row].as_text().unwrap_or(iso3).to_string(),
                asset_id: asset.to_string(),
                date,
                price,
                daily_return: f64::NAN,
                volatility: f64::NAN,
            });
        }
        if skipped > 0 {
            log::warn!("Skipped {skipped} market rows with a missing date, price, ticker or ISO3");
        }

        Self::from_observations(observations)
    }

    /// Sort, drop duplicate (asset, date) keys (first row wins) and derive
    /// daily returns and rolling volatility.
    pub fn from_observations(mut observations: Vec<MarketObservation>) -> Self {
        observations.sort_by(|a, b| a.asset_id.cmp(&b.asset_id).then(a.date.cmp(&b.date)));
        observations.dedup_by(|b, a| a.asset_id == b.asset_id && a.date == b.date);

        for series in observations.chunk_by_mut(|a, b| a.asset_id == b.asset_id) {
            derive_returns(series);
        }

        let countries = observations.iter().map(|o| o.country.clone()).collect();
        let assets = observations.iter().map(|o| o.asset_id.clone()).collect();
        Self {
            observations,
            countries,
            assets,
        }
    }

    /// One slice per asset, each in date order.
    pub fn series(&self) -> impl Iterator<Item = &[MarketObservation]> {
        self.observations.chunk_by(|a, b| a.asset_id == b.asset_id)
    }

    pub fn years(&self) -> BTreeSet<i32> {
        self.observations.iter().map(MarketObservation::year).collect()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.observations.iter().map(|o| o.date).min()?;
        let last = self.observations.iter().map(|o| o.date).max()?;
        Some((first, last))
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

fn derive_returns(series: &mut [MarketObservation]) {
    for i in 1..series.len() {
        let prev = series[i - 1].price;
        series[i].daily_return = if prev != 0.0 {
            (series[i].price - prev) / prev * 100.0
        } else {
            f64::NAN
        };
    }
    // Returns start at index 1, so the first full window ends at VOLATILITY_WINDOW.
    for i in VOLATILITY_WINDOW..series.len() {
        let window = series[i + 1 - VOLATILITY_WINDOW..=i]
            .iter()
            .map(|o| o.daily_return);
        series[i].volatility =
            statrs::statistics::Statistics::std_dev(window) * TRADING_DAYS_PER_YEAR.sqrt();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn obs(asset: &str, iso3: &str, date: (i32, u32, u32), price: f64) -> MarketObservation {
        MarketObservation {
            country: iso3.into(),
            country_name: iso3.into(),
            asset_id: asset.into(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            price,
            daily_return: f64::NAN,
            volatility: f64::NAN,
        }
    }

    #[test]
    fn test_returns_are_per_asset() {
        let history = MarketHistory::from_observations(vec![
            obs("^B", "BRA", (2021, 1, 5), 110.0),
            obs("^A", "ARG", (2021, 1, 4), 50.0),
            obs("^B", "BRA", (2021, 1, 4), 100.0),
            obs("^A", "ARG", (2021, 1, 5), 25.0),
        ]);

        let returns: Vec<(String, f64)> = history
            .observations
            .iter()
            .map(|o| (o.asset_id.clone(), o.daily_return))
            .collect();
        assert!(returns[0].1.is_nan());
        assert_eq!(returns[1], ("^A".to_string(), -50.0));
        assert!(returns[2].1.is_nan());
        assert!((returns[3].1 - 10.0).abs() < 1e-12);
        assert_eq!(history.series().count(), 2);
    }

    #[test]
    fn test_duplicate_keys_keep_first() {
        let history = MarketHistory::from_observations(vec![
            obs("^A", "ARG", (2021, 1, 4), 50.0),
            obs("^A", "ARG", (2021, 1, 4), 99.0),
        ]);
        assert_eq!(history.len(), 1);
        assert_eq!(history.observations[0].price, 50.0);
    }

    #[test]
    fn test_volatility_needs_full_window() {
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let observations = (0..30)
            .map(|i| MarketObservation {
                date: start + chrono::Duration::days(i),
                price: if i % 2 == 0 { 100.0 } else { 101.0 },
                ..obs("^A", "ARG", (2021, 1, 1), 0.0)
            })
            .collect();
        let history = MarketHistory::from_observations(observations);

        assert!(history.observations[VOLATILITY_WINDOW - 1].volatility.is_nan());
        assert!(history.observations[VOLATILITY_WINDOW].volatility > 0.0);
    }
}
