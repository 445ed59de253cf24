use std::collections::BTreeSet;

use chrono::NaiveDate;

use super::indicators::MacroObservation;
use super::market::MarketObservation;

// ---------------------------------------------------------------------------
// Selection predicate: which countries and which time window
// ---------------------------------------------------------------------------

/// Row filter shared by the reports.
///
/// * empty `countries` → every country passes
/// * `years` bounds are inclusive and apply to both datasets
/// * `dates` bounds are inclusive and only apply to market observations
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub countries: BTreeSet<String>,
    pub years: Option<(i32, i32)>,
    pub dates: Option<(NaiveDate, NaiveDate)>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.countries = countries
            .into_iter()
            .map(|c| c.as_ref().trim().to_ascii_uppercase())
            .collect();
        self
    }

    pub fn with_years(mut self, from: Option<i32>, to: Option<i32>) -> Self {
        if from.is_some() || to.is_some() {
            self.years = Some((from.unwrap_or(i32::MIN), to.unwrap_or(i32::MAX)));
        }
        self
    }

    pub fn with_dates(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.dates = Some((from, to));
        self
    }

    fn country_passes(&self, country: &str) -> bool {
        self.countries.is_empty() || self.countries.contains(country)
    }

    fn year_passes(&self, year: i32) -> bool {
        self.years
            .map_or(true, |(from, to)| (from..=to).contains(&year))
    }

    pub fn matches_macro(&self, obs: &MacroObservation) -> bool {
        self.country_passes(&obs.country) && self.year_passes(obs.year)
    }

    pub fn matches_market(&self, obs: &MarketObservation) -> bool {
        self.country_passes(&obs.country)
            && self.year_passes(obs.year())
            && self
                .dates
                .map_or(true, |(from, to)| (from..=to).contains(&obs.date))
    }
}

/// Observations passing the selection, in input order.
pub fn select_macro<'a, I>(observations: I, selection: &Selection) -> Vec<&'a MacroObservation>
where
    I: IntoIterator<Item = &'a MacroObservation>,
{
    observations
        .into_iter()
        .filter(|o| selection.matches_macro(o))
        .collect()
}
