use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;

use super::countries;
use super::loader::load_table;
use super::model::Table;
use crate::error::{AnalysisError, Result};

/// World Bank code of "GDP growth (annual %)".
pub const GDP_GROWTH: &str = "NY.GDP.MKTP.KD.ZG";

// ---------------------------------------------------------------------------
// MacroObservation – one country-year value of one indicator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroObservation {
    /// ISO3 code after normalisation.
    pub country: String,
    pub indicator: String,
    pub indicator_code: String,
    pub year: i32,
    /// NaN when the World Bank has no value for that year.
    pub value: f64,
}

/// Column names of the macro indicator file.
#[derive(Debug, Clone)]
pub struct MacroSchema {
    pub country: String,
    pub year: String,
    pub indicator: String,
    pub indicator_code: String,
    pub value: String,
}

impl Default for MacroSchema {
    fn default() -> Self {
        Self {
            country: "ISO3".into(),
            year: "Ano".into(),
            indicator: "Indicador".into(),
            indicator_code: "Codigo_Indicador".into(),
            value: "Valor".into(),
        }
    }
}

impl MacroSchema {
    pub fn required(&self) -> [&str; 5] {
        [
            self.country.as_str(),
            self.year.as_str(),
            self.indicator.as_str(),
            self.indicator_code.as_str(),
            self.value.as_str(),
        ]
    }
}

// ---------------------------------------------------------------------------
// MacroTable – the loaded annual dataset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    pub observations: Vec<MacroObservation>,
    pub countries: BTreeSet<String>,
    /// indicator code → indicator name
    pub indicators: BTreeMap<String, String>,
}

/// Load and type the macro indicator file.
pub fn load_macro(path: &Path, schema: &MacroSchema) -> Result<MacroTable> {
    let table = load_table(path, &schema.required())?;
    let macro_table = MacroTable::from_table(&table, schema);
    log::info!(
        "Loaded {} macro observations for {} indicators in {} countries from {}",
        macro_table.len(),
        macro_table.indicators.len(),
        macro_table.countries.len(),
        path.display()
    );
    Ok(macro_table)
}

impl MacroTable {
    /// Type the rows of an already validated table. Country cells are mapped
    /// to ISO3 codes; rows with an unknown country, no year or no indicator
    /// are skipped. A missing value is kept as NaN.
    pub fn from_table(table: &Table, schema: &MacroSchema) -> Self {
        let (Some(country_col), Some(years), Some(names), Some(codes), Some(values)) = (
            table.column(&schema.country),
            table.column(&schema.year),
            table.column(&schema.indicator),
            table.column(&schema.indicator_code),
            table.column(&schema.value),
        ) else {
            return Self::default();
        };

        let mut unmapped: BTreeSet<String> = BTreeSet::new();
        let mut skipped = 0usize;
        let mut observations = Vec::with_capacity(table.len());

        for row in 0..table.len() {
            let Some(raw_country) = country_col[row].as_text() else {
                skipped += 1;
                continue;
            };
            let Some(iso3) = countries::to_iso3(raw_country) else {
                unmapped.insert(raw_country.to_string());
                continue;
            };
            let (Some(year), Some(code)) = (years[row].as_year(), codes[row].as_text()) else {
                skipped += 1;
                continue;
            };
            observations.push(MacroObservation {
                country: iso3.to_string(),
                indicator: names[row].as_text().unwrap_or(code).to_string(),
                indicator_code: code.to_string(),
                year,
                value: values[row].as_f64().unwrap_or(f64::NAN),
            });
        }

        if !unmapped.is_empty() {
            log::warn!(
                "Dropped macro rows for {} unmapped countries: {:?}",
                unmapped.len(),
                unmapped
            );
        }
        if skipped > 0 {
            log::warn!("Skipped {skipped} macro rows with a missing country, year or indicator code");
        }

        Self::from_observations(observations)
    }

    pub fn from_observations(observations: Vec<MacroObservation>) -> Self {
        let countries = observations.iter().map(|o| o.country.clone()).collect();
        let mut indicators = BTreeMap::new();
        for o in &observations {
            indicators
                .entry(o.indicator_code.clone())
                .or_insert_with(|| o.indicator.clone());
        }
        Self {
            observations,
            countries,
            indicators,
        }
    }

    /// Find an indicator by code or by name (case-insensitive), returning
    /// its `(code, name)`.
    pub fn resolve_indicator(&self, key: &str) -> Result<(&str, &str)> {
        let key = key.trim();
        self.indicators
            .iter()
            .find(|(code, name)| code.eq_ignore_ascii_case(key) || name.eq_ignore_ascii_case(key))
            .map(|(code, name)| (code.as_str(), name.as_str()))
            .ok_or_else(|| AnalysisError::UnknownIndicator(key.to_string()))
    }

    pub fn years(&self) -> BTreeSet<i32> {
        self.observations.iter().map(|o| o.year).collect()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
