//! Configuration from environment variables.
//!
//! `main` loads an optional `.env` file with `dotenvy` before calling
//! [`Config::from_env`]; command-line flags override what is read here.

use std::env;
use std::path::PathBuf;

use crate::analysis::align::AnnualAggregation;
use crate::data::indicators::GDP_GROWTH;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_HISTORY_FILE: &str = "historico_activos.parquet";
pub const DEFAULT_MACRO_FILE: &str = "datos_macro.parquet";

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Relative paths are resolved against `data_dir`.
    pub history_file: PathBuf,
    pub macro_file: PathBuf,
    /// Default indicator of the dataset comparison.
    pub indicator: String,
    pub aggregation: AnnualAggregation,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            history_file: PathBuf::from(DEFAULT_HISTORY_FILE),
            macro_file: PathBuf::from(DEFAULT_MACRO_FILE),
            indicator: GDP_GROWTH.to_string(),
            aggregation: AnnualAggregation::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let aggregation = match env::var("GEOFINANCE_AGGREGATION") {
            Ok(name) => AnnualAggregation::parse(&name).unwrap_or_else(|| {
                log::warn!("Unknown GEOFINANCE_AGGREGATION '{name}', using the default");
                AnnualAggregation::default()
            }),
            Err(_) => AnnualAggregation::default(),
        };

        Self {
            data_dir: env::var("GEOFINANCE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR)),
            history_file: env::var("GEOFINANCE_HISTORY_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_HISTORY_FILE)),
            macro_file: env::var("GEOFINANCE_MACRO_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_MACRO_FILE)),
            indicator: env::var("GEOFINANCE_INDICATOR").unwrap_or_else(|_| GDP_GROWTH.to_string()),
            aggregation,
        }
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(&self.history_file)
    }

    pub fn macro_path(&self) -> PathBuf {
        self.data_dir.join(&self.macro_file)
    }
}
