use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use arrow::array::{Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate, Weekday};
use clap::Parser;
use parquet::arrow::ArrowWriter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// (display name, ticker, ISO3) of the synthetic market indices.
const MARKETS: &[(&str, &str, &str)] = &[
    ("Argentina", "^MERV", "ARG"),
    ("Brasil", "^BVSP", "BRA"),
    ("México", "^MXX", "MEX"),
    ("Alemania", "^GDAXI", "DEU"),
    ("Japón", "^N225", "JPN"),
    ("Reino Unido", "^FTSE", "GBR"),
    ("Estados Unidos", "^GSPC", "USA"),
    ("India", "^BSESN", "IND"),
];

/// Macro-only countries, written by English name like the World Bank export.
const MACRO_ONLY: &[&str] = &["Chile", "Colombia", "Peru"];

/// (code, name, long-run mean, yearly noise)
const INDICATORS: &[(&str, &str, f64, f64)] = &[
    ("NY.GDP.MKTP.KD.ZG", "Crecimiento_PIB", 2.5, 2.5),
    ("FP.CPI.TOTL.ZG", "Inflacion", 4.0, 3.0),
    ("SL.UEM.TOTL.ZS", "Desempleo", 7.0, 1.5),
    ("NE.TRD.GNFS.ZS", "Comercio_Porcentaje_PIB", 55.0, 8.0),
];

#[derive(Parser)]
#[command(about = "Write synthetic market history and macro indicator files")]
struct Args {
    /// Output directory
    #[arg(long, default_value = "data")]
    out_dir: PathBuf,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 2010)]
    first_year: i32,

    #[arg(long, default_value_t = 2024)]
    last_year: i32,
}

/// Box-Muller transform for a normal draw.
fn gauss(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.random::<f64>().max(1e-15);
    let u2: f64 = rng.random();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

fn english_name(iso3: &str) -> &'static str {
    geofinance::data::countries::name_of(iso3).unwrap_or("Unknown")
}

fn write_parquet(path: &Path, batch: &RecordBatch) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let years: Vec<i32> = (args.first_year..=args.last_year).collect();

    // ---- Macro: one value per country, indicator and year ----
    let mut iso3_col: Vec<String> = Vec::new();
    let mut year_col: Vec<i64> = Vec::new();
    let mut name_col: Vec<&str> = Vec::new();
    let mut code_col: Vec<&str> = Vec::new();
    let mut value_col: Vec<Option<f64>> = Vec::new();

    let countries: Vec<&str> = MARKETS
        .iter()
        .map(|(_, _, iso3)| english_name(iso3))
        .chain(MACRO_ONLY.iter().copied())
        .collect();

    // GDP growth per (country, year) drives the market drift below.
    let mut gdp_growth = std::collections::HashMap::new();
    for country in &countries {
        let country_shift = gauss(&mut rng, 0.0, 1.0);
        for &(code, name, mean, noise) in INDICATORS {
            for &year in &years {
                let value = gauss(&mut rng, mean + country_shift, noise);
                if code == "NY.GDP.MKTP.KD.ZG" {
                    gdp_growth.insert((country.to_string(), year), value);
                }
                iso3_col.push(country.to_string());
                year_col.push(year as i64);
                name_col.push(name);
                code_col.push(code);
                // about 5% of World Bank cells are empty
                value_col.push((rng.random::<f64>() > 0.05).then_some(value));
            }
        }
    }

    let macro_schema = Arc::new(Schema::new(vec![
        Field::new("ISO3", DataType::Utf8, false),
        Field::new("Ano", DataType::Int64, false),
        Field::new("Indicador", DataType::Utf8, false),
        Field::new("Codigo_Indicador", DataType::Utf8, false),
        Field::new("Valor", DataType::Float64, true),
    ]));
    let macro_rows = iso3_col.len();
    let macro_batch = RecordBatch::try_new(
        macro_schema,
        vec![
            Arc::new(StringArray::from(iso3_col)),
            Arc::new(Int64Array::from(year_col)),
            Arc::new(StringArray::from(name_col)),
            Arc::new(StringArray::from(code_col)),
            Arc::new(Float64Array::from(value_col)),
        ],
    )?;
    let macro_path = args.out_dir.join("datos_macro.parquet");
    write_parquet(&macro_path, &macro_batch)?;

    // ---- Market: business-day closes per index ----
    let mut date_col: Vec<i32> = Vec::new();
    let mut price_col: Vec<f64> = Vec::new();
    let mut pais_col: Vec<&str> = Vec::new();
    let mut ticker_col: Vec<&str> = Vec::new();
    let mut market_iso3_col: Vec<&str> = Vec::new();

    let start = NaiveDate::from_ymd_opt(args.first_year, 1, 1).context("invalid first year")?;
    let end = NaiveDate::from_ymd_opt(args.last_year, 12, 31).context("invalid last year")?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).context("invalid epoch")?;

    for &(pais, ticker, iso3) in MARKETS {
        let mut price = rng.random_range(1_000.0..40_000.0);
        let volatility = rng.random_range(0.008..0.02);
        let english = english_name(iso3);

        for day in start.iter_days().take_while(|d| *d <= end) {
            if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                continue;
            }
            let growth = gdp_growth
                .get(&(english.to_string(), day.year()))
                .copied()
                .unwrap_or(2.5);
            // ~252 sessions a year: each GDP point adds ~2.5% of annual drift
            let drift = (growth - 1.0) * 0.0001;
            price *= 1.0 + gauss(&mut rng, drift, volatility);

            date_col.push((day - epoch).num_days() as i32);
            price_col.push(price);
            pais_col.push(pais);
            ticker_col.push(ticker);
            market_iso3_col.push(iso3);
        }
    }

    let market_schema = Arc::new(Schema::new(vec![
        Field::new("Fecha", DataType::Date32, false),
        Field::new("Precio", DataType::Float64, false),
        Field::new("Pais", DataType::Utf8, false),
        Field::new("Ticker", DataType::Utf8, false),
        Field::new("ISO3", DataType::Utf8, false),
    ]));
    let market_rows = date_col.len();
    let market_batch = RecordBatch::try_new(
        market_schema,
        vec![
            Arc::new(Date32Array::from(date_col)),
            Arc::new(Float64Array::from(price_col)),
            Arc::new(StringArray::from(pais_col)),
            Arc::new(StringArray::from(ticker_col)),
            Arc::new(StringArray::from(market_iso3_col)),
        ],
    )?;
    let history_path = args.out_dir.join("historico_activos.parquet");
    write_parquet(&history_path, &market_batch)?;

    println!(
        "Wrote {market_rows} market rows to {} and {macro_rows} macro rows to {}",
        history_path.display(),
        macro_path.display()
    );
    Ok(())
}
