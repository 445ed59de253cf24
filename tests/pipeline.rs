//! End-to-end runs over files written to a temporary directory.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;

use geofinance::analysis::adhoc::{PairWith, TestRequest};
use geofinance::analysis::align::AnnualAggregation;
use geofinance::analysis::compare::ComparisonOptions;
use geofinance::analysis::stats::TestKind;
use geofinance::config::Config;
use geofinance::data::filter::Selection;
use geofinance::data::indicators::GDP_GROWTH;
use geofinance::session::Session;
use geofinance::AnalysisError;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("geofinance_it_{}_{name}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() as i32
}

fn write(path: &Path, batch: &RecordBatch) {
    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(batch).unwrap();
    writer.close().unwrap();
}

/// One index per country with a first and last close per year, so the
/// period return of each year is exactly `returns[year]`.
fn write_history(path: &Path, countries: &[(&str, &str, &[f64])], first_year: i32) {
    let (mut dates, mut prices, mut names, mut tickers, mut codes) =
        (Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new());
    for &(iso3, ticker, returns) in countries {
        for (i, r) in returns.iter().enumerate() {
            let year = first_year + i as i32;
            for (date, price) in [
                (NaiveDate::from_ymd_opt(year, 1, 2).unwrap(), 100.0),
                (NaiveDate::from_ymd_opt(year, 12, 30).unwrap(), 100.0 + r),
            ] {
                dates.push(days_since_epoch(date));
                prices.push(price);
                names.push(iso3);
                tickers.push(ticker);
                codes.push(iso3);
            }
        }
    }
    let schema = Arc::new(Schema::new(vec![
        Field::new("Fecha", DataType::Date32, false),
        Field::new("Precio", DataType::Float64, false),
        Field::new("Pais", DataType::Utf8, false),
        Field::new("Ticker", DataType::Utf8, false),
        Field::new("ISO3", DataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Date32Array::from(dates)),
            Arc::new(Float64Array::from(prices)),
            Arc::new(StringArray::from(names)),
            Arc::new(StringArray::from(tickers)),
            Arc::new(StringArray::from(codes)),
        ],
    )
    .unwrap();
    write(path, &batch);
}

/// GDP growth per country, the country written by English name.
fn write_macro(path: &Path, countries: &[(&str, &[Option<f64>])], first_year: i32) {
    let (mut names, mut years, mut indicators, mut codes, mut values) =
        (Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new());
    for &(name, growth) in countries {
        for (i, g) in growth.iter().enumerate() {
            names.push(name);
            years.push((first_year + i as i32) as i64);
            indicators.push("Crecimiento_PIB");
            codes.push(GDP_GROWTH);
            values.push(*g);
        }
    }
    let schema = Arc::new(Schema::new(vec![
        Field::new("ISO3", DataType::Utf8, false),
        Field::new("Ano", DataType::Int64, false),
        Field::new("Indicador", DataType::Utf8, false),
        Field::new("Codigo_Indicador", DataType::Utf8, false),
        Field::new("Valor", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(names)),
            Arc::new(Int64Array::from(years)),
            Arc::new(StringArray::from(indicators)),
            Arc::new(StringArray::from(codes)),
            Arc::new(Float64Array::from(values)),
        ],
    )
    .unwrap();
    write(path, &batch);
}

fn session_for(dir: &Path) -> Session {
    Session::new(Config {
        data_dir: dir.to_path_buf(),
        ..Config::default()
    })
}

#[test]
fn test_macro_up_market_down_is_strong_negative() {
    let dir = temp_dir("negative");
    write_history(&dir.join("historico_activos.parquet"), &[("ARG", "^MERV", &[3.0, 2.0, 1.0])], 2020);
    write_macro(
        &dir.join("datos_macro.parquet"),
        &[("Argentina", &[Some(1.0), Some(2.0), Some(3.0)])],
        2020,
    );

    let comparison = session_for(&dir).compare(&ComparisonOptions::default()).unwrap();
    assert_eq!(comparison.aligned_pairs, 3);
    let corr = comparison.global.correlation.as_ref().unwrap();
    assert!((corr.statistic + 1.0).abs() < 1e-9);
    assert!(corr.p_value < 1e-6);
    assert_eq!(corr.interpretation.to_string(), "strong, significant, negative");
    assert_eq!(comparison.per_country.len(), 1);
}

#[test]
fn test_full_comparison_with_partial_coverage() {
    let dir = temp_dir("partial");
    let bra: &[f64] = &[12.0, -4.0, 20.0, 8.0, 15.0, -10.0, 5.0];
    let mex: &[f64] = &[3.0, 6.0, -2.0, 9.0, 1.0, 4.0, 7.0];
    let usa: &[f64] = &[10.0, 20.0];
    write_history(
        &dir.join("historico_activos.parquet"),
        &[("BRA", "^BVSP", bra), ("MEX", "^MXX", mex), ("USA", "^GSPC", usa)],
        2015,
    );
    write_macro(
        &dir.join("datos_macro.parquet"),
        &[
            ("Brazil", &[Some(1.2), Some(-3.5), Some(1.3), Some(1.8), Some(1.2), Some(-3.3), Some(4.8)]),
            ("Mexico", &[Some(3.3), Some(2.6), None, Some(2.2), Some(-0.2), Some(-8.0), Some(4.7)]),
            ("United States", &[Some(2.7), Some(1.7)]),
            ("Atlantis", &[Some(1.0)]),
        ],
        2015,
    );

    let session = session_for(&dir);
    let comparison = session.compare(&ComparisonOptions::default()).unwrap();

    // MEX 2017 has no GDP value; USA has only two years
    assert_eq!(comparison.aligned_pairs, 7 + 6 + 2);
    assert_eq!(comparison.per_country.len(), 2);
    assert_eq!(comparison.skipped.len(), 1);
    assert_eq!(comparison.skipped[0].country, "USA");
    assert!(comparison
        .per_country
        .windows(2)
        .all(|w| w[0].difference.p_value <= w[1].difference.p_value));
    assert_eq!(comparison.coverage.common_countries.len(), 3);
    assert_eq!(comparison.years, Some((2015, 2021)));

    // a different aggregation rule still aligns on the same keys
    let options = ComparisonOptions {
        aggregation: AnnualAggregation::LastPrice,
        selection: Selection::all().with_countries(["BRA"]),
        ..ComparisonOptions::default()
    };
    let brazil = session.compare(&options).unwrap();
    assert_eq!(brazil.aligned_pairs, 7);
    assert_eq!(brazil.global.market.max, 120.0);

    let report = session
        .test(&TestRequest {
            kind: TestKind::Spearman,
            indicator: "crecimiento_pib".into(),
            pair_with: PairWith::Market(AnnualAggregation::PeriodReturn),
            selection: Selection::all(),
        })
        .unwrap();
    assert_eq!(report.outcome.n, 15);

    let coverage = session.coverage().unwrap();
    assert!(coverage.macro_only.is_empty());
    // BRA has every year, MEX 6 of 7, USA 2 of 7
    assert_eq!(coverage.completeness.total_years, 7);
    assert_eq!(coverage.completeness.complete_countries, 2);
    assert_eq!(coverage.completeness.countries.last().unwrap().country, "USA");
    let macro_missing = coverage
        .missing_values
        .iter()
        .find(|m| m.dataset == "macro")
        .unwrap();
    assert_eq!(macro_missing.missing, 1);
}

#[test]
fn test_too_few_aligned_pairs() {
    let dir = temp_dir("few");
    write_history(&dir.join("historico_activos.parquet"), &[("CHL", "^IPSA", &[1.0, 2.0])], 2020);
    write_macro(&dir.join("datos_macro.parquet"), &[("Chile", &[Some(1.0), Some(2.0)])], 2020);

    let err = session_for(&dir).compare(&ComparisonOptions::default()).unwrap_err();
    assert!(matches!(err, AnalysisError::InsufficientData { found: 2, .. }));
}

#[test]
fn test_missing_and_malformed_inputs() {
    let dir = temp_dir("missing");
    let session = session_for(&dir);
    let err = session.compare(&ComparisonOptions::default()).unwrap_err();
    assert!(matches!(err, AnalysisError::DataUnavailable { .. }));

    // a macro CSV without the value column
    std::fs::write(dir.join("macro.csv"), "ISO3,Ano,Indicador,Codigo_Indicador\nChile,2020,X,Y\n").unwrap();
    let session = Session::new(Config {
        data_dir: dir.clone(),
        macro_file: PathBuf::from("macro.csv"),
        ..Config::default()
    });
    match session.macro_table() {
        Err(AnalysisError::SchemaMismatch { column, .. }) => assert_eq!(column, "Valor"),
        other => panic!("expected SchemaMismatch, got {other:?}"),
    }
}

#[test]
fn test_unknown_indicator() {
    let dir = temp_dir("unknown");
    write_macro(&dir.join("datos_macro.parquet"), &[("Chile", &[Some(1.0)])], 2020);
    let err = session_for(&dir)
        .explore("Desempleo", &Selection::all())
        .unwrap_err();
    assert!(matches!(err, AnalysisError::UnknownIndicator(_)));
}
