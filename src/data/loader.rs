use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Date32Type, Float64Type, Int64Type};
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::model::{parse_date, Table, Value};
use crate::error::{AnalysisError, Result};

/// Days between 0001-01-01 (CE day 1) and the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a table from a file and check that every `required` column exists.
///
/// Supported formats, dispatched by extension:
/// * `.parquet` / `.pq` – as written by `df.to_parquet()` (recommended)
/// * `.csv`            – header row, one record per line
/// * `.json`           – `[{ "col": value, ... }, ...]`
///
/// A missing or unreadable file is [`AnalysisError::DataUnavailable`]; a
/// readable file without one of the required columns is
/// [`AnalysisError::SchemaMismatch`].
pub fn load_table(path: &Path, required: &[&str]) -> Result<Table> {
    if !path.is_file() {
        return Err(AnalysisError::unavailable(path, "file not found"));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path)?,
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        other => {
            return Err(AnalysisError::unavailable(
                path,
                format!("unsupported file extension: .{other}"),
            ))
        }
    };

    for column in required {
        if table.column(column).is_none() {
            return Err(AnalysisError::SchemaMismatch {
                path: path.to_path_buf(),
                column: column.to_string(),
            });
        }
    }

    log::debug!(
        "Loaded {} rows with columns {:?} from {}",
        table.len(),
        table.column_names,
        path.display()
    );
    Ok(table)
}

/// Shape of a file as the loader sees it.
#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    pub path: PathBuf,
    pub rows: usize,
    /// (column name, inferred type)
    pub columns: Vec<(String, &'static str)>,
}

pub fn inspect(path: &Path) -> Result<TableInfo> {
    let table = load_table(path, &[])?;
    Ok(TableInfo {
        path: path.to_path_buf(),
        rows: table.len(),
        columns: table.column_types(),
    })
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the default `df.to_json(orient='records')`:
///
/// ```json
/// [
///   { "ISO3": "Brazil", "Ano": 2020, "Indicador": "Inflacion", "Valor": 3.2 },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).map_err(|e| AnalysisError::unavailable(path, e))?;
    let root: JsonValue = serde_json::from_str(&text)
        .map_err(|e| AnalysisError::unavailable(path, format!("invalid JSON: {e}")))?;

    let records = root
        .as_array()
        .ok_or_else(|| AnalysisError::unavailable(path, "expected a top-level JSON array"))?;

    let mut names: Vec<String> = Vec::new();
    for rec in records {
        if let Some(obj) = rec.as_object() {
            for key in obj.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }
    }

    let columns = names
        .iter()
        .map(|name| {
            let cells = records
                .iter()
                .map(|rec| rec.get(name).map(json_to_value).unwrap_or(Value::Null))
                .collect();
            (name.clone(), cells)
        })
        .collect();

    Ok(Table::from_columns(columns))
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) => match parse_date(s) {
            Some(d) => Value::Date(d),
            None => Value::Text(s.clone()),
        },
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        other => Value::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, types guessed per cell.
fn load_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| AnalysisError::unavailable(path, e))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AnalysisError::unavailable(path, e))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];

    for (row_no, result) in reader.records().enumerate() {
        let record =
            result.map_err(|e| AnalysisError::unavailable(path, format!("CSV row {row_no}: {e}")))?;
        for (col_idx, cells) in columns.iter_mut().enumerate() {
            cells.push(guess_value_type(record.get(col_idx).unwrap_or("")));
        }
    }

    Ok(Table::from_columns(headers.into_iter().zip(columns).collect()))
}

fn guess_value_type(s: &str) -> Value {
    if s.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::Float(f);
    }
    if s == "true" || s == "false" {
        return Value::Bool(s == "true");
    }
    if let Some(d) = parse_date(s) {
        return Value::Date(d);
    }
    Value::Text(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file written by **Pandas** (`df.to_parquet()`) or
/// **Polars** (`df.write_parquet()`).
///
/// Column handling:
/// - strings (`Utf8`, `LargeUtf8`, dictionary-encoded) → text
/// - any integer width → integer
/// - `Float16/32/64`, decimals → float
/// - `Date32/Date64/Timestamp(any unit, any tz)` → date (time of day dropped)
/// - `Boolean` → bool
/// - anything else reads as null
fn load_parquet(path: &Path) -> Result<Table> {
    let file = File::open(path).map_err(|e| AnalysisError::unavailable(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| AnalysisError::unavailable(path, format!("reading parquet metadata: {e}")))?;

    // Seed the column list from the schema so an empty file still reports
    // its columns.
    let mut table = Table::from_columns(
        builder
            .schema()
            .fields()
            .iter()
            .map(|f| (f.name().clone(), Vec::new()))
            .collect(),
    );

    let reader = builder
        .build()
        .map_err(|e| AnalysisError::unavailable(path, format!("building parquet reader: {e}")))?;

    for batch_result in reader {
        let batch = batch_result
            .map_err(|e| AnalysisError::unavailable(path, format!("reading record batch: {e}")))?;
        let schema = batch.schema();

        let columns = schema
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(field, col)| {
                let cells = arrow_column_values(col).unwrap_or_else(|| {
                    log::warn!(
                        "Column '{}' has unsupported type {:?}; reading it as null",
                        field.name(),
                        col.data_type()
                    );
                    vec![Value::Null; col.len()]
                });
                (field.name().clone(), cells)
            })
            .collect();

        table.append(Table::from_columns(columns));
    }

    Ok(table)
}

// -- Arrow helpers --

/// Convert a whole Arrow column into cells. `None` for unsupported types.
fn arrow_column_values(col: &ArrayRef) -> Option<Vec<Value>> {
    let target = match col.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View | DataType::Dictionary(_, _) => {
            DataType::Utf8
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => DataType::Int64,
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => DataType::Float64,
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => DataType::Date32,
        DataType::Boolean => DataType::Boolean,
        _ => return None,
    };

    let casted = cast(col, &target).ok()?;
    let n = casted.len();
    let values = match target {
        DataType::Utf8 => {
            let arr = casted.as_string::<i32>();
            (0..n)
                .map(|i| nullable(&casted, i, || Value::Text(arr.value(i).to_string())))
                .collect()
        }
        DataType::Int64 => {
            let arr = casted.as_primitive::<Int64Type>();
            (0..n)
                .map(|i| nullable(&casted, i, || Value::Integer(arr.value(i))))
                .collect()
        }
        DataType::Float64 => {
            let arr = casted.as_primitive::<Float64Type>();
            (0..n)
                .map(|i| nullable(&casted, i, || Value::Float(arr.value(i))))
                .collect()
        }
        DataType::Date32 => {
            let arr = casted.as_primitive::<Date32Type>();
            (0..n)
                .map(|i| {
                    nullable(&casted, i, || {
                        NaiveDate::from_num_days_from_ce_opt(arr.value(i) + UNIX_EPOCH_DAYS_FROM_CE)
                            .map(Value::Date)
                            .unwrap_or(Value::Null)
                    })
                })
                .collect()
        }
        DataType::Boolean => {
            let arr = casted.as_boolean();
            (0..n)
                .map(|i| nullable(&casted, i, || Value::Bool(arr.value(i))))
                .collect()
        }
        _ => return None,
    };
    Some(values)
}

fn nullable(col: &ArrayRef, row: usize, value: impl FnOnce() -> Value) -> Value {
    if col.is_null(row) {
        Value::Null
    } else {
        value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use arrow::array::{Date32Array, Float64Array, Int32Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("geofinance_loader_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("Failed to create test temp dir");
        dir.join(name)
    }

    #[test]
    fn test_missing_file_is_data_unavailable() {
        let err = load_table(Path::new("/nonexistent/datos_macro.parquet"), &[]).unwrap_err();
        assert!(matches!(err, AnalysisError::DataUnavailable { .. }));
        assert!(err.to_string().contains("download"));
    }

    #[test]
    fn test_csv_missing_column_is_schema_mismatch() {
        let path = temp_path("missing_col.csv");
        std::fs::write(&path, "ISO3,Ano\nBrazil,2020\n").unwrap();

        let err = load_table(&path, &["ISO3", "Valor"]).unwrap_err();
        match err {
            AnalysisError::SchemaMismatch { column, .. } => assert_eq!(column, "Valor"),
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_csv_guesses_cell_types() {
        let path = temp_path("types.csv");
        std::fs::write(
            &path,
            "Fecha,Precio,Ticker\n2021-01-04,100.5,^GSPC\n2021-01-05,,^GSPC\n",
        )
        .unwrap();

        let table = load_table(&path, &["Fecha", "Precio", "Ticker"]).unwrap();
        assert_eq!(table.len(), 2);
        let prices = table.column("Precio").unwrap();
        assert_eq!(prices[0], Value::Float(100.5));
        assert_eq!(prices[1], Value::Null);
        assert_eq!(
            table.column("Fecha").unwrap()[0],
            Value::Date(NaiveDate::from_ymd_opt(2021, 1, 4).unwrap())
        );
    }

    #[test]
    fn test_json_records() {
        let path = temp_path("records.json");
        std::fs::write(
            &path,
            r#"[{"ISO3": "Brazil", "Ano": 2020, "Valor": 1.5}, {"ISO3": "Chile", "Ano": 2021}]"#,
        )
        .unwrap();

        let table = load_table(&path, &["ISO3", "Ano", "Valor"]).unwrap();
        assert_eq!(table.column("Valor").unwrap(), &[Value::Float(1.5), Value::Null]);
    }

    #[test]
    fn test_parquet_round_trip_types() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("Fecha", DataType::Date32, false),
            Field::new("Ano", DataType::Int32, false),
            Field::new("Valor", DataType::Float64, true),
            Field::new("ISO3", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Date32Array::from(vec![18_628, 18_629])),
                Arc::new(Int32Array::from(vec![2021, 2021])),
                Arc::new(Float64Array::from(vec![Some(1.0), None])),
                Arc::new(StringArray::from(vec!["Brazil", "Chile"])),
            ],
        )
        .unwrap();

        let path = temp_path("types.parquet");
        let file = File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_table(&path, &["Fecha", "Ano", "Valor", "ISO3"]).unwrap();
        assert_eq!(table.len(), 2);
        // 18628 days after the epoch
        assert_eq!(
            table.column("Fecha").unwrap()[0],
            Value::Date(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap())
        );
        assert_eq!(table.column("Ano").unwrap()[1], Value::Integer(2021));
        assert_eq!(table.column("Valor").unwrap()[1], Value::Null);
        assert_eq!(table.column("ISO3").unwrap()[1], Value::Text("Chile".into()));
    }

    #[test]
    fn test_unsupported_extension() {
        let path = temp_path("data.xlsx");
        std::fs::write(&path, "x").unwrap();
        let err = load_table(&path, &[]).unwrap_err();
        assert!(matches!(err, AnalysisError::DataUnavailable { .. }));
    }

    #[test]
    fn test_inspect_reports_shape() {
        let path = temp_path("inspect.csv");
        std::fs::write(&path, "Pais,Ano,Valor\nChile,2020,\nChile,2021,1.5\n").unwrap();
        let info = inspect(&path).unwrap();
        assert_eq!(info.rows, 2);
        assert_eq!(
            info.columns,
            vec![
                ("Pais".to_string(), "text"),
                ("Ano".to_string(), "integer"),
                ("Valor".to_string(), "float"),
            ]
        );
    }
}
