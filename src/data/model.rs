use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Value – a single cell of a loaded table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring the Pandas dtypes the download scripts
/// write (object strings, int32 years, float64 prices, datetime64 dates).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Null,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v:.4}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::Null => write!(f, "<null>"),
        }
    }
}

impl Value {
    /// Numeric view. Null and non-numeric cells read as `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Calendar year view: integers, integral floats, dates and `"2021"`.
    pub fn as_year(&self) -> Option<i32> {
        match self {
            Value::Integer(i) => i32::try_from(*i).ok(),
            Value::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i32),
            Value::Date(d) => Some(chrono::Datelike::year(d)),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Text(s) => parse_date(s),
            _ => None,
        }
    }

    /// Non-empty text view.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Date(_) => "date",
            Value::Null => "null",
        }
    }
}

/// Accepts `2021-03-04`, `2021-03-04 00:00:00` and `2021-03-04T00:00:00`
/// (pandas writes the latter two when a datetime column goes to text).
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
}

// ---------------------------------------------------------------------------
// Table – the untyped result of reading a file
// ---------------------------------------------------------------------------

/// Column-oriented in-memory table. Every column has `n_rows` cells.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub column_names: Vec<String>,
    columns: Vec<Vec<Value>>,
    n_rows: usize,
}

impl Table {
    /// Build a table from equally long named columns.
    pub fn from_columns(columns: Vec<(String, Vec<Value>)>) -> Self {
        let n_rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        debug_assert!(columns.iter().all(|(_, c)| c.len() == n_rows));
        let (column_names, columns) = columns.into_iter().unzip();
        Table {
            column_names,
            columns,
            n_rows,
        }
    }

    /// Append the rows of `other`. Columns missing from either side are
    /// padded with nulls.
    pub fn append(&mut self, other: Table) {
        for name in &other.column_names {
            if self.column(name).is_none() {
                self.column_names.push(name.clone());
                self.columns.push(vec![Value::Null; self.n_rows]);
            }
        }
        let other_rows = other.n_rows;
        for (name, col) in self.column_names.iter().zip(self.columns.iter_mut()) {
            match other.column(name) {
                Some(values) => col.extend_from_slice(values),
                None => col.extend(std::iter::repeat(Value::Null).take(other_rows)),
            }
        }
        self.n_rows += other_rows;
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.column_names
            .iter()
            .position(|c| c == name)
            .map(|i| self.columns[i].as_slice())
    }

    pub fn len(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// Type of the first non-null cell of each column.
    pub fn column_types(&self) -> Vec<(String, &'static str)> {
        self.column_names
            .iter()
            .zip(&self.columns)
            .map(|(name, col)| {
                let ty = col
                    .iter()
                    .find(|v| !matches!(v, Value::Null))
                    .map(Value::type_name)
                    .unwrap_or("null");
                (name.clone(), ty)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_views() {
        assert_eq!(Value::Integer(2021).as_year(), Some(2021));
        assert_eq!(Value::Float(2021.0).as_year(), Some(2021));
        assert_eq!(Value::Float(2021.5).as_year(), None);
        assert_eq!(Value::Text(" 3.5 ".into()).as_f64(), Some(3.5));
        assert_eq!(Value::Null.as_f64(), None);
        assert_eq!(Value::Text("  ".into()).as_text(), None);
    }

    #[test]
    fn test_parse_pandas_dates() {
        let d = NaiveDate::from_ymd_opt(2021, 3, 4).unwrap();
        assert_eq!(parse_date("2021-03-04"), Some(d));
        assert_eq!(parse_date("2021-03-04 00:00:00"), Some(d));
        assert_eq!(parse_date("2021-03-04T00:00:00"), Some(d));
        assert_eq!(parse_date("04/03/2021"), None);
    }

    #[test]
    fn test_append_pads_missing_columns() {
        let mut a = Table::from_columns(vec![("x".into(), vec![Value::Integer(1)])]);
        let b = Table::from_columns(vec![
            ("x".into(), vec![Value::Integer(2)]),
            ("y".into(), vec![Value::Text("b".into())]),
        ]);
        a.append(b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.column("y").unwrap(), &[Value::Null, Value::Text("b".into())]);
    }
}
