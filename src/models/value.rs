use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ProcessingError, Result};
use crate::utils::constants::DATE_FORMAT;

/// Declared storage type of a column. Every column is nullable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int64,
    Float64,
    Utf8,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Int64 => write!(f, "int64"),
            ColumnType::Float64 => write!(f, "float64"),
            ColumnType::Utf8 => write!(f, "utf8"),
        }
    }
}

/// A single attribute value of a daily record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Coerce a raw JSON value into the declared column type.
    ///
    /// Integers are accepted for float columns and integral floats for int
    /// columns; anything else that does not match is a schema mismatch.
    pub fn from_json(
        column: &str,
        column_type: ColumnType,
        raw: &serde_json::Value,
    ) -> Result<Self> {
        use serde_json::Value as Json;

        let mismatch = || ProcessingError::SchemaMismatch {
            column: column.to_string(),
            expected: column_type.to_string(),
            found: json_kind(raw).to_string(),
        };

        match (column_type, raw) {
            (_, Json::Null) => Ok(Value::Null),
            (ColumnType::Float64, Json::Number(n)) => n.as_f64().map(Value::Float).ok_or_else(mismatch),
            (ColumnType::Int64, Json::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                            Ok(Value::Int(f as i64))
                        }
                        _ => Err(mismatch()),
                    }
                }
            }
            (ColumnType::Utf8, Json::String(s)) => Ok(Value::Text(s.clone())),
            _ => Err(mismatch()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Parse a calendar date from a raw JSON string. A trailing time component
/// (`2024-03-01T00:00`) is ignored.
pub fn parse_date(column: &str, raw: &serde_json::Value) -> Result<NaiveDate> {
    let text = raw.as_str().ok_or_else(|| ProcessingError::SchemaMismatch {
        column: column.to_string(),
        expected: "date string".to_string(),
        found: json_kind(raw).to_string(),
    })?;
    let day = text.split('T').next().unwrap_or(text).trim();
    Ok(NaiveDate::parse_from_str(day, DATE_FORMAT)?)
}

fn json_kind(raw: &serde_json::Value) -> &'static str {
    match raw {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
