//! Dynamic SQLite column values
//!
//! The content tables predate this tool and carry no schema guarantees, so
//! rows are decoded by storage class into a small value enum instead of
//! typed records.

use crate::error::Result;
use crate::ident;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, TypeInfo, ValueRef};

/// One column value as stored, without interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Same canonicalization rules as the JSON side: whole floats and
    /// trimmed numeric text parse, everything else is absent.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SqlValue::Null | SqlValue::Blob(_) => None,
            SqlValue::Integer(i) => Some(*i),
            SqlValue::Real(f) => {
                if f.fract() == 0.0 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            SqlValue::Text(s) => {
                let text = s.trim();
                if text.is_empty() {
                    None
                } else {
                    text.parse().ok()
                }
            }
        }
    }

    /// Integer identifier with the `0`/`-1` book sentinels mapped to absent.
    pub fn book_id(&self) -> Option<i64> {
        ident::strip_sentinels(self.as_int())
    }

    /// Whether this value is empty for fallback-chain purposes.
    pub fn is_falsy(&self) -> bool {
        match self {
            SqlValue::Null => true,
            SqlValue::Integer(i) => *i == 0,
            SqlValue::Real(f) => *f == 0.0,
            SqlValue::Text(s) => s.is_empty(),
            SqlValue::Blob(b) => b.is_empty(),
        }
    }

    /// Render as a standalone SQL literal safe for textual embedding.
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Integer(i) => i.to_string(),
            SqlValue::Real(f) => f.to_string(),
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            SqlValue::Blob(b) => format!("X'{}'", hex(b)),
        }
    }

    /// Render as a JSON value; blobs become hex strings.
    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) => Value::from(*i),
            SqlValue::Real(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SqlValue::Text(s) => Value::String(s.clone()),
            SqlValue::Blob(b) => Value::String(hex(b)),
        }
    }

    /// Textual form used as a sort tiebreaker; empty values sort first.
    pub fn sort_text(&self) -> String {
        if self.is_falsy() {
            return String::new();
        }
        match self {
            SqlValue::Null => String::new(),
            SqlValue::Integer(i) => i.to_string(),
            SqlValue::Real(f) => f.to_string(),
            SqlValue::Text(s) => s.clone(),
            SqlValue::Blob(b) => hex(b),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Decode one column of a fetched row by its declared storage class.
pub fn column_value(row: &SqliteRow, index: usize) -> Result<SqlValue> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let type_name = raw.type_info().name().to_string();
    match type_name.as_str() {
        "INTEGER" | "INT" | "BIGINT" | "BOOLEAN" => Ok(SqlValue::Integer(row.try_get(index)?)),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => Ok(SqlValue::Real(row.try_get(index)?)),
        "BLOB" => Ok(SqlValue::Blob(row.try_get(index)?)),
        _ => Ok(SqlValue::Text(row.try_get(index)?)),
    }
}
