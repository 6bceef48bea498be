//! Typed statement parameters.

use crate::error::{DbError, DbResult};
use dbu_core::ValueKind;
use duckdb::types::{ToSql, ToSqlOutput, Value};
use std::fmt;

/// A literal bound as a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    /// Convert declared text into a value of the given binding class.
    ///
    /// `None` always binds as NULL. Decimal, timestamp and binary values are
    /// passed through as text and left to the database to cast.
    pub fn coerce(text: Option<&str>, kind: ValueKind) -> DbResult<Self> {
        let Some(text) = text else {
            return Ok(SqlValue::Null);
        };
        let invalid = || DbError::InvalidValue {
            value: text.to_string(),
            kind: format!("{kind:?}").to_lowercase(),
        };
        match kind {
            ValueKind::Boolean => parse_bool(text).map(SqlValue::Bool).ok_or_else(invalid),
            ValueKind::SmallInt | ValueKind::Integer | ValueKind::BigInt => text
                .trim()
                .parse::<i64>()
                .map(SqlValue::Int)
                .map_err(|_| invalid()),
            ValueKind::Double => text
                .trim()
                .parse::<f64>()
                .map(SqlValue::Float)
                .map_err(|_| invalid()),
            ValueKind::Decimal | ValueKind::Text | ValueKind::Timestamp | ValueKind::Binary => {
                Ok(SqlValue::Text(text.to_string()))
            }
        }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "1" => Some(true),
        "false" | "f" | "no" | "0" => Some(false),
        _ => None,
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(b) => write!(f, "{b}"),
            SqlValue::Int(n) => write!(f, "{n}"),
            SqlValue::Float(x) => write!(f, "{x}"),
            SqlValue::Text(s) => write!(f, "'{s}'"),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        let value = match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(b) => Value::Boolean(*b),
            SqlValue::Int(n) => Value::BigInt(*n),
            SqlValue::Float(x) => Value::Double(*x),
            SqlValue::Text(s) => Value::Text(s.clone()),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_for_absent_text() {
        assert_eq!(
            SqlValue::coerce(None, ValueKind::Integer).unwrap(),
            SqlValue::Null
        );
    }

    #[test]
    fn test_coerce_by_kind() {
        assert_eq!(
            SqlValue::coerce(Some("TRUE"), ValueKind::Boolean).unwrap(),
            SqlValue::Bool(true)
        );
        assert_eq!(
            SqlValue::coerce(Some(" 42 "), ValueKind::BigInt).unwrap(),
            SqlValue::Int(42)
        );
        assert_eq!(
            SqlValue::coerce(Some("2.5"), ValueKind::Double).unwrap(),
            SqlValue::Float(2.5)
        );
        assert_eq!(
            SqlValue::coerce(Some("abc"), ValueKind::Text).unwrap(),
            SqlValue::Text("abc".to_string())
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            SqlValue::coerce(Some("maybe"), ValueKind::Boolean),
            Err(DbError::InvalidValue { .. })
        ));
        assert!(matches!(
            SqlValue::coerce(Some("12x"), ValueKind::Integer),
            Err(DbError::InvalidValue { .. })
        ));
    }
}
