use std::{collections::BTreeMap, fmt, str::FromStr};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{error::ValueError, schema::ColumnType};

/// One materialized storage row, including flattened `relation.column` keys.
pub type Row = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Guid(Uuid),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null or a string that is empty after trimming.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Decimal(d) => d.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::Guid(g) => g.to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view used by comparison conditions.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Decimal(d) => d.to_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn from_json(value: &JsonValue) -> Value {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Boolean(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            JsonValue::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

fn parse_boolean(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Parses a raw storage cell into a typed value. Empty cells become `Null`.
pub fn parse_typed_value(value: &str, ty: &ColumnType) -> Result<Value> {
    if value.is_empty() {
        return Ok(Value::Null);
    }
    let parsed = match ty {
        ColumnType::String => Value::String(value.to_string()),
        ColumnType::Integer => {
            let parsed: i64 = value
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse '{value}' as integer"))?;
            Value::Integer(parsed)
        }
        ColumnType::Float => {
            let parsed: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse '{value}' as float"))?;
            Value::Float(parsed)
        }
        ColumnType::Decimal => {
            let parsed = Decimal::from_str(value.trim())
                .with_context(|| format!("Failed to parse '{value}' as decimal"))?;
            Value::Decimal(parsed)
        }
        ColumnType::Boolean => match parse_boolean(value) {
            Some(parsed) => Value::Boolean(parsed),
            None => bail!("Failed to parse '{value}' as boolean"),
        },
        ColumnType::Date => Value::Date(parse_naive_date(value.trim())?),
        ColumnType::DateTime => Value::DateTime(parse_naive_datetime(value.trim())?),
        ColumnType::Guid => {
            let trimmed = value.trim().trim_matches(|c| matches!(c, '{' | '}'));
            let parsed = Uuid::parse_str(trimmed)
                .with_context(|| format!("Failed to parse '{value}' as GUID"))?;
            Value::Guid(parsed)
        }
    };
    Ok(parsed)
}

/// Coerces a generated value to the storage type of its column.
///
/// Numeric columns parse strings, boolean columns normalize the usual truthy
/// and falsy spellings, and string columns take the display form of anything.
pub fn coerce_value(value: Value, ty: &ColumnType) -> std::result::Result<Value, ValueError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let display = value.as_display();
    let coerced = match (ty, value) {
        (ColumnType::String, Value::String(s)) => Some(Value::String(s)),
        (ColumnType::String, other) => Some(Value::String(other.as_display())),
        (ColumnType::Integer, value) => coerce_integer(&value).map(Value::Integer),
        (ColumnType::Float, value) => value.as_f64().map(Value::Float),
        (ColumnType::Decimal, value) => coerce_decimal(&value).map(Value::Decimal),
        (ColumnType::Boolean, Value::Boolean(b)) => Some(Value::Boolean(b)),
        (ColumnType::Boolean, Value::Integer(i)) if i == 0 || i == 1 => {
            Some(Value::Boolean(i == 1))
        }
        (ColumnType::Boolean, Value::String(s)) => parse_boolean(&s).map(Value::Boolean),
        (ColumnType::Date, Value::Date(d)) => Some(Value::Date(d)),
        (ColumnType::Date, Value::DateTime(dt)) => Some(Value::Date(dt.date())),
        (ColumnType::Date, Value::String(s)) => parse_naive_date(s.trim()).ok().map(Value::Date),
        (ColumnType::DateTime, Value::DateTime(dt)) => Some(Value::DateTime(dt)),
        (ColumnType::DateTime, Value::Date(d)) => d.and_hms_opt(0, 0, 0).map(Value::DateTime),
        (ColumnType::DateTime, Value::String(s)) => {
            parse_naive_datetime(s.trim()).ok().map(Value::DateTime)
        }
        (ColumnType::Guid, Value::Guid(g)) => Some(Value::Guid(g)),
        (ColumnType::Guid, Value::String(s)) => Uuid::parse_str(s.trim()).ok().map(Value::Guid),
        _ => None,
    };
    coerced.ok_or_else(|| ValueError::Coercion {
        value: display,
        target: ty.to_string(),
    })
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
        Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
        Value::Boolean(b) => Some(i64::from(*b)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

fn coerce_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Decimal(d) => Some(*d),
        Value::Integer(i) => Some(Decimal::from(*i)),
        Value::Float(f) => Decimal::from_f64(*f),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_typed_value_maps_empty_to_null() {
        assert_eq!(
            parse_typed_value("", &ColumnType::Integer).unwrap(),
            Value::Null
        );
        assert_eq!(
            parse_typed_value("Yes", &ColumnType::Boolean).unwrap(),
            Value::Boolean(true)
        );
        assert!(parse_typed_value("maybe", &ColumnType::Boolean).is_err());
    }

    #[test]
    fn coerce_value_parses_numeric_strings() {
        assert_eq!(
            coerce_value(Value::from("42"), &ColumnType::Integer).unwrap(),
            Value::Integer(42)
        );
        assert_eq!(
            coerce_value(Value::from("12.50"), &ColumnType::Decimal).unwrap(),
            Value::Decimal(Decimal::from_str("12.50").unwrap())
        );
        assert!(
            coerce_value(Value::from("abc"), &ColumnType::Integer).is_err()
        );
    }

    #[test]
    fn coerce_value_normalizes_booleans() {
        assert_eq!(
            coerce_value(Value::from("no"), &ColumnType::Boolean).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            coerce_value(Value::Integer(1), &ColumnType::Boolean).unwrap(),
            Value::Boolean(true)
        );
        assert!(
            coerce_value(Value::Integer(7), &ColumnType::Boolean).is_err()
        );
    }

    #[test]
    fn coerce_value_stringifies_for_string_columns() {
        assert_eq!(
            coerce_value(Value::Integer(7), &ColumnType::String).unwrap(),
            Value::from("7")
        );
        assert_eq!(
            coerce_value(Value::Null, &ColumnType::Integer).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn as_f64_reads_numeric_strings() {
        assert_eq!(Value::from(" 100 ").as_f64(), Some(100.0));
        assert_eq!(Value::from("abc").as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }
}
