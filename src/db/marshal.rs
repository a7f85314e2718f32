//! Value conversion between the application and SQL Server.
//!
//! `prepare_persistent_value` runs before a value is bound, `prepare_hydrated_value`
//! after a value is read. Both are pure and may be called concurrently.

use crate::db::types::normalize_type;
use crate::error::{DriverError, DriverResult};
use crate::models::{ColumnDescriptor, ColumnType, MarshaledParameter, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound};
use serde_json::Value as JsonValue;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// Conversion applied to a column's values, derived from its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarshalKind {
    Boolean,
    Date,
    Time,
    /// `preserve_precision` keeps sub-seconds and offsets (`datetime2`, `datetimeoffset`).
    DateTime { preserve_precision: bool },
    SimpleArray,
    SimpleJson,
    SimpleEnum,
    Passthrough,
}

impl MarshalKind {
    /// Classify a column type.
    pub fn of(column_type: Option<&ColumnType>) -> Self {
        let Some(column_type) = column_type else {
            return Self::Passthrough;
        };

        match column_type {
            ColumnType::Boolean => Self::Boolean,
            ColumnType::Date => Self::Date,
            ColumnType::Time => Self::Time,
            ColumnType::Timestamp => Self::DateTime {
                preserve_precision: false,
            },
            ColumnType::SimpleArray => Self::SimpleArray,
            ColumnType::SimpleJson => Self::SimpleJson,
            ColumnType::SimpleEnum => Self::SimpleEnum,
            ColumnType::Native(name) => match name.to_lowercase().as_str() {
                "bit" => Self::Boolean,
                "date" => Self::Date,
                "time" => Self::Time,
                "datetime" | "smalldatetime" => Self::DateTime {
                    preserve_precision: false,
                },
                "datetime2" | "datetimeoffset" => Self::DateTime {
                    preserve_precision: true,
                },
                _ => Self::Passthrough,
            },
            _ => Self::Passthrough,
        }
    }
}

/// Convert an application value into the value bound to the query.
///
/// Transformers run first, on every value including null; null then short-circuits.
pub fn prepare_persistent_value(value: Value, column: &ColumnDescriptor) -> Value {
    let value = if column.has_transformer() {
        column.transform_to_database(value)
    } else {
        value
    };

    if value.is_null() {
        return value;
    }

    match MarshalKind::of(column.column_type.as_ref()) {
        MarshalKind::Boolean => Value::Int(to_bit(&value)),
        MarshalKind::Date => to_date(value),
        MarshalKind::Time => to_time(value),
        MarshalKind::DateTime { preserve_precision } => to_datetime(value, preserve_precision),
        MarshalKind::SimpleArray => match value {
            Value::Array(_) => Value::String(value.to_string()),
            other => other,
        },
        MarshalKind::SimpleJson => Value::String(value.to_json().to_string()),
        MarshalKind::SimpleEnum => Value::String(value.to_string()),
        MarshalKind::Passthrough => value,
    }
}

/// Convert a value read from SQL Server into the application value.
///
/// Null skips decoding but still goes through the transformers.
pub fn prepare_hydrated_value(value: Value, column: &ColumnDescriptor) -> DriverResult<Value> {
    if value.is_null() {
        return Ok(column.transform_from_database(value));
    }

    let decoded = match MarshalKind::of(column.column_type.as_ref()) {
        MarshalKind::Boolean => Value::Bool(value.is_truthy()),
        MarshalKind::Date => to_date(value),
        MarshalKind::Time => to_time(value),
        MarshalKind::DateTime { preserve_precision } => {
            from_datetime(value, preserve_precision)
        }
        MarshalKind::SimpleArray => decode_simple_array(value, column)?,
        MarshalKind::SimpleJson => decode_simple_json(value, column)?,
        MarshalKind::SimpleEnum => decode_simple_enum(value, column),
        MarshalKind::Passthrough => value,
    };

    Ok(column.transform_from_database(decoded))
}

/// Pair a value with the column's wire type and size attributes.
///
/// Length takes precedence, then precision with scale, precision alone, scale alone.
pub fn parametrize_value(column: &ColumnDescriptor, value: Value) -> MarshaledParameter {
    let parameter = MarshaledParameter::new(value, normalize_type(column));

    if let Some(length) = column.length {
        return parameter.with_length(length.to_string());
    }

    match (column.precision, column.scale) {
        (Some(precision), Some(scale)) => parameter.with_precision(precision).with_scale(scale),
        (Some(precision), None) => parameter.with_precision(precision),
        (None, Some(scale)) => parameter.with_scale(scale),
        (None, None) => parameter,
    }
}

/// Strict bit encoding: only true, nonzero numbers and `"1"`/`"true"` persist as 1.
fn to_bit(value: &Value) -> i64 {
    let set = match value {
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Float(f) => *f != 0.0 && !f.is_nan(),
        Value::String(s) => {
            let s = s.trim();
            s == "1" || s.eq_ignore_ascii_case("true")
        }
        Value::Json(JsonValue::Bool(b)) => *b,
        _ => false,
    };
    i64::from(set)
}

fn parse_datetime(s: &str) -> Option<Value> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(Value::DateTimeOffset(dt));
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .map(Value::DateTime)
}

fn to_date(value: Value) -> Value {
    match value {
        Value::DateTime(dt) => Value::Date(dt.date()),
        Value::DateTimeOffset(dt) => Value::Date(dt.date_naive()),
        Value::String(s) => match NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
            Ok(d) => Value::Date(d),
            Err(_) => match parse_datetime(&s) {
                Some(parsed) => to_date(parsed),
                None => Value::String(s),
            },
        },
        other => other,
    }
}

fn to_time(value: Value) -> Value {
    match value {
        Value::DateTime(dt) => Value::Time(dt.time()),
        Value::DateTimeOffset(dt) => Value::Time(dt.time()),
        Value::String(s) => {
            match TIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(&s, fmt).ok())
            {
                Some(t) => Value::Time(t),
                None => match parse_datetime(&s) {
                    Some(parsed) => to_time(parsed),
                    None => Value::String(s),
                },
            }
        }
        other => other,
    }
}

fn to_datetime(value: Value, preserve_precision: bool) -> Value {
    match value {
        Value::DateTime(dt) if !preserve_precision => Value::DateTime(dt.trunc_subsecs(0)),
        Value::DateTimeOffset(dt) if !preserve_precision => {
            Value::DateTime(dt.naive_local().trunc_subsecs(0))
        }
        Value::Date(d) => Value::DateTime(d.and_time(NaiveTime::MIN)),
        Value::String(s) => match parse_datetime(&s) {
            Some(parsed) => to_datetime(parsed, preserve_precision),
            None => Value::String(s),
        },
        other => other,
    }
}

fn from_datetime(value: Value, preserve_precision: bool) -> Value {
    match value {
        Value::DateTimeOffset(dt) if !preserve_precision => Value::DateTime(dt.naive_local()),
        Value::String(s) => match parse_datetime(&s) {
            Some(parsed) => from_datetime(parsed, preserve_precision),
            None => Value::String(s),
        },
        other => other,
    }
}

fn text_payload(value: Value, column: &ColumnDescriptor) -> DriverResult<Result<String, Value>> {
    match value {
        Value::String(s) => Ok(Ok(s)),
        Value::Bytes(bytes) => String::from_utf8(bytes)
            .map(Ok)
            .map_err(|e| DriverError::decode(&column.database_name, e.to_string())),
        other => Ok(Err(other)),
    }
}

fn decode_simple_array(value: Value, column: &ColumnDescriptor) -> DriverResult<Value> {
    match text_payload(value, column)? {
        Ok(s) if s.is_empty() => Ok(Value::Array(Vec::new())),
        Ok(s) => Ok(Value::Array(
            s.split(',').map(|item| Value::String(item.to_string())).collect(),
        )),
        Err(Value::Array(items)) => Ok(Value::Array(items)),
        Err(other) => Err(DriverError::decode(
            &column.database_name,
            format!("expected a comma separated string, got {}", other.type_name()),
        )),
    }
}

fn decode_simple_json(value: Value, column: &ColumnDescriptor) -> DriverResult<Value> {
    match text_payload(value, column)? {
        Ok(s) => serde_json::from_str::<JsonValue>(&s)
            .map(Value::Json)
            .map_err(|e| DriverError::decode(&column.database_name, e.to_string())),
        Err(Value::Json(json)) => Ok(Value::Json(json)),
        Err(other) => Err(DriverError::decode(
            &column.database_name,
            format!("expected a JSON string, got {}", other.type_name()),
        )),
    }
}

fn decode_simple_enum(value: Value, column: &ColumnDescriptor) -> Value {
    match value {
        Value::String(s) => column
            .enum_values
            .iter()
            .find_map(|allowed| match allowed {
                Value::Int(n) if n.to_string() == s => Some(Value::Int(*n)),
                _ => None,
            })
            .unwrap_or(Value::String(s)),
        other => other,
    }
}
